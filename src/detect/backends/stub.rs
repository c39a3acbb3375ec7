use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::backend::{DetectionParams, DetectorBackend};
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Stub backend for testing and headless dry runs.
///
/// Replays a script of per-frame results. Once the script runs out the last entry repeats,
/// so an empty script reports nothing on every frame.
#[derive(Debug, Default)]
pub struct StubBackend {
    script: VecDeque<Vec<Detection>>,
    last: Vec<Detection>,
    calls: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the same detections on every frame.
    pub fn constant(detections: Vec<Detection>) -> Self {
        Self {
            script: VecDeque::new(),
            last: detections,
            calls: 0,
        }
    }

    /// Report each entry in turn, then keep repeating the final one.
    pub fn scripted(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script: script.into(),
            last: Vec::new(),
            calls: 0,
        }
    }

    /// Number of frames this backend has been asked to inspect.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame, _params: &DetectionParams) -> Result<Vec<Detection>> {
        self.calls += 1;
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        Ok(self
            .last
            .iter()
            .copied()
            .filter(|d| d.fits_within(frame.width, frame.height))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::filled(320, 240, [0, 0, 0])
    }

    #[test]
    fn stub_replays_script_then_repeats_last() {
        let hit = Detection::new(10, 20, 60, 60);
        let mut backend = StubBackend::scripted(vec![vec![], vec![hit]]);
        let params = DetectionParams::default();

        assert!(backend.detect(&frame(), &params).unwrap().is_empty());
        assert_eq!(backend.detect(&frame(), &params).unwrap(), vec![hit]);
        assert_eq!(backend.detect(&frame(), &params).unwrap(), vec![hit]);
        assert_eq!(backend.calls(), 3);
    }

    #[test]
    fn stub_drops_rectangles_outside_the_frame() {
        let inside = Detection::new(0, 0, 50, 50);
        let outside = Detection::new(300, 200, 60, 60);
        let mut backend = StubBackend::constant(vec![inside, outside]);
        let found = backend
            .detect(&frame(), &DetectionParams::default())
            .unwrap();
        assert_eq!(found, vec![inside]);
    }
}
