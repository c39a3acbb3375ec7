use anyhow::Result;

use crate::detect::result::{Detection, WindowSize};
use crate::frame::Frame;

/// Fixed tuning for the multi-scale cascade search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionParams {
    /// Window growth per pyramid step. Must be > 1.0.
    pub scale_factor: f64,
    /// Overlapping hits required before a candidate is kept.
    pub min_neighbors: i32,
    pub min_size: WindowSize,
    pub max_size: WindowSize,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.05,
            min_neighbors: 3,
            min_size: WindowSize::square(50),
            max_size: WindowSize::square(200),
        }
    }
}

/// Detector backend trait.
///
/// Backends receive the BGR frame, apply their own input normalization and return rectangles
/// in frame pixel coordinates. They must not keep the frame beyond the call.
pub trait DetectorBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one frame.
    fn detect(&mut self, frame: &Frame, params: &DetectionParams) -> Result<Vec<Detection>>;
}
