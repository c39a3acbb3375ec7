use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;

use super::Surface;
use crate::annotate::Overlay;
use crate::frame::Frame;

/// One `present` call as seen by a recording surface.
#[derive(Clone, Debug)]
pub struct Presentation {
    pub frame: Frame,
    pub overlay: Overlay,
}

#[derive(Debug, Default)]
struct LogState {
    presented: Vec<Presentation>,
    poll_timeouts: Vec<Duration>,
    closed: bool,
}

/// Shared view of what a recording `HeadlessSurface` was asked to do.
///
/// The surface itself is moved into the session; the log stays with the caller.
#[derive(Clone, Debug, Default)]
pub struct PresentationLog {
    state: Rc<RefCell<LogState>>,
}

impl PresentationLog {
    pub fn presented(&self) -> Vec<Presentation> {
        self.state.borrow().presented.clone()
    }

    pub fn frames_shown(&self) -> usize {
        self.state.borrow().presented.len()
    }

    pub fn poll_timeouts(&self) -> Vec<Duration> {
        self.state.borrow().poll_timeouts.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

/// Surface without a window.
///
/// Plain mode logs each overlay at debug level and sleeps out the poll timeout so the loop
/// keeps its real pacing. Recording mode replays a scripted key sequence without sleeping and
/// keeps every presented frame in a `PresentationLog`.
pub struct HeadlessSurface {
    title: String,
    keys: VecDeque<Option<char>>,
    log: Option<PresentationLog>,
    pace: bool,
    closed: bool,
}

impl HeadlessSurface {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            keys: VecDeque::new(),
            log: None,
            pace: true,
            closed: false,
        }
    }

    /// Recording surface answering polls from `keys`; an exhausted script reports no key.
    pub fn recording(title: &str, keys: Vec<Option<char>>) -> (Self, PresentationLog) {
        let log = PresentationLog::default();
        let surface = Self {
            title: title.to_string(),
            keys: keys.into(),
            log: Some(log.clone()),
            pace: false,
            closed: false,
        };
        (surface, log)
    }
}

impl Surface for HeadlessSurface {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()> {
        log::debug!(
            "[{}] {}x{} frame, {} overlay shapes",
            self.title,
            frame.width,
            frame.height,
            overlay.shapes().len()
        );
        if let Some(log) = &self.log {
            log.state.borrow_mut().presented.push(Presentation {
                frame: frame.clone(),
                overlay: overlay.clone(),
            });
        }
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>> {
        if let Some(log) = &self.log {
            log.state.borrow_mut().poll_timeouts.push(timeout);
        }
        let key = self.keys.pop_front().flatten();
        if key.is_none() && self.pace {
            std::thread::sleep(timeout);
        }
        Ok(key)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(log) = &self.log {
            log.state.borrow_mut().closed = true;
        }
        log::debug!("[{}] headless surface closed", self.title);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::annotate;

    #[test]
    fn recording_surface_replays_keys_and_logs() {
        let (mut surface, log) = HeadlessSurface::recording("t", vec![None, Some('x'), Some('q')]);
        let frame = Frame::filled(2, 2, [1, 2, 3]);
        surface.present(&frame, &annotate(&[])).unwrap();

        let timeout = Duration::from_millis(500);
        assert_eq!(surface.poll_key(timeout).unwrap(), None);
        assert_eq!(surface.poll_key(timeout).unwrap(), Some('x'));
        assert_eq!(surface.poll_key(timeout).unwrap(), Some('q'));
        assert_eq!(surface.poll_key(timeout).unwrap(), None);

        assert_eq!(log.frames_shown(), 1);
        assert_eq!(log.presented()[0].frame, frame);
        assert_eq!(log.poll_timeouts().len(), 4);

        surface.close();
        surface.close();
        assert!(log.is_closed());
    }
}
