//! Detection loop.
//!
//! A `Session` owns the three startup resources (frame source, detector, display surface)
//! and drives them through a two-state machine:
//!
//! ```text
//!   Running --(quit key | capture failure | fault | interrupt | frame limit)--> Stopped
//! ```
//!
//! Each Running iteration reads a frame, detects, annotates, presents, logs the count and
//! polls for the quit key. The transition to Stopped goes through `shutdown`, the single
//! place where the camera is released and the surface closed.

use std::sync::mpsc::Receiver;
use std::time::Duration;

use crate::annotate::annotate;
use crate::config::PollSettings;
use crate::detect::HelmetDetector;
use crate::display::Surface;
use crate::ingest::{CameraStats, FrameSource, SourceMode};

/// Why the loop left the Running state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The quit key was pressed.
    QuitKey,
    /// The configured frame limit was reached.
    FrameLimit,
    /// A termination signal arrived.
    Interrupted,
    /// The camera stopped delivering frames.
    CaptureFailed(String),
    /// Detection or display failed mid-run.
    Fault(String),
}

impl StopReason {
    /// Stops that end the process with a zero exit status.
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            StopReason::QuitKey | StopReason::FrameLimit | StopReason::Interrupted
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped(StopReason),
}

/// Outcome of a finished session.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub mode: SourceMode,
    pub frames: u64,
    pub camera_released: bool,
    /// Camera counters at shutdown; `None` in image mode.
    pub camera: Option<CameraStats>,
    pub stop_reason: StopReason,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.stop_reason.is_clean()
    }
}

pub struct Session {
    source: FrameSource,
    detector: HelmetDetector,
    surface: Box<dyn Surface>,
    poll: PollSettings,
    max_frames: Option<u64>,
    interrupt: Option<Receiver<()>>,
    frames: u64,
    finished: bool,
}

impl Session {
    pub fn new(
        source: FrameSource,
        detector: HelmetDetector,
        surface: Box<dyn Surface>,
        poll: PollSettings,
    ) -> Self {
        Self {
            source,
            detector,
            surface,
            poll,
            max_frames: None,
            interrupt: None,
            frames: 0,
            finished: false,
        }
    }

    /// Stop cleanly after `limit` frames.
    pub fn with_frame_limit(mut self, limit: Option<u64>) -> Self {
        self.max_frames = limit;
        self
    }

    /// Stop cleanly when a message (or disconnect) arrives on `interrupt`.
    pub fn with_interrupt(mut self, interrupt: Receiver<()>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    pub fn mode(&self) -> SourceMode {
        self.source.mode()
    }

    /// Run until Stopped, then release resources.
    pub fn run(mut self) -> RunSummary {
        let mode = self.mode();
        let timeout = self.poll.timeout_for(mode);
        log::info!(
            "detection loop running: mode={} backend={} surface={} poll={}ms quit='{}'",
            mode,
            self.detector.backend_name(),
            self.surface.name(),
            timeout.as_millis(),
            self.poll.quit_key
        );

        let stop_reason = loop {
            if let LoopState::Stopped(reason) = self.step(timeout) {
                break reason;
            }
        };

        let camera = self.source.camera_stats();
        let camera_released = self.shutdown();
        let summary = RunSummary {
            mode,
            frames: self.frames,
            camera_released,
            camera,
            stop_reason,
        };
        let captured = match &summary.camera {
            Some(stats) => format!(
                " ({} frames captured from {})",
                stats.frames_captured, stats.device
            ),
            None => String::new(),
        };
        if summary.is_clean() {
            log::info!(
                "detection loop stopped ({:?}) after {} frames{}",
                summary.stop_reason,
                summary.frames,
                captured
            );
        } else {
            log::error!(
                "detection loop stopped ({:?}) after {} frames{}",
                summary.stop_reason,
                summary.frames,
                captured
            );
        }
        summary
    }

    /// One Running iteration.
    fn step(&mut self, timeout: Duration) -> LoopState {
        if self.interrupted() {
            return LoopState::Stopped(StopReason::Interrupted);
        }

        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::error!("failed to capture frame: {:#}", err);
                return LoopState::Stopped(StopReason::CaptureFailed(format!("{:#}", err)));
            }
        };

        let detections = match self.detector.detect(frame) {
            Ok(detections) => detections,
            Err(err) => return fault("detection failed", err),
        };
        let overlay = annotate(&detections);
        if let Err(err) = self.surface.present(frame, &overlay) {
            return fault("display failed", err);
        }
        self.frames += 1;
        log::info!(
            "frame processed - helmets detected: {}",
            overlay.helmet_count()
        );

        match self.surface.poll_key(timeout) {
            Ok(Some(key)) if key == self.poll.quit_key => {
                return LoopState::Stopped(StopReason::QuitKey);
            }
            Ok(_) => {}
            Err(err) => return fault("key poll failed", err),
        }

        if self.max_frames.is_some_and(|limit| self.frames >= limit) {
            return LoopState::Stopped(StopReason::FrameLimit);
        }
        LoopState::Running
    }

    fn interrupted(&self) -> bool {
        match &self.interrupt {
            Some(rx) => match rx.try_recv() {
                Ok(()) => true,
                Err(std::sync::mpsc::TryRecvError::Empty) => false,
                Err(std::sync::mpsc::TryRecvError::Disconnected) => true,
            },
            None => false,
        }
    }

    /// Release the camera (if any) and close the surface. Runs once.
    fn shutdown(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;
        let released = self.source.release();
        self.surface.close();
        released
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn fault(context: &str, err: anyhow::Error) -> LoopState {
    log::error!("{}: {:#}", context, err);
    LoopState::Stopped(StopReason::Fault(format!("{}: {:#}", context, err)))
}
