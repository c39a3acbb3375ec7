//! Helmet Watch
//!
//! Haar-cascade helmet detection over a live camera feed, or over a single still image when
//! no camera is available.
//!
//! # Pipeline
//!
//! 1. **Classifier loader**: check the model file exists, build the cascade, fail fast.
//! 2. **Frame source**: camera if it opens, otherwise one decoded still image reused forever.
//! 3. **Detection**: grayscale, histogram equalization, one multi-scale cascade call.
//! 4. **Annotation**: a box and "Helmet" label per hit, the count, and a warning at zero.
//! 5. **Display loop**: show, poll for the quit key, stop, release.
//!
//! # Module Structure
//!
//! - `config`: file + environment configuration and validation
//! - `frame`: pixel containers and preprocessing
//! - `detect`: detector backends (OpenCV cascade, stub)
//! - `ingest`: camera and still-image sources
//! - `annotate`: overlay plan and the `Canvas` it renders onto
//! - `display`: window and headless surfaces
//! - `runner`: the Running/Stopped loop

use std::fmt;
use std::path::PathBuf;

pub mod annotate;
pub mod config;
pub mod detect;
pub mod display;
pub mod frame;
pub mod ingest;
pub mod runner;

pub use annotate::{annotate, Overlay, HELMET_LABEL, WARNING_TEXT};
pub use config::{HelmetConfig, PollSettings};
pub use detect::{Detection, DetectionParams, DetectorBackend, HelmetDetector, StubBackend};
pub use display::{open_surface, HeadlessSurface, PresentationLog, Surface};
pub use frame::Frame;
pub use ingest::{CameraSource, CameraSpec, CameraStats, FrameSource, SourceMode};
pub use runner::{RunSummary, Session, StopReason};

// -------------------- Startup failures --------------------

/// Startup-fatal conditions. Each is logged where it occurs; none is retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartupError {
    /// The cascade file does not exist.
    ModelMissing(PathBuf),
    /// The cascade file exists but the detector cannot use it.
    ModelUnusable { path: PathBuf, reason: String },
    /// No camera, and the fallback image could not be loaded.
    NoFrameSource {
        fallback_image: PathBuf,
        reason: String,
    },
    /// The window could not be created.
    DisplayUnavailable(String),
    /// The build lacks the backend this configuration needs.
    BackendUnavailable(&'static str),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::ModelMissing(path) => {
                write!(f, "cascade file {} not found", path.display())
            }
            StartupError::ModelUnusable { path, reason } => write!(
                f,
                "failed to load {}; ensure it is a valid Haar cascade XML: {}",
                path.display(),
                reason
            ),
            StartupError::NoFrameSource {
                fallback_image,
                reason,
            } => write!(
                f,
                "no camera and no usable fallback image {}: {}",
                fallback_image.display(),
                reason
            ),
            StartupError::DisplayUnavailable(reason) => {
                write!(f, "display unavailable: {}", reason)
            }
            StartupError::BackendUnavailable(reason) => write!(f, "{}", reason),
        }
    }
}

impl std::error::Error for StartupError {}

/// Build a session from configuration.
///
/// Order is fixed: classifier, then frame source, then display. A failure at any step
/// returns before later resources are acquired, and before any frame is processed.
pub fn start_session(cfg: &HelmetConfig) -> Result<Session, StartupError> {
    let detector = HelmetDetector::load_cascade(&cfg.cascade_path, cfg.detection)?;
    let source = FrameSource::open(&cfg.camera, &cfg.fallback_image)?;
    log::info!("frame source ready: mode={}", source.mode());
    let surface = open_surface(&cfg.window_title, cfg.headless)?;
    Ok(Session::new(source, detector, surface, cfg.poll).with_frame_limit(cfg.max_frames))
}
