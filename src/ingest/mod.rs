//! Frame ingestion.
//!
//! `FrameSource::open` makes the one startup decision of the pipeline: use the camera if it
//! opens, otherwise fall back to a single still image. The resulting `SourceMode` is fixed for
//! the process lifetime; the camera is never re-probed after fallback.
//!
//! - Webcam mode: every `next_frame` reads a fresh frame; a failed read is returned as an
//!   error and ends the run.
//! - Image mode: every `next_frame` returns the same decoded frame.

pub mod camera;
pub mod still;

use std::path::Path;

use anyhow::Result;

pub use camera::{CameraSource, CameraSpec, CameraStats};
pub use still::load_still;

use crate::frame::Frame;
use crate::StartupError;

/// Frame acquisition mode, chosen once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceMode {
    Webcam,
    Image,
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceMode::Webcam => write!(f, "webcam"),
            SourceMode::Image => write!(f, "image"),
        }
    }
}

/// Source of frames for the detection loop.
pub struct FrameSource {
    backend: SourceBackend,
}

enum SourceBackend {
    Webcam {
        camera: CameraSource,
        current: Option<Frame>,
    },
    Image {
        frame: Frame,
    },
}

impl FrameSource {
    /// Open the camera, falling back to the still image at `fallback_image`.
    pub fn open(camera: &CameraSpec, fallback_image: &Path) -> Result<Self, StartupError> {
        if let Some(camera) = CameraSource::open(camera) {
            return Ok(Self::from_camera(camera));
        }
        log::warn!(
            "could not open camera {}; trying fallback image mode",
            camera
        );
        match load_still(fallback_image) {
            Ok(frame) => Ok(Self::from_still(frame)),
            Err(err) => {
                let err = StartupError::NoFrameSource {
                    fallback_image: fallback_image.to_path_buf(),
                    reason: format!("{:#}", err),
                };
                log::error!("{}", err);
                Err(err)
            }
        }
    }

    pub fn from_camera(camera: CameraSource) -> Self {
        Self {
            backend: SourceBackend::Webcam {
                camera,
                current: None,
            },
        }
    }

    pub fn from_still(frame: Frame) -> Self {
        Self {
            backend: SourceBackend::Image { frame },
        }
    }

    pub fn mode(&self) -> SourceMode {
        match self.backend {
            SourceBackend::Webcam { .. } => SourceMode::Webcam,
            SourceBackend::Image { .. } => SourceMode::Image,
        }
    }

    /// Frame for this iteration.
    pub fn next_frame(&mut self) -> Result<&Frame> {
        match &mut self.backend {
            SourceBackend::Webcam { camera, current } => {
                let frame = camera.read()?;
                Ok(&*current.insert(frame))
            }
            SourceBackend::Image { frame } => Ok(&*frame),
        }
    }

    /// Camera statistics, when running in webcam mode.
    pub fn camera_stats(&self) -> Option<CameraStats> {
        match &self.backend {
            SourceBackend::Webcam { camera, .. } => Some(camera.stats()),
            SourceBackend::Image { .. } => None,
        }
    }

    /// Release the camera handle if one was opened. Returns whether a handle was released.
    pub fn release(&mut self) -> bool {
        match &mut self.backend {
            SourceBackend::Webcam { camera, current } => {
                current.take();
                let was_open = !camera.is_released();
                camera.release();
                was_open
            }
            SourceBackend::Image { .. } => false,
        }
    }
}
