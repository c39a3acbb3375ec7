//! Camera frame source.
//!
//! `CameraSource` wraps either an OpenCV `VideoCapture` device (feature: backend-opencv) or a
//! synthetic camera selected with a `stub://` specifier. The synthetic camera exists so the
//! loop can be exercised without hardware:
//!
//! - `stub://camera` produces generated frames forever
//! - `stub://camera?frames=N` disconnects after N frames
//! - `stub://offline` is never available
//!
//! A read failure is reported to the caller and never retried here.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;

/// Which camera to open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraSpec {
    /// OpenCV capture device index (0 = first camera).
    Index(i32),
    /// Generated frames, optionally disconnecting after `frame_limit` reads.
    Synthetic { frame_limit: Option<u64> },
    /// A camera that never opens.
    Offline,
}

impl Default for CameraSpec {
    fn default() -> Self {
        CameraSpec::Index(0)
    }
}

impl FromStr for CameraSpec {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        if let Some(rest) = value.strip_prefix("stub://") {
            let (name, query) = match rest.split_once('?') {
                Some((name, query)) => (name, Some(query)),
                None => (rest, None),
            };
            return match (name, query) {
                ("offline", None) => Ok(CameraSpec::Offline),
                ("camera", None) => Ok(CameraSpec::Synthetic { frame_limit: None }),
                ("camera", Some(query)) => Ok(CameraSpec::Synthetic {
                    frame_limit: Some(parse_frame_limit(query)?),
                }),
                _ => Err(anyhow!(
                    "unknown stub camera {value:?}, expected stub://camera[?frames=N] or stub://offline"
                )),
            };
        }
        let index: i32 = value
            .parse()
            .map_err(|_| anyhow!("camera must be a device index or stub:// specifier, got {value:?}"))?;
        if index < 0 {
            return Err(anyhow!("camera index must be >= 0, got {}", index));
        }
        Ok(CameraSpec::Index(index))
    }
}

impl fmt::Display for CameraSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraSpec::Index(index) => write!(f, "{}", index),
            CameraSpec::Synthetic { frame_limit: None } => write!(f, "stub://camera"),
            CameraSpec::Synthetic {
                frame_limit: Some(limit),
            } => write!(f, "stub://camera?frames={}", limit),
            CameraSpec::Offline => write!(f, "stub://offline"),
        }
    }
}

fn parse_frame_limit(query: &str) -> Result<u64> {
    let raw = query
        .strip_prefix("frames=")
        .ok_or_else(|| anyhow!("unsupported stub camera option {:?}", query))?;
    raw.parse()
        .map_err(|_| anyhow!("stub camera frames must be an integer, got {:?}", raw))
}

/// Camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
    spec: CameraSpec,
    frames_captured: u64,
    released: bool,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "backend-opencv")]
    Device(DeviceCamera),
}

impl CameraSource {
    /// Try to open the camera. `None` means unavailable; the reason is logged.
    pub fn open(spec: &CameraSpec) -> Option<Self> {
        let backend = match spec {
            CameraSpec::Offline => {
                log::warn!("camera {} is offline", spec);
                return None;
            }
            CameraSpec::Synthetic { frame_limit } => {
                CameraBackend::Synthetic(SyntheticCamera::new(*frame_limit))
            }
            CameraSpec::Index(index) => open_device(*index)?,
        };
        log::info!("camera {} opened", spec);
        Some(Self {
            backend,
            spec: spec.clone(),
            frames_captured: 0,
            released: false,
        })
    }

    /// Capture the next frame.
    pub fn read(&mut self) -> Result<Frame> {
        if self.released {
            return Err(anyhow!("camera {} already released", self.spec));
        }
        let frame = match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.read(),
            #[cfg(feature = "backend-opencv")]
            CameraBackend::Device(camera) => camera.read(),
        }?;
        self.frames_captured += 1;
        Ok(frame)
    }

    /// Release the device handle. Later calls are no-ops.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        match &mut self.backend {
            CameraBackend::Synthetic(_) => {}
            #[cfg(feature = "backend-opencv")]
            CameraBackend::Device(camera) => camera.release(),
        }
        self.released = true;
        log::info!(
            "camera {} released after {} frames",
            self.spec,
            self.frames_captured
        );
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frames_captured,
            device: self.spec.to_string(),
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub device: String,
}

#[cfg(feature = "backend-opencv")]
fn open_device(index: i32) -> Option<CameraBackend> {
    match DeviceCamera::open(index) {
        Ok(Some(camera)) => Some(CameraBackend::Device(camera)),
        Ok(None) => {
            log::warn!("camera {} could not be opened", index);
            None
        }
        Err(err) => {
            log::warn!("camera {} could not be opened: {:#}", index, err);
            None
        }
    }
}

#[cfg(not(feature = "backend-opencv"))]
fn open_device(index: i32) -> Option<CameraBackend> {
    log::warn!(
        "camera {} unavailable: device capture requires the backend-opencv feature",
        index
    );
    None
}

// ----------------------------------------------------------------------------
// OpenCV capture device
// ----------------------------------------------------------------------------

#[cfg(feature = "backend-opencv")]
struct DeviceCamera {
    capture: opencv::videoio::VideoCapture,
    buffer: opencv::core::Mat,
}

#[cfg(feature = "backend-opencv")]
impl DeviceCamera {
    fn open(index: i32) -> Result<Option<Self>> {
        use opencv::prelude::*;
        use opencv::videoio::{self, VideoCapture};

        let capture = VideoCapture::new(index, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Ok(None);
        }
        Ok(Some(Self {
            capture,
            buffer: opencv::core::Mat::default(),
        }))
    }

    fn read(&mut self) -> Result<Frame> {
        use opencv::core;
        use opencv::prelude::*;

        if !self.capture.read(&mut self.buffer)? {
            return Err(anyhow!("camera returned no frame"));
        }
        if self.buffer.empty() {
            return Err(anyhow!("camera returned an empty frame"));
        }
        if self.buffer.typ() != core::CV_8UC3 {
            return Err(anyhow!(
                "camera produced unsupported pixel type {}",
                self.buffer.typ()
            ));
        }
        let width = self.buffer.cols() as u32;
        let height = self.buffer.rows() as u32;
        let data = if self.buffer.is_continuous() {
            self.buffer.data_bytes()?.to_vec()
        } else {
            self.buffer.try_clone()?.data_bytes()?.to_vec()
        };
        Frame::from_bgr(width, height, data)
    }

    fn release(&mut self) {
        use opencv::prelude::*;

        if let Err(err) = self.capture.release() {
            log::warn!("camera release failed: {}", err);
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    frame_limit: Option<u64>,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(frame_limit: Option<u64>) -> Self {
        Self {
            frame_limit,
            frame_count: 0,
        }
    }

    fn read(&mut self) -> Result<Frame> {
        if let Some(limit) = self.frame_limit {
            if self.frame_count >= limit {
                return Err(anyhow!(
                    "synthetic camera disconnected after {} frames",
                    limit
                ));
            }
        }
        self.frame_count += 1;
        Frame::from_bgr(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, self.generate_pixels())
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let len = (SYNTHETIC_WIDTH * SYNTHETIC_HEIGHT) as usize * 3;
        let mut pixels = vec![0u8; len];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 / 3 + self.frame_count * 7) % 256) as u8;
        }
        pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camera_specifiers() {
        assert_eq!("0".parse::<CameraSpec>().unwrap(), CameraSpec::Index(0));
        assert_eq!(" 2 ".parse::<CameraSpec>().unwrap(), CameraSpec::Index(2));
        assert_eq!(
            "stub://camera".parse::<CameraSpec>().unwrap(),
            CameraSpec::Synthetic { frame_limit: None }
        );
        assert_eq!(
            "stub://camera?frames=3".parse::<CameraSpec>().unwrap(),
            CameraSpec::Synthetic {
                frame_limit: Some(3)
            }
        );
        assert_eq!(
            "stub://offline".parse::<CameraSpec>().unwrap(),
            CameraSpec::Offline
        );
        assert!("-1".parse::<CameraSpec>().is_err());
        assert!("front".parse::<CameraSpec>().is_err());
        assert!("stub://camera?fps=3".parse::<CameraSpec>().is_err());
    }

    #[test]
    fn misspelled_stub_camera_is_rejected() {
        for raw in ["stub://ofline", "stub://", "stub://webcam", "stub://offline?frames=2"] {
            let err = raw.parse::<CameraSpec>().unwrap_err();
            assert!(err.to_string().contains("stub://offline"), "{raw}: {err}");
        }
    }

    #[test]
    fn spec_display_round_trips() {
        for raw in ["0", "stub://camera", "stub://camera?frames=9", "stub://offline"] {
            let spec: CameraSpec = raw.parse().unwrap();
            assert_eq!(spec.to_string(), raw);
        }
    }

    #[test]
    fn offline_camera_does_not_open() {
        assert!(CameraSource::open(&CameraSpec::Offline).is_none());
    }

    #[test]
    fn synthetic_camera_disconnects_at_limit() {
        let mut camera = CameraSource::open(&CameraSpec::Synthetic {
            frame_limit: Some(2),
        })
        .expect("synthetic camera opens");
        let first = camera.read().unwrap();
        let second = camera.read().unwrap();
        assert_eq!((first.width, first.height), (640, 480));
        assert_ne!(first, second);
        assert!(camera.read().is_err());
        assert_eq!(camera.stats().frames_captured, 2);
    }

    #[test]
    fn released_camera_refuses_reads() {
        let mut camera = CameraSource::open(&CameraSpec::Synthetic { frame_limit: None }).unwrap();
        camera.release();
        assert!(camera.is_released());
        assert!(camera.read().is_err());
        camera.release();
    }
}
