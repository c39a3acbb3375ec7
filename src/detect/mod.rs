//! Helmet detection.
//!
//! `HelmetDetector` hands each frame to a `DetectorBackend` with the configured tuning. The
//! production backend is the OpenCV Haar cascade (feature: backend-opencv), which converts to
//! grayscale and equalizes the histogram before searching. `StubBackend` replays scripted
//! results for tests.
//!
//! The model path may also name a stub instead of a cascade file, for dry runs without
//! OpenCV:
//!
//! - `stub://none` reports no helmets
//! - `stub://helmet` reports one fixed helmet on every frame

mod backend;
mod backends;
mod result;

use std::path::Path;

use anyhow::Result;

pub use backend::{DetectionParams, DetectorBackend};
#[cfg(feature = "backend-opencv")]
pub use backends::CascadeBackend;
pub use backends::StubBackend;
pub use result::{Detection, WindowSize};

use crate::frame::Frame;
use crate::StartupError;

/// Model paths with this prefix select a stub backend instead of a cascade file.
pub const STUB_MODEL_PREFIX: &str = "stub://";

/// Detection stage of the loop: preprocessing plus one backend call per frame.
pub struct HelmetDetector {
    backend: Box<dyn DetectorBackend>,
    params: DetectionParams,
}

impl HelmetDetector {
    pub fn new<B: DetectorBackend + 'static>(backend: B, params: DetectionParams) -> Self {
        Self {
            backend: Box::new(backend),
            params,
        }
    }

    /// Load the cascade classifier at `path`.
    ///
    /// Startup-fatal on a missing or unusable model; the failure is logged here, where it
    /// originates, before being returned.
    pub fn load_cascade(path: &Path, params: DetectionParams) -> Result<Self, StartupError> {
        if let Some(name) = stub_model_name(path) {
            let backend = stub_model(path, name).inspect_err(|err| log::error!("{}", err))?;
            log::info!("using stub model {}", path.display());
            return Ok(Self::new(backend, params));
        }
        ensure_model_file(path).inspect_err(|err| log::error!("{}", err))?;
        let detector = open_cascade(path, params).inspect_err(|err| log::error!("{}", err))?;
        log::info!(
            "loaded cascade {} (backend={})",
            path.display(),
            detector.backend_name()
        );
        Ok(detector)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    /// Run the backend on one frame.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        self.backend.detect(frame, &self.params)
    }
}

/// Existence check performed before the model is handed to the backend.
pub fn ensure_model_file(path: &Path) -> Result<(), StartupError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(StartupError::ModelMissing(path.to_path_buf()))
    }
}

fn stub_model_name(path: &Path) -> Option<&str> {
    path.to_str()?.strip_prefix(STUB_MODEL_PREFIX)
}

fn stub_model(path: &Path, name: &str) -> Result<StubBackend, StartupError> {
    match name {
        "none" => Ok(StubBackend::new()),
        "helmet" => Ok(StubBackend::constant(vec![Detection::new(40, 60, 120, 120)])),
        _ => Err(StartupError::ModelUnusable {
            path: path.to_path_buf(),
            reason: "unknown stub model, expected stub://none or stub://helmet".to_string(),
        }),
    }
}

#[cfg(feature = "backend-opencv")]
fn open_cascade(path: &Path, params: DetectionParams) -> Result<HelmetDetector, StartupError> {
    let backend = CascadeBackend::load(path).map_err(|err| StartupError::ModelUnusable {
        path: path.to_path_buf(),
        reason: format!("{:#}", err),
    })?;
    Ok(HelmetDetector::new(backend, params))
}

#[cfg(not(feature = "backend-opencv"))]
fn open_cascade(_path: &Path, _params: DetectionParams) -> Result<HelmetDetector, StartupError> {
    Err(StartupError::BackendUnavailable(
        "cascade detection requires the backend-opencv feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_reported_before_backend_load() {
        let path = Path::new("/nonexistent/haarcascade_helmet.xml");
        match HelmetDetector::load_cascade(path, DetectionParams::default()) {
            Err(StartupError::ModelMissing(p)) => assert_eq!(p, path),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("missing model must not load"),
        }
    }

    #[test]
    fn directory_is_not_a_model_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ensure_model_file(dir.path()),
            Err(StartupError::ModelMissing(_))
        ));
    }

    #[test]
    fn stub_models_load_without_a_file() {
        let mut none =
            HelmetDetector::load_cascade(Path::new("stub://none"), DetectionParams::default())
                .unwrap();
        assert_eq!(none.backend_name(), "stub");
        let frame = Frame::filled(320, 240, [0, 0, 0]);
        assert!(none.detect(&frame).unwrap().is_empty());

        let mut helmet =
            HelmetDetector::load_cascade(Path::new("stub://helmet"), DetectionParams::default())
                .unwrap();
        assert_eq!(helmet.detect(&frame).unwrap().len(), 1);
    }

    #[test]
    fn unknown_stub_model_is_unusable() {
        let path = Path::new("stub://helmets");
        match HelmetDetector::load_cascade(path, DetectionParams::default()) {
            Err(StartupError::ModelUnusable { path: p, reason }) => {
                assert_eq!(p, path);
                assert!(reason.contains("stub://none"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("unknown stub model must not load"),
        }
    }

    #[cfg(not(feature = "backend-opencv"))]
    #[test]
    fn cascade_file_needs_the_opencv_backend() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            HelmetDetector::load_cascade(file.path(), DetectionParams::default()),
            Err(StartupError::BackendUnavailable(_))
        ));
    }

    #[cfg(feature = "backend-opencv")]
    #[test]
    fn garbage_cascade_file_is_unusable() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".xml").tempfile().unwrap();
        file.write_all(b"<?xml version=\"1.0\"?>\n<opencv_storage><cascade>helmet</cascade></opencv_storage>\n")
            .unwrap();
        match HelmetDetector::load_cascade(file.path(), DetectionParams::default()) {
            Err(StartupError::ModelUnusable { path, .. }) => assert_eq!(path, file.path()),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("garbage cascade must not load"),
        }
    }

    #[test]
    fn detector_passes_frame_to_backend() {
        let hit = Detection::new(5, 5, 50, 50);
        let mut detector =
            HelmetDetector::new(StubBackend::constant(vec![hit]), DetectionParams::default());
        let frame = Frame::filled(64, 64, [0, 128, 255]);
        assert_eq!(detector.detect(&frame).unwrap(), vec![hit]);
        assert_eq!(detector.backend_name(), "stub");
        assert_eq!(detector.params().min_neighbors, 3);
    }

    #[test]
    fn default_params_match_tuning() {
        let params = DetectionParams::default();
        assert_eq!(params.scale_factor, 1.05);
        assert_eq!(params.min_neighbors, 3);
        assert_eq!(params.min_size, WindowSize::square(50));
        assert_eq!(params.max_size, WindowSize::square(200));
    }
}
