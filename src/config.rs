use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{DetectionParams, WindowSize};
use crate::ingest::{CameraSpec, SourceMode};

const DEFAULT_CASCADE_PATH: &str = "haarcascade_helmet.xml";
const DEFAULT_FALLBACK_IMAGE: &str = "test_helmet.jpg";
const DEFAULT_CAMERA: &str = "0";
const DEFAULT_WINDOW_TITLE: &str = "Helmet Detection";
const DEFAULT_WEBCAM_POLL_MS: u64 = 1;
const DEFAULT_IMAGE_POLL_MS: u64 = 500;
const DEFAULT_QUIT_KEY: char = 'q';

#[derive(Debug, Deserialize, Default)]
struct HelmetConfigFile {
    cascade_path: Option<PathBuf>,
    fallback_image: Option<PathBuf>,
    camera: Option<String>,
    window_title: Option<String>,
    headless: Option<bool>,
    max_frames: Option<u64>,
    detection: Option<DetectionConfigFile>,
    poll: Option<PollConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    scale_factor: Option<f64>,
    min_neighbors: Option<i32>,
    min_size: Option<WindowSize>,
    max_size: Option<WindowSize>,
}

#[derive(Debug, Deserialize, Default)]
struct PollConfigFile {
    webcam_ms: Option<u64>,
    image_ms: Option<u64>,
    quit_key: Option<char>,
}

#[derive(Debug, Clone)]
pub struct HelmetConfig {
    pub cascade_path: PathBuf,
    pub fallback_image: PathBuf,
    pub camera: CameraSpec,
    pub window_title: String,
    pub headless: bool,
    pub max_frames: Option<u64>,
    pub detection: DetectionParams,
    pub poll: PollSettings,
}

/// Key-poll timing per source mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub webcam: Duration,
    /// Longer in image mode: the same frame would otherwise be reprocessed flat out.
    pub image: Duration,
    pub quit_key: char,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            webcam: Duration::from_millis(DEFAULT_WEBCAM_POLL_MS),
            image: Duration::from_millis(DEFAULT_IMAGE_POLL_MS),
            quit_key: DEFAULT_QUIT_KEY,
        }
    }
}

impl PollSettings {
    pub fn timeout_for(&self, mode: SourceMode) -> Duration {
        match mode {
            SourceMode::Webcam => self.webcam,
            SourceMode::Image => self.image,
        }
    }
}

impl Default for HelmetConfig {
    fn default() -> Self {
        Self {
            cascade_path: PathBuf::from(DEFAULT_CASCADE_PATH),
            fallback_image: PathBuf::from(DEFAULT_FALLBACK_IMAGE),
            camera: CameraSpec::default(),
            window_title: DEFAULT_WINDOW_TITLE.to_string(),
            headless: false,
            max_frames: None,
            detection: DetectionParams::default(),
            poll: PollSettings::default(),
        }
    }
}

impl HelmetConfig {
    /// Defaults, then the file named by `HELMET_CONFIG`, then `HELMET_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("HELMET_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: HelmetConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let camera = match file.camera {
            Some(raw) => raw.parse()?,
            None => DEFAULT_CAMERA.parse()?,
        };
        let detection = DetectionParams {
            scale_factor: file
                .detection
                .as_ref()
                .and_then(|d| d.scale_factor)
                .unwrap_or(defaults.detection.scale_factor),
            min_neighbors: file
                .detection
                .as_ref()
                .and_then(|d| d.min_neighbors)
                .unwrap_or(defaults.detection.min_neighbors),
            min_size: file
                .detection
                .as_ref()
                .and_then(|d| d.min_size)
                .unwrap_or(defaults.detection.min_size),
            max_size: file
                .detection
                .as_ref()
                .and_then(|d| d.max_size)
                .unwrap_or(defaults.detection.max_size),
        };
        let poll = PollSettings {
            webcam: file
                .poll
                .as_ref()
                .and_then(|p| p.webcam_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll.webcam),
            image: file
                .poll
                .as_ref()
                .and_then(|p| p.image_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll.image),
            quit_key: file
                .poll
                .and_then(|p| p.quit_key)
                .unwrap_or(defaults.poll.quit_key),
        };
        Ok(Self {
            cascade_path: file.cascade_path.unwrap_or(defaults.cascade_path),
            fallback_image: file.fallback_image.unwrap_or(defaults.fallback_image),
            camera,
            window_title: file.window_title.unwrap_or(defaults.window_title),
            headless: file.headless.unwrap_or(defaults.headless),
            max_frames: file.max_frames,
            detection,
            poll,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("HELMET_CASCADE_PATH") {
            if !path.trim().is_empty() {
                self.cascade_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("HELMET_FALLBACK_IMAGE") {
            if !path.trim().is_empty() {
                self.fallback_image = PathBuf::from(path);
            }
        }
        if let Ok(camera) = std::env::var("HELMET_CAMERA") {
            if !camera.trim().is_empty() {
                self.camera = camera.parse()?;
            }
        }
        if let Ok(title) = std::env::var("HELMET_WINDOW_TITLE") {
            if !title.trim().is_empty() {
                self.window_title = title;
            }
        }
        if let Ok(raw) = std::env::var("HELMET_SCALE_FACTOR") {
            self.detection.scale_factor = raw
                .parse()
                .map_err(|_| anyhow!("HELMET_SCALE_FACTOR must be a number"))?;
        }
        if let Ok(raw) = std::env::var("HELMET_MIN_NEIGHBORS") {
            self.detection.min_neighbors = raw
                .parse()
                .map_err(|_| anyhow!("HELMET_MIN_NEIGHBORS must be an integer"))?;
        }
        if let Ok(raw) = std::env::var("HELMET_MAX_FRAMES") {
            let frames: u64 = raw
                .parse()
                .map_err(|_| anyhow!("HELMET_MAX_FRAMES must be an integer number of frames"))?;
            self.max_frames = Some(frames);
        }
        Ok(())
    }

    /// Reject settings the detector or loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;
        if d.scale_factor.is_nan() || d.scale_factor <= 1.0 {
            return Err(anyhow!(
                "scale_factor must be greater than 1.0, got {}",
                d.scale_factor
            ));
        }
        if d.min_neighbors < 0 {
            return Err(anyhow!("min_neighbors must be >= 0"));
        }
        for size in [d.min_size, d.max_size] {
            if size.width == 0 || size.height == 0 {
                return Err(anyhow!("detection window sizes must be non-zero"));
            }
        }
        if !d.max_size.contains(&d.min_size) {
            return Err(anyhow!(
                "min_size {}x{} exceeds max_size {}x{}",
                d.min_size.width,
                d.min_size.height,
                d.max_size.width,
                d.max_size.height
            ));
        }
        if self.poll.webcam.is_zero() || self.poll.image.is_zero() {
            return Err(anyhow!("key poll timeouts must be greater than zero"));
        }
        if !self.poll.quit_key.is_ascii_graphic() {
            return Err(anyhow!("quit_key must be a printable ASCII character"));
        }
        if self.max_frames == Some(0) {
            return Err(anyhow!("max_frames must be greater than zero"));
        }
        if self.window_title.trim().is_empty() {
            return Err(anyhow!("window_title must not be empty"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<HelmetConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
