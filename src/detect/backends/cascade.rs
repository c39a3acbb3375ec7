#![cfg(feature = "backend-opencv")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use opencv::{
    core::{Mat, Rect, Size, Vector},
    imgproc,
    objdetect::CascadeClassifier,
    prelude::*,
};

use crate::detect::backend::{DetectionParams, DetectorBackend};
use crate::detect::result::{Detection, WindowSize};
use crate::frame::Frame;

/// Haar-cascade backend on OpenCV's `objdetect`.
///
/// The classifier file is opaque to this crate; OpenCV parses it. Each frame goes through
/// `cvt_color(COLOR_BGR2GRAY)` and `equalize_hist` before `detect_multi_scale`. The working
/// `Mat`s and the hit vector are reused across frames.
pub struct CascadeBackend {
    classifier: CascadeClassifier,
    input: Normalizer,
    hits: Vector<Rect>,
}

impl CascadeBackend {
    /// Load a serialized cascade. Fails if OpenCV rejects the file or it yields no stages.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("cascade path {} is not valid UTF-8", path.display()))?;
        let classifier = CascadeClassifier::new(path_str)
            .with_context(|| format!("failed to parse cascade {}", path.display()))?;
        if classifier.empty()? {
            return Err(anyhow!(
                "{} is not a usable Haar cascade (classifier is empty)",
                path.display()
            ));
        }
        Ok(Self {
            classifier,
            input: Normalizer::default(),
            hits: Vector::new(),
        })
    }
}

impl DetectorBackend for CascadeBackend {
    fn name(&self) -> &'static str {
        "haar-cascade"
    }

    fn detect(&mut self, frame: &Frame, params: &DetectionParams) -> Result<Vec<Detection>> {
        let gray = self.input.normalize(frame)?;
        self.hits.clear();
        self.classifier
            .detect_multi_scale(
                gray,
                &mut self.hits,
                params.scale_factor,
                params.min_neighbors,
                0,
                to_size(params.min_size),
                to_size(params.max_size),
            )
            .context("cascade detect_multi_scale failed")?;
        Ok(self
            .hits
            .iter()
            .map(|r| Detection::new(r.x, r.y, r.width, r.height))
            .collect())
    }
}

/// BGR -> grayscale -> equalized, on reusable `Mat`s.
#[derive(Default)]
struct Normalizer {
    bgr: Mat,
    gray: Mat,
    equalized: Mat,
}

impl Normalizer {
    fn normalize(&mut self, frame: &Frame) -> Result<&Mat> {
        frame.copy_into_mat(&mut self.bgr)?;
        imgproc::cvt_color(&self.bgr, &mut self.gray, imgproc::COLOR_BGR2GRAY, 0)
            .context("cvt_color BGR2GRAY failed")?;
        imgproc::equalize_hist(&self.gray, &mut self.equalized)
            .context("equalize_hist failed")?;
        Ok(&self.equalized)
    }
}

fn to_size(size: WindowSize) -> Size {
    Size::new(size.width as i32, size.height as i32)
}
