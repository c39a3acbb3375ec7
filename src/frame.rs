//! Frame container for the detection loop.
//!
//! `Frame` is an owned 8-bit BGR pixel buffer: one camera read, or the decoded still image.
//! Grayscale conversion and histogram equalization happen inside the detector backend, on
//! OpenCV `Mat`s, so the cascade sees exactly the preprocessing it was trained against.

use anyhow::{anyhow, Result};

/// Number of interleaved channels in a `Frame`.
pub const BGR_CHANNELS: usize = 3;

/// Color frame, 8 bits per sample, BGR channel order, rows packed without padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap a packed BGR buffer. Fails when the length does not match the dimensions.
    pub fn from_bgr(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = packed_len(width, height, BGR_CHANNELS)?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} BGR bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Solid frame of one BGR color.
    pub fn filled(width: u32, height: u32, bgr: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * BGR_CHANNELS);
        for _ in 0..pixels {
            data.extend_from_slice(&bgr);
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Convert a decoded RGB image into BGR order.
    pub fn from_rgb_image(image: &image::RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let mut data = Vec::with_capacity(width as usize * height as usize * BGR_CHANNELS);
        for pixel in image.pixels() {
            let [r, g, b] = pixel.0;
            data.extend_from_slice(&[b, g, r]);
        }
        Self {
            data,
            width,
            height,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// BGR triple at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BGR_CHANNELS;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Copy the pixels into a `CV_8UC3` `Mat`, reallocating it only when the size changes.
    #[cfg(feature = "backend-opencv")]
    pub(crate) fn copy_into_mat(&self, mat: &mut opencv::core::Mat) -> Result<()> {
        use opencv::core::{Scalar, CV_8UC3};
        use opencv::prelude::*;

        let rows = self.height as i32;
        let cols = self.width as i32;
        if mat.rows() != rows || mat.cols() != cols || mat.typ() != CV_8UC3 {
            *mat = opencv::core::Mat::new_rows_cols_with_default(
                rows,
                cols,
                CV_8UC3,
                Scalar::all(0.0),
            )?;
        }
        mat.data_bytes_mut()?.copy_from_slice(&self.data);
        Ok(())
    }
}

fn packed_len(width: u32, height: u32, channels: usize) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(channels))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
