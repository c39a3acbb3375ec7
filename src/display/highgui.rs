use std::time::Duration;

use anyhow::{Context, Result};
use opencv::{
    core::{self, Mat, Rect, Scalar},
    highgui, imgproc,
    prelude::*,
};

use super::Surface;
use crate::annotate::{Canvas, Color, Overlay, Point};
use crate::detect::Detection;
use crate::frame::Frame;

/// OpenCV `highgui` window.
///
/// Frames are copied into one reusable `Mat`, annotated in place, then shown. The source
/// frame is never drawn on, so a still image is detected on the same pixels every cycle.
pub struct HighguiSurface {
    title: String,
    canvas: Mat,
    open: bool,
}

impl HighguiSurface {
    pub fn open(title: &str) -> Result<Self> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("failed to open window {:?}", title))?;
        log::info!("window {:?} opened", title);
        Ok(Self {
            title: title.to_string(),
            canvas: Mat::default(),
            open: true,
        })
    }
}

impl Surface for HighguiSurface {
    fn name(&self) -> &'static str {
        "highgui"
    }

    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()> {
        frame.copy_into_mat(&mut self.canvas)?;
        overlay.render(&mut self.canvas)?;
        highgui::imshow(&self.title, &self.canvas)?;
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>> {
        let millis = timeout.as_millis().clamp(1, i32::MAX as u128) as i32;
        let key = highgui::wait_key(millis)?;
        if key < 0 {
            return Ok(None);
        }
        Ok(Some(((key & 0xFF) as u8) as char))
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Err(err) = highgui::destroy_window(&self.title) {
            log::warn!("failed to close window {:?}: {}", self.title, err);
        }
    }
}

impl Drop for HighguiSurface {
    fn drop(&mut self) {
        self.close();
    }
}

fn scalar(color: Color) -> Scalar {
    Scalar::new(color.b as f64, color.g as f64, color.r as f64, 0.0)
}

impl Canvas for Mat {
    fn rectangle(&mut self, bounds: &Detection, color: Color, thickness: i32) -> Result<()> {
        let rect = Rect::new(bounds.x, bounds.y, bounds.width, bounds.height);
        imgproc::rectangle(self, rect, scalar(color), thickness, imgproc::LINE_8, 0)?;
        Ok(())
    }

    fn text(
        &mut self,
        text: &str,
        origin: Point,
        scale: f64,
        color: Color,
        thickness: i32,
    ) -> Result<()> {
        imgproc::put_text(
            self,
            text,
            core::Point::new(origin.x, origin.y),
            imgproc::FONT_HERSHEY_SIMPLEX,
            scale,
            scalar(color),
            thickness,
            imgproc::LINE_8,
            false,
        )?;
        Ok(())
    }
}
