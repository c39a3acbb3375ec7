//! Display surfaces.
//!
//! A `Surface` shows the current frame with its overlay and performs the bounded key poll
//! that is the loop's only wait. `HighguiSurface` opens an OpenCV window
//! (feature: backend-opencv); `HeadlessSurface` logs instead of drawing and is what tests
//! drive with scripted keys.

mod headless;
#[cfg(feature = "backend-opencv")]
mod highgui;

use std::time::Duration;

use anyhow::Result;

pub use headless::{HeadlessSurface, Presentation, PresentationLog};
#[cfg(feature = "backend-opencv")]
pub use highgui::HighguiSurface;

use crate::annotate::Overlay;
use crate::frame::Frame;
use crate::StartupError;

pub trait Surface {
    /// Surface identifier.
    fn name(&self) -> &'static str;

    /// Show `frame` with `overlay` drawn over it.
    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()>;

    /// Wait up to `timeout` for a key press.
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>>;

    /// Tear down the surface. Must be safe to call more than once.
    fn close(&mut self);
}

/// Open the surface selected by configuration.
pub fn open_surface(title: &str, headless: bool) -> Result<Box<dyn Surface>, StartupError> {
    if headless {
        log::info!("running headless; frames are logged, not displayed");
        return Ok(Box::new(HeadlessSurface::new(title)));
    }
    open_window(title)
}

#[cfg(feature = "backend-opencv")]
fn open_window(title: &str) -> Result<Box<dyn Surface>, StartupError> {
    let window = HighguiSurface::open(title).map_err(|err| {
        let err = StartupError::DisplayUnavailable(format!("{:#}", err));
        log::error!("{}", err);
        err
    })?;
    Ok(Box::new(window))
}

#[cfg(not(feature = "backend-opencv"))]
fn open_window(_title: &str) -> Result<Box<dyn Surface>, StartupError> {
    Err(StartupError::BackendUnavailable(
        "window display requires the backend-opencv feature (or run headless)",
    ))
}
