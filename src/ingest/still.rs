//! Still-image frame source.
//!
//! The fallback image is decoded once at startup. The loop then reuses the same in-memory
//! frame on every iteration and never touches the file again.

use std::path::Path;

use anyhow::{Context, Result};

use crate::frame::Frame;

/// Decode a raster image into a BGR `Frame`.
///
/// A missing file and an undecodable file both fail; the error message carries the
/// underlying cause so the two cases stay distinguishable in the diagnostic.
pub fn load_still(path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("failed to load fallback image {}", path.display()))?;
    let frame = Frame::from_rgb_image(&image.to_rgb8());
    log::info!(
        "fallback image {} decoded ({}x{})",
        path.display(),
        frame.width,
        frame.height
    );
    Ok(frame)
}
