//! helmet_watch - live helmet detection
//!
//! This binary:
//! 1. Loads configuration (HELMET_CONFIG file, HELMET_* environment, then flags)
//! 2. Loads the Haar cascade, failing fast on a missing or unusable model
//! 3. Opens the camera, or falls back to a still image
//! 4. Runs the detection loop until the quit key, a capture failure or Ctrl-C

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;

use helmet_watch::{start_session, CameraSpec, HelmetConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Haar cascade XML model, or stub://none / stub://helmet for a dry run.
    #[arg(long, value_name = "PATH")]
    cascade: Option<PathBuf>,
    /// Still image used when no camera opens.
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,
    /// Camera device index, or a stub:// specifier.
    #[arg(long, value_name = "DEVICE")]
    camera: Option<CameraSpec>,
    /// Window title.
    #[arg(long)]
    window_title: Option<String>,
    /// Log frames instead of opening a window.
    #[arg(long)]
    headless: bool,
    /// Stop after this many frames.
    #[arg(long, value_name = "N")]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = HelmetConfig::load()?;
    apply_args(&mut cfg, args);
    cfg.validate()?;

    log::info!(
        "helmet_watch {} cascade={} fallback_image={} camera={}",
        env!("CARGO_PKG_VERSION"),
        cfg.cascade_path.display(),
        cfg.fallback_image.display(),
        cfg.camera
    );

    let session = start_session(&cfg)?;

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let summary = session.with_interrupt(rx).run();
    if !summary.is_clean() {
        return Err(anyhow!(
            "detection loop failed after {} frames: {:?}",
            summary.frames,
            summary.stop_reason
        ));
    }
    Ok(())
}

fn apply_args(cfg: &mut HelmetConfig, args: Args) {
    if let Some(path) = args.cascade {
        cfg.cascade_path = path;
    }
    if let Some(path) = args.image {
        cfg.fallback_image = path;
    }
    if let Some(camera) = args.camera {
        cfg.camera = camera;
    }
    if let Some(title) = args.window_title {
        cfg.window_title = title;
    }
    if args.headless {
        cfg.headless = true;
    }
    if args.max_frames.is_some() {
        cfg.max_frames = args.max_frames;
    }
}
