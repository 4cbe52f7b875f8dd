//! Hotloop - frame-stepped player for hot-reloaded simulation modules
//!
//! # Usage
//!
//! ```bash
//! hotloop                                  # built-in demo
//! hotloop target/wasm32-unknown-unknown/debug/game.wasm
//! hotloop game.wasm --width 1280 --height 720
//! hotloop game.wasm --headless 600 --dump-frame last.png
//! ```
//!
//! # Keyboard Shortcuts
//!
//! - L: Start recording / stop and loop the recording
//! - P: Toggle looped playback
//! - 1-4: Select replay slot
//! - ESC: Quit

mod app;
mod graphics;
mod headless;
mod session;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use hotloop_core::config::{self, Config};

#[derive(Parser, Debug)]
#[command(name = "hotloop")]
#[command(author, version, about = "Frame-stepped player for hot-reloaded simulation modules")]
struct Args {
    /// Simulation module (.wasm), reloaded whenever it is rebuilt; the built-in demo runs if omitted
    module: Option<PathBuf>,

    /// Back buffer width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Back buffer height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Permanent arena region size in bytes
    #[arg(long, value_name = "BYTES")]
    permanent_bytes: Option<usize>,

    /// Transient arena region size in bytes
    #[arg(long, value_name = "BYTES")]
    transient_bytes: Option<usize>,

    /// Disable audio output
    #[arg(long)]
    no_audio: bool,

    /// Run this many frames without a window, then exit
    #[arg(long, value_name = "FRAMES")]
    headless: Option<u64>,

    /// Write the final frame of a headless run to this PNG file
    #[arg(long, value_name = "FILE", requires = "headless")]
    dump_frame: Option<PathBuf>,

    /// Directory for persisted replay slots
    #[arg(long, value_name = "DIR")]
    slot_dir: Option<PathBuf>,

    /// Config file to use instead of the platform default
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Args {
    /// Command line values take precedence over the config file
    fn apply(&self, config: &mut Config) {
        if let Some(module) = &self.module {
            config.module.path = Some(module.clone());
        }
        if let Some(width) = self.width {
            config.video.width = width;
        }
        if let Some(height) = self.height {
            config.video.height = height;
        }
        if let Some(bytes) = self.permanent_bytes {
            config.arena.permanent_bytes = bytes;
        }
        if let Some(bytes) = self.transient_bytes {
            config.arena.transient_bytes = bytes;
        }
        if self.no_audio {
            config.audio.enabled = false;
        }
        if let Some(dir) = &self.slot_dir {
            config.replay.slot_dir = Some(dir.clone());
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::load_from(path),
        None => config::load(),
    };
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    if let Some(module) = &config.module.path
        && !module.exists()
    {
        tracing::warn!(
            "Module {} does not exist yet; waiting for it to be built",
            module.display()
        );
    }

    match args.headless {
        Some(frames) => headless::run(&config, frames, args.dump_frame.as_deref()),
        None => app::run(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "hotloop",
            "game.wasm",
            "--width",
            "320",
            "--no-audio",
            "--transient-bytes",
            "4096",
        ]);
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.module.path, Some(PathBuf::from("game.wasm")));
        assert_eq!(config.video.width, 320);
        assert_eq!(config.video.height, 540);
        assert_eq!(config.arena.transient_bytes, 4096);
        assert!(!config.audio.enabled);
    }

    #[test]
    fn test_dump_frame_requires_headless() {
        assert!(Args::try_parse_from(["hotloop", "--dump-frame", "out.png"]).is_err());
        assert!(
            Args::try_parse_from(["hotloop", "--headless", "10", "--dump-frame", "out.png"])
                .is_ok()
        );
    }
}
