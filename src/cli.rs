//! Command line surface of the two binaries.
//!
//! clap's own help is disabled: `--help` prints [`camera_usage`] / [`image_usage`],
//! which are plain formatting functions so they can be tested without a process.
//! Numeric flags are taken as text and fall back to their defaults when they do not
//! parse.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use crate::config::{
    clamp_alpha, parse_or, PerceptionConfig, DEFAULT_CAMERA, DEFAULT_HEIGHT, DEFAULT_THRESHOLD,
    DEFAULT_WIDTH,
};
use crate::detect::{NetworkRegistry, OverlayFlags, DEFAULT_ALPHA, DEFAULT_OVERLAY};

#[derive(Parser, Debug, Default)]
#[command(name = "detectnet-camera", disable_help_flag = true, disable_version_flag = true)]
pub struct CameraArgs {
    #[arg(long, short = 'h')]
    pub help: bool,

    /// Network name or model path.
    #[arg(long, value_name = "NAME")]
    pub network: Option<String>,

    /// Overlay flags: box,labels,conf or none.
    #[arg(long, value_name = "FLAGS")]
    pub overlay: Option<String>,

    #[arg(long, value_name = "N", allow_hyphen_values = true)]
    pub alpha: Option<String>,

    /// Camera index, V4L2 device path or stub:// URL.
    #[arg(long, value_name = "ID")]
    pub camera: Option<String>,

    #[arg(long, value_name = "W")]
    pub width: Option<String>,

    #[arg(long, value_name = "H")]
    pub height: Option<String>,

    #[arg(long, value_name = "T", allow_hyphen_values = true)]
    pub threshold: Option<String>,

    /// Class description file.
    #[arg(long, value_name = "FILE")]
    pub labels: Option<PathBuf>,

    /// Run without a display; detections are still reported.
    #[arg(long)]
    pub headless: bool,

    /// Write annotated PNG snapshots here instead of logging the display.
    #[arg(long, value_name = "DIR")]
    pub snapshot_dir: Option<PathBuf>,

    #[arg(long)]
    pub profile: bool,

    /// Stop after N frames.
    #[arg(long, value_name = "N")]
    pub frames: Option<String>,

    /// Capture timeout in milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout: Option<String>,

    #[arg(long, default_value = "auto", value_name = "MODE")]
    pub ui: String,

    /// TOML config file (overrides PERCEPTION_CONFIG).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl CameraArgs {
    /// Resolve the run configuration: file and environment first, then these flags.
    pub fn resolve(&self) -> Result<PerceptionConfig> {
        let mut cfg = PerceptionConfig::load(self.config.as_deref())?;
        self.apply_to(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply the flags that were given on top of `cfg`.
    pub fn apply_to(&self, cfg: &mut PerceptionConfig) {
        if let Some(network) = &self.network {
            cfg.network = Some(network.clone());
        }
        if let Some(overlay) = &self.overlay {
            cfg.overlay.flags = OverlayFlags::parse(overlay);
        }
        if let Some(alpha) = &self.alpha {
            cfg.overlay.alpha = clamp_alpha(parse_or("--alpha", alpha, DEFAULT_ALPHA as i64));
        }
        if let Some(camera) = &self.camera {
            cfg.camera.device = camera.clone();
        }
        if let Some(width) = &self.width {
            cfg.camera.width = parse_or("--width", width, DEFAULT_WIDTH);
        }
        if let Some(height) = &self.height {
            cfg.camera.height = parse_or("--height", height, DEFAULT_HEIGHT);
        }
        if let Some(threshold) = &self.threshold {
            cfg.threshold = parse_or("--threshold", threshold, DEFAULT_THRESHOLD);
        }
        if let Some(labels) = &self.labels {
            cfg.labels = Some(labels.clone());
        }
        if self.headless {
            cfg.display.headless = true;
        }
        if let Some(dir) = &self.snapshot_dir {
            cfg.display.snapshot_dir = Some(dir.clone());
        }
        if self.profile {
            cfg.profile = true;
        }
        if let Some(frames) = &self.frames {
            match frames.trim().parse::<u64>() {
                Ok(n) => cfg.max_frames = Some(n),
                Err(_) => log::warn!("invalid --frames '{}', running until stopped", frames),
            }
        }
        if let Some(timeout) = &self.timeout {
            let current = cfg.camera.capture_timeout.as_millis() as u64;
            cfg.camera.capture_timeout =
                Duration::from_millis(parse_or("--timeout", timeout, current));
        }
    }
}

#[derive(Parser, Debug, Default)]
#[command(name = "recognize-image", disable_help_flag = true, disable_version_flag = true)]
pub struct ImageArgs {
    #[arg(long, short = 'h')]
    pub help: bool,

    /// Image file (or stub:// URL) to classify.
    #[arg(value_name = "IMAGE")]
    pub image: Option<String>,

    #[arg(long, value_name = "NAME")]
    pub network: Option<String>,

    #[arg(long, value_name = "FILE")]
    pub labels: Option<PathBuf>,

    #[arg(long)]
    pub profile: bool,
}

impl ImageArgs {
    pub fn labels(&self) -> Option<&Path> {
        self.labels.as_deref()
    }
}

/// Help text for `detectnet-camera`.
pub fn camera_usage(registry: &NetworkRegistry) -> String {
    let mut out = String::new();
    out.push_str(
        "usage: detectnet-camera [--help] [--network NAME] [--overlay FLAGS] [--alpha N]\n\
         \x20                       [--camera ID] [--width W] [--height H] [--threshold T]\n\
         \x20                       [--labels FILE] [--headless] [--snapshot-dir DIR]\n\
         \x20                       [--profile] [--frames N] [--timeout MS] [--ui MODE]\n\
         \x20                       [--config PATH]\n\n\
         Locate objects in a live camera stream using an object detection network.\n\n",
    );
    out.push_str("arguments:\n");
    let _ = writeln!(out, "  --network NAME     network to load (see below)");
    let _ = writeln!(
        out,
        "  --overlay FLAGS    box, labels, conf or none (default: {})",
        DEFAULT_OVERLAY
    );
    let _ = writeln!(
        out,
        "  --alpha N          overlay blending alpha, 0-255 (default: {})",
        DEFAULT_ALPHA
    );
    let _ = writeln!(
        out,
        "  --camera ID        camera index, /dev/videoN or stub://NAME (default: {})",
        DEFAULT_CAMERA
    );
    let _ = writeln!(
        out,
        "  --width W          capture width (default: {})",
        DEFAULT_WIDTH
    );
    let _ = writeln!(
        out,
        "  --height H         capture height (default: {})",
        DEFAULT_HEIGHT
    );
    let _ = writeln!(
        out,
        "  --threshold T      minimum detection confidence, 0-1 (default: {})",
        DEFAULT_THRESHOLD
    );
    out.push_str("  --labels FILE      class descriptions, one per line\n");
    out.push_str("  --headless         do not present frames\n");
    out.push_str("  --snapshot-dir DIR write annotated PNG snapshots to DIR\n");
    out.push_str("  --profile          print per-stage network timings\n");
    out.push_str("  --frames N         stop after N frames\n");
    out.push_str("  --timeout MS       capture timeout in milliseconds\n");
    out.push_str("  --ui MODE          startup output: auto, plain or pretty\n");
    out.push_str("  --config PATH      TOML config file\n\n");
    out.push_str(&registry.usage());
    out
}

/// Help text for `recognize-image`.
pub fn image_usage(registry: &NetworkRegistry) -> String {
    let mut out = String::from(
        "usage: recognize-image [--help] [--network NAME] [--labels FILE] [--profile] IMAGE\n\n\
         Classify a single image file.\n\n\
         arguments:\n\
         \x20 IMAGE              image file to classify\n\
         \x20 --network NAME     network to load (see below)\n\
         \x20 --labels FILE      class descriptions, one per line\n\
         \x20 --profile          print per-stage network timings\n\n",
    );
    out.push_str(&registry.usage());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let args = CameraArgs::parse_from([
            "detectnet-camera",
            "--network",
            "synthetic",
            "--overlay",
            "none",
            "--width",
            "640",
            "--threshold",
            "0.8",
            "--frames",
            "12",
            "--headless",
        ]);
        let mut cfg = PerceptionConfig::default();
        args.apply_to(&mut cfg);
        assert_eq!(cfg.network.as_deref(), Some("synthetic"));
        assert!(cfg.overlay.flags.is_empty());
        assert_eq!(cfg.camera.width, 640);
        assert_eq!(cfg.camera.height, DEFAULT_HEIGHT);
        assert_eq!(cfg.threshold, 0.8);
        assert_eq!(cfg.max_frames, Some(12));
        assert!(cfg.display.headless);
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let args = CameraArgs::parse_from([
            "detectnet-camera",
            "--width",
            "wide",
            "--height",
            "tall",
            "--threshold",
            "high",
            "--alpha",
            "opaque",
        ]);
        let mut cfg = PerceptionConfig::default();
        cfg.camera.width = 320;
        args.apply_to(&mut cfg);
        assert_eq!(cfg.camera.width, DEFAULT_WIDTH);
        assert_eq!(cfg.camera.height, DEFAULT_HEIGHT);
        assert_eq!(cfg.threshold, DEFAULT_THRESHOLD);
        assert_eq!(cfg.overlay.alpha, DEFAULT_ALPHA);
    }

    #[test]
    fn help_flag_is_ours() {
        let args = CameraArgs::parse_from(["detectnet-camera", "--help"]);
        assert!(args.help);
        let args = ImageArgs::parse_from(["recognize-image", "-h"]);
        assert!(args.help);
        assert!(args.image.is_none());
    }

    #[test]
    fn usage_lists_flags_and_networks() {
        let registry = NetworkRegistry::builtin();
        let usage = camera_usage(&registry);
        assert!(usage.starts_with("usage: detectnet-camera"));
        for flag in ["--network", "--overlay", "--alpha", "--camera", "--threshold"] {
            assert!(usage.contains(flag), "missing {flag}");
        }
        assert!(usage.contains("synthetic"));
        assert!(image_usage(&registry).contains("IMAGE"));
    }
}
