use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::detect::{OverlayConfig, OverlayFlags, DEFAULT_ALPHA, DEFAULT_OVERLAY};

/// First V4L2 camera when built with it, the synthetic camera otherwise.
pub const DEFAULT_CAMERA: &str = if cfg!(feature = "ingest-v4l2") {
    "0"
} else {
    "stub://camera0"
};
pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;
pub const DEFAULT_THRESHOLD: f32 = 0.5;
pub const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 1000;
const DEFAULT_SNAPSHOT_EVERY: u64 = 1;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PerceptionConfigFile {
    camera: Option<CameraConfigFile>,
    network: Option<NetworkConfigFile>,
    overlay: Option<OverlayConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    capture_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct NetworkConfigFile {
    name: Option<String>,
    threshold: Option<f32>,
    labels: Option<PathBuf>,
    profile: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OverlayConfigFile {
    flags: Option<String>,
    alpha: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DisplayConfigFile {
    headless: Option<bool>,
    snapshot_dir: Option<PathBuf>,
    snapshot_every: Option<u64>,
}

/// Fully resolved settings for a run: defaults, then config file, then
/// environment, then command line.
#[derive(Debug, Clone, PartialEq)]
pub struct PerceptionConfig {
    /// Network name or model path. `None` uses the registry default.
    pub network: Option<String>,
    pub labels: Option<PathBuf>,
    pub threshold: f32,
    pub profile: bool,
    pub camera: CameraSettings,
    pub overlay: OverlayConfig,
    pub display: DisplaySettings,
    /// Stop after this many ticks.
    pub max_frames: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub capture_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySettings {
    pub headless: bool,
    pub snapshot_dir: Option<PathBuf>,
    pub snapshot_every: u64,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self::from_file(PerceptionConfigFile::default())
    }
}

impl PerceptionConfig {
    /// Defaults, the config file (`path`, else `PERCEPTION_CONFIG`), then the
    /// environment. Command line overrides and [`validate`](Self::validate) come after.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("PERCEPTION_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let file_cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => read_config_file(&path)?,
            None => PerceptionConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: PerceptionConfigFile) -> Self {
        let camera = file.camera.unwrap_or_default();
        let network = file.network.unwrap_or_default();
        let overlay = file.overlay.unwrap_or_default();
        let display = file.display.unwrap_or_default();

        Self {
            network: network.name,
            labels: network.labels,
            threshold: network.threshold.unwrap_or(DEFAULT_THRESHOLD),
            profile: network.profile.unwrap_or(false),
            camera: CameraSettings {
                device: camera.device.unwrap_or_else(|| DEFAULT_CAMERA.to_string()),
                width: camera.width.unwrap_or(DEFAULT_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_HEIGHT),
                capture_timeout: Duration::from_millis(
                    camera
                        .capture_timeout_ms
                        .unwrap_or(DEFAULT_CAPTURE_TIMEOUT_MS),
                ),
            },
            overlay: OverlayConfig {
                flags: OverlayFlags::parse(overlay.flags.as_deref().unwrap_or(DEFAULT_OVERLAY)),
                alpha: clamp_alpha(overlay.alpha.unwrap_or(DEFAULT_ALPHA as i64)),
            },
            display: DisplaySettings {
                headless: display.headless.unwrap_or(false),
                snapshot_dir: display.snapshot_dir,
                snapshot_every: display.snapshot_every.unwrap_or(DEFAULT_SNAPSHOT_EVERY),
            },
            max_frames: None,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(network) = std::env::var("PERCEPTION_NETWORK") {
            if !network.trim().is_empty() {
                self.network = Some(network);
            }
        }
        if let Ok(camera) = std::env::var("PERCEPTION_CAMERA") {
            if !camera.trim().is_empty() {
                self.camera.device = camera;
            }
        }
        if let Ok(overlay) = std::env::var("PERCEPTION_OVERLAY") {
            if !overlay.trim().is_empty() {
                self.overlay.flags = OverlayFlags::parse(&overlay);
            }
        }
        if let Ok(threshold) = std::env::var("PERCEPTION_THRESHOLD") {
            self.threshold = parse_or("PERCEPTION_THRESHOLD", &threshold, self.threshold);
        }
        if let Ok(timeout) = std::env::var("PERCEPTION_CAPTURE_TIMEOUT_MS") {
            let millis: u64 = timeout.trim().parse().map_err(|_| {
                anyhow!("PERCEPTION_CAPTURE_TIMEOUT_MS must be an integer number of milliseconds")
            })?;
            self.camera.capture_timeout = Duration::from_millis(millis);
        }
        Ok(())
    }

    /// Clamp soft limits and reject settings the loop cannot run with.
    pub fn validate(&mut self) -> Result<()> {
        if !self.threshold.is_finite() {
            log::warn!("threshold is not a number, using {}", DEFAULT_THRESHOLD);
            self.threshold = DEFAULT_THRESHOLD;
        }
        let clamped = self.threshold.clamp(0.0, 1.0);
        if clamped != self.threshold {
            log::warn!("threshold {} clamped to {}", self.threshold, clamped);
            self.threshold = clamped;
        }
        if self.camera.width == 0 {
            log::warn!("camera width must be positive, using {}", DEFAULT_WIDTH);
            self.camera.width = DEFAULT_WIDTH;
        }
        if self.camera.height == 0 {
            log::warn!("camera height must be positive, using {}", DEFAULT_HEIGHT);
            self.camera.height = DEFAULT_HEIGHT;
        }
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.capture_timeout.is_zero() {
            return Err(anyhow!("capture timeout must be greater than zero"));
        }
        if self.display.snapshot_every == 0 {
            return Err(anyhow!("snapshot_every must be greater than zero"));
        }
        if self.max_frames == Some(0) {
            return Err(anyhow!("frame limit must be greater than zero"));
        }
        Ok(())
    }
}

/// Parse a numeric setting, keeping `default` (with a warning) when the value
/// does not parse.
pub fn parse_or<T>(name: &str, raw: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
{
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            log::warn!("invalid {} '{}', using {}", name, raw, default);
            default
        }
    }
}

/// Alpha is accepted as any integer and clamped into 0..=255.
pub fn clamp_alpha(alpha: i64) -> u8 {
    let clamped = alpha.clamp(0, 255);
    if clamped != alpha {
        log::warn!("overlay alpha {} clamped to {}", alpha, clamped);
    }
    clamped as u8
}

fn read_config_file(path: &Path) -> Result<PerceptionConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_fallback_keeps_default() {
        assert_eq!(parse_or("width", "wide", 1280u32), 1280);
        assert_eq!(parse_or("width", " 640 ", 1280u32), 640);
        assert_eq!(parse_or("threshold", "0.25", 0.5f32), 0.25);
    }

    #[test]
    fn alpha_is_clamped() {
        assert_eq!(clamp_alpha(-4), 0);
        assert_eq!(clamp_alpha(120), 120);
        assert_eq!(clamp_alpha(999), 255);
    }

    #[test]
    fn validate_clamps_threshold_and_rejects_zero_timeout() {
        let mut cfg = PerceptionConfig {
            threshold: 1.7,
            ..PerceptionConfig::default()
        };
        cfg.validate().unwrap();
        assert_eq!(cfg.threshold, 1.0);

        cfg.camera.capture_timeout = Duration::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = PerceptionConfig::default();
        assert_eq!(cfg.camera.width, DEFAULT_WIDTH);
        assert_eq!(cfg.camera.height, DEFAULT_HEIGHT);
        assert_eq!(cfg.threshold, DEFAULT_THRESHOLD);
        assert_eq!(cfg.overlay, OverlayConfig::default());
        assert_eq!(cfg.camera.capture_timeout, Duration::from_millis(1000));
        assert!(cfg.network.is_none());
    }
}
