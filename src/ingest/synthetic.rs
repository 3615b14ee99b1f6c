//! Synthetic camera (`stub://`) for demos and tests.
//!
//! Renders a dark gradient background with a bright square sweeping across it, plus a
//! little seeded sensor noise. Optional pacing (`fps`) and scripted drops
//! (`drop_every`) reproduce the hiccups of a real camera: a dropped frame is reported
//! as a timeout, never as a device failure.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::FrameSource;
use crate::error::{AcquireError, DeviceError};
use crate::frame::{Frame, FrameView};

/// Configuration for a synthetic camera.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Source URL, e.g. `stub://front_camera`.
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Frame rate to pace captures at. 0 captures as fast as asked.
    pub fps: u32,
    /// Report every Nth capture as a timeout.
    pub drop_every: Option<u64>,
    /// Seed for the sensor noise.
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera0".to_string(),
            width: 1280,
            height: 720,
            fps: 0,
            drop_every: None,
            seed: 0,
        }
    }
}

impl SyntheticConfig {
    /// Parse `stub://NAME[?fps=N&drop_every=N&seed=N]`.
    pub fn from_url(url: &str, width: u32, height: u32) -> Result<Self, DeviceError> {
        let rest = url
            .strip_prefix("stub://")
            .ok_or_else(|| DeviceError::Config(format!("not a synthetic source: {}", url)))?;
        let mut config = Self {
            url: url.to_string(),
            width,
            height,
            ..Self::default()
        };
        let Some((_, query)) = rest.split_once('?') else {
            return Ok(config);
        };
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| DeviceError::Config(format!("malformed option '{}' in {}", pair, url)))?;
            let parsed: u64 = value
                .parse()
                .map_err(|_| DeviceError::Config(format!("option {} must be an integer", key)))?;
            match key {
                "fps" => config.fps = parsed as u32,
                "drop_every" => config.drop_every = (parsed > 0).then_some(parsed),
                "seed" => config.seed = parsed,
                other => {
                    return Err(DeviceError::Config(format!(
                        "unknown synthetic option '{}'",
                        other
                    )))
                }
            }
        }
        Ok(config)
    }
}

/// Synthetic frame source.
pub struct SyntheticSource {
    config: SyntheticConfig,
    frame: Option<Frame>,
    rng: StdRng,
    attempts: u64,
    frames_captured: u64,
    last_capture: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            frame: None,
            rng,
            attempts: 0,
            frames_captured: 0,
            last_capture: None,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    fn frame_interval(&self) -> Option<Duration> {
        (self.config.fps > 0).then(|| Duration::from_secs_f64(1.0 / self.config.fps as f64))
    }

    /// Block until the next frame is due, or report a timeout if that is too far out.
    fn pace(&mut self, timeout: Duration) -> Result<(), AcquireError> {
        let (Some(interval), Some(last)) = (self.frame_interval(), self.last_capture) else {
            return Ok(());
        };
        let due = last + interval;
        let now = Instant::now();
        if due <= now {
            return Ok(());
        }
        let wait = due - now;
        if wait > timeout {
            std::thread::sleep(timeout);
            return Err(AcquireError::Timeout(timeout));
        }
        std::thread::sleep(wait);
        Ok(())
    }

    fn render(&mut self) {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let side = (width.min(height) / 4).max(1);
        let travel = width.saturating_sub(side).max(1);
        let offset_x = (self.frames_captured as usize * 8) % travel;
        let offset_y = (height.saturating_sub(side)) / 2;

        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let rng = &mut self.rng;
        for (i, px) in frame.pixels_mut().chunks_exact_mut(4).enumerate() {
            let x = i % width;
            let y = i / width;
            let inside = x >= offset_x && x < offset_x + side && y >= offset_y && y < offset_y + side;
            let noise: f32 = rng.gen_range(-4.0..4.0);
            let base = if inside {
                240.0
            } else {
                40.0 + 60.0 * (y as f32 / height.max(1) as f32)
            };
            px[0] = (base + noise).clamp(0.0, 255.0);
            px[1] = (base * if inside { 1.0 } else { 0.8 } + noise).clamp(0.0, 255.0);
            px[2] = (base * if inside { 0.9 } else { 1.2 } + noise).clamp(0.0, 255.0);
            px[3] = 255.0;
        }
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.config.url
    }

    /// Synthetic sources are always "connected".
    fn open(&mut self) -> Result<(), DeviceError> {
        if self.frame.is_none() {
            self.frame = Some(Frame::blank(self.config.width, self.config.height)?);
            log::info!("SyntheticSource: streaming {} (synthetic)", self.config.url);
        }
        Ok(())
    }

    fn acquire(&mut self, timeout: Duration) -> Result<FrameView<'_>, AcquireError> {
        if self.frame.is_none() {
            return Err(DeviceError::NotOpen(self.config.url.clone()).into());
        }
        self.attempts += 1;
        if let Some(every) = self.config.drop_every {
            if self.attempts % every == 0 {
                return Err(AcquireError::Timeout(timeout));
            }
        }
        self.pace(timeout)?;

        self.render();
        self.frames_captured += 1;
        self.last_capture = Some(Instant::now());

        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| DeviceError::NotOpen(self.config.url.clone()))?;
        Ok(frame.view())
    }

    fn width(&self) -> u32 {
        self.config.width
    }

    fn height(&self) -> u32 {
        self.config.height
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        if self.frame.take().is_some() {
            log::info!(
                "SyntheticSource: closed {} after {} frames",
                self.config.url,
                self.frames_captured
            );
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
