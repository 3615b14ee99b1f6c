//! V4L2 camera source.
//!
//! This module provides `V4l2Source` for capturing frames from local V4L2 devices
//! (USB webcams, CSI bridges exposed as `/dev/videoN`).
//!
//! The source:
//! - Negotiates RGB24 (falling back to NV12) at the requested size
//! - Captures through a memory-mapped buffer stream with a bounded poll timeout
//! - Normalises every capture into its own RGBA f32 frame buffer
//!
//! A poll timeout is reported as `AcquireError::Timeout`; any other capture error means
//! the device is gone.

use std::io;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{normalize_to_rgba, PixelFormat};
use super::FrameSource;
use crate::error::{AcquireError, DeviceError};
use crate::frame::{Frame, FrameView};

/// Configuration for a V4L2 source.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Requested frame rate. 0 keeps the driver default.
    pub target_fps: u32,
    /// Number of mmap buffers to queue.
    pub buffers: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 1280,
            height: 720,
            target_fps: 30,
            buffers: 4,
        }
    }
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this>,
}

/// V4L2 frame source.
pub struct V4l2Source {
    config: V4l2Config,
    state: Option<DeviceState>,
    format: PixelFormat,
    frame: Option<Frame>,
    active_timeout: Option<Duration>,
    frames_captured: u64,
}

impl V4l2Source {
    pub fn new(config: V4l2Config) -> Self {
        Self {
            config,
            state: None,
            format: PixelFormat::Rgb24,
            frame: None,
            active_timeout: None,
            frames_captured: 0,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set RGB3 on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        self.format = match &format.fourcc.repr {
            b"RGB3" => PixelFormat::Rgb24,
            b"NV12" => PixelFormat::Nv12,
            other => {
                return Err(anyhow!(
                    "unsupported pixel format {} on {}",
                    String::from_utf8_lossy(other),
                    self.config.device
                ))
            }
        };

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        let buffers = self.config.buffers.max(1);
        let state = DeviceStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, buffers)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        self.frame = Some(
            Frame::blank(format.width, format.height).map_err(anyhow::Error::new)?,
        );
        self.state = Some(state);
        self.active_timeout = None;
        Ok(())
    }

    fn disconnected(&self, reason: impl std::fmt::Display) -> DeviceError {
        DeviceError::Disconnected {
            device: self.config.device.clone(),
            reason: reason.to_string(),
        }
    }
}

impl FrameSource for V4l2Source {
    fn name(&self) -> &str {
        &self.config.device
    }

    fn open(&mut self) -> Result<(), DeviceError> {
        if self.state.is_some() {
            return Ok(());
        }
        self.connect()
            .map_err(|err| self.disconnected(format!("{:#}", err)))?;
        log::info!(
            "V4l2Source: streaming {} ({}x{}, {:?})",
            self.config.device,
            self.width(),
            self.height(),
            self.format
        );
        Ok(())
    }

    fn acquire(&mut self, timeout: Duration) -> Result<FrameView<'_>, AcquireError> {
        use v4l::io::traits::CaptureStream;

        let device = self.config.device.clone();
        let format = self.format;
        let (Some(state), Some(frame)) = (self.state.as_mut(), self.frame.as_mut()) else {
            return Err(DeviceError::NotOpen(device).into());
        };

        if self.active_timeout != Some(timeout) {
            state.with_stream_mut(|stream| stream.set_timeout(timeout));
            self.active_timeout = Some(timeout);
        }

        let (width, height) = (frame.width(), frame.height());
        let captured = state.with_stream_mut(|stream| match stream.next() {
            Ok((buf, _meta)) => normalize_to_rgba(buf, width, height, format, frame.pixels_mut())
                .map_err(|err| DeviceError::Disconnected {
                    device: device.clone(),
                    reason: format!("{:#}", err),
                })
                .map_err(AcquireError::from),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Err(AcquireError::Timeout(timeout)),
            Err(err) => Err(AcquireError::Device(DeviceError::Disconnected {
                device: device.clone(),
                reason: err.to_string(),
            })),
        });
        captured?;

        self.frames_captured += 1;
        match &self.frame {
            Some(frame) => Ok(frame.view()),
            None => Err(DeviceError::NotOpen(device).into()),
        }
    }

    fn width(&self) -> u32 {
        self.frame.as_ref().map_or(self.config.width, Frame::width)
    }

    fn height(&self) -> u32 {
        self.frame.as_ref().map_or(self.config.height, Frame::height)
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        if self.state.take().is_some() {
            log::info!(
                "V4l2Source: closed {} after {} frames",
                self.config.device,
                self.frames_captured
            );
        }
        self.frame = None;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
