//! Static image source for single-shot runs.
//!
//! Decodes a local image file once at `open` and hands the same frame out on every
//! `acquire`. Only local paths are accepted.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use super::FrameSource;
use crate::error::{AcquireError, DeviceError};
use crate::frame::{Frame, FrameView};

/// Local image file source.
pub struct StaticImageSource {
    path: PathBuf,
    display: String,
    frame: Option<Frame>,
}

impl StaticImageSource {
    pub fn new(path: &str) -> Result<Self, DeviceError> {
        if !is_local_file_path(path) {
            return Err(DeviceError::Config(
                "image loading only supports local paths (no URL schemes)".into(),
            ));
        }
        Ok(Self {
            path: PathBuf::from(path),
            display: path.to_string(),
            frame: None,
        })
    }

    fn load(&self) -> anyhow::Result<Frame> {
        let decoded = ::image::open(&self.path)
            .with_context(|| format!("failed to load image '{}'", self.path.display()))?
            .into_rgba8();
        let (width, height) = decoded.dimensions();
        let pixels = decoded.into_raw().into_iter().map(f32::from).collect();
        Frame::from_rgba(pixels, width, height).map_err(anyhow::Error::new)
    }
}

impl FrameSource for StaticImageSource {
    fn name(&self) -> &str {
        &self.display
    }

    fn open(&mut self) -> Result<(), DeviceError> {
        if self.frame.is_some() {
            return Ok(());
        }
        let frame = self.load().map_err(|err| DeviceError::Disconnected {
            device: self.display.clone(),
            reason: format!("{:#}", err),
        })?;
        log::info!(
            "StaticImageSource: loaded {} ({}x{})",
            self.display,
            frame.width(),
            frame.height()
        );
        self.frame = Some(frame);
        Ok(())
    }

    fn acquire(&mut self, _timeout: Duration) -> Result<FrameView<'_>, AcquireError> {
        match &self.frame {
            Some(frame) => Ok(frame.view()),
            None => Err(DeviceError::NotOpen(self.display.clone()).into()),
        }
    }

    fn width(&self) -> u32 {
        self.frame.as_ref().map_or(0, Frame::width)
    }

    fn height(&self) -> u32 {
        self.frame.as_ref().map_or(0, Frame::height)
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.frame = None;
        Ok(())
    }
}

fn is_local_file_path(path: &str) -> bool {
    !path.trim().is_empty() && !path.contains("://")
}
