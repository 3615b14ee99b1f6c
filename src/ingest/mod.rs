//! Frame sources.
//!
//! This module provides the sources the perception loop pulls frames from:
//! - Synthetic camera (`stub://NAME`), always available
//! - V4L2 cameras (feature: ingest-v4l2)
//! - Static image files for single-shot runs (feature: image-file)
//!
//! Every source keeps ownership of its capture buffer and hands out a `FrameView`
//! that borrows it. The view is invalidated by the next `acquire` call.

use std::time::Duration;

use crate::error::{AcquireError, DeviceError};
use crate::frame::{FrameView, PixelLayout};

#[cfg(feature = "image-file")]
pub mod image;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

#[cfg(feature = "image-file")]
pub use self::image::StaticImageSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// A producer of frames.
///
/// `acquire` blocks for at most `timeout`. It reports `AcquireError::Timeout` when the
/// device is healthy but no frame arrived, and `AcquireError::Device` when the device
/// is gone. `close` is idempotent.
pub trait FrameSource {
    /// Source identifier used in diagnostics.
    fn name(&self) -> &str;

    /// Start streaming.
    fn open(&mut self) -> Result<(), DeviceError>;

    /// Capture the next frame.
    fn acquire(&mut self, timeout: Duration) -> Result<FrameView<'_>, AcquireError>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Bits per pixel of the frames this source hands out.
    fn pixel_depth(&self) -> u32 {
        PixelLayout::RgbaF32.depth()
    }

    /// Stop streaming and release the device.
    fn close(&mut self) -> Result<(), DeviceError>;
}

/// Resolve a `--camera` argument into a frame source.
///
/// - `stub://NAME[?fps=N&drop_every=N&seed=N]` selects the synthetic camera
/// - a bare index such as `0` selects `/dev/video0`
/// - anything else is treated as a V4L2 device path
pub fn open_camera(camera: &str, width: u32, height: u32) -> Result<Box<dyn FrameSource>, DeviceError> {
    let camera = camera.trim();
    if camera.is_empty() {
        return Err(DeviceError::Config("camera must not be empty".into()));
    }
    if camera.starts_with("stub://") {
        let config = SyntheticConfig::from_url(camera, width, height)?;
        return Ok(Box::new(SyntheticSource::new(config)));
    }
    if camera.contains("://") {
        return Err(DeviceError::Unsupported(camera.to_string()));
    }

    let device = device_path(camera);
    #[cfg(feature = "ingest-v4l2")]
    {
        Ok(Box::new(V4l2Source::new(V4l2Config {
            device,
            width,
            height,
            ..V4l2Config::default()
        })))
    }
    #[cfg(not(feature = "ingest-v4l2"))]
    {
        log::error!("camera {} requires the ingest-v4l2 feature", device);
        Err(DeviceError::Unsupported(device))
    }
}

/// Start streaming from `source`. A source that fails to open is closed before the
/// error is returned.
pub fn start(mut source: Box<dyn FrameSource>) -> Result<Box<dyn FrameSource>, DeviceError> {
    if let Err(err) = source.open() {
        if let Err(close_err) = source.close() {
            log::error!("failed to close frame source {}: {}", source.name(), close_err);
        }
        return Err(err);
    }
    Ok(source)
}

/// Resolve a single-shot image argument into a frame source.
pub fn open_image(path: &str) -> Result<Box<dyn FrameSource>, DeviceError> {
    if path.starts_with("stub://") {
        let config = SyntheticConfig::from_url(path, 640, 480)?;
        return Ok(Box::new(SyntheticSource::new(config)));
    }
    #[cfg(feature = "image-file")]
    {
        Ok(Box::new(StaticImageSource::new(path)?))
    }
    #[cfg(not(feature = "image-file"))]
    {
        Err(DeviceError::Unsupported(format!(
            "{} (image loading requires the image-file feature)",
            path
        )))
    }
}

fn device_path(camera: &str) -> String {
    if !camera.is_empty() && camera.chars().all(|c| c.is_ascii_digit()) {
        format!("/dev/video{}", camera)
    } else {
        camera.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_index_maps_to_video_device() {
        assert_eq!(device_path("0"), "/dev/video0");
        assert_eq!(device_path("12"), "/dev/video12");
        assert_eq!(device_path("/dev/video3"), "/dev/video3");
    }

    #[test]
    fn stub_camera_uses_requested_dimensions() {
        let source = open_camera("stub://front", 320, 240).unwrap();
        assert_eq!(source.width(), 320);
        assert_eq!(source.height(), 240);
        assert_eq!(source.pixel_depth(), 128);
    }

    #[test]
    fn started_stub_camera_delivers_frames() {
        let source = open_camera("stub://front?fps=0", 32, 24).unwrap();
        let mut source = start(source).unwrap();
        assert!(source.acquire(Duration::from_millis(50)).is_ok());
        source.close().unwrap();
    }

    #[test]
    fn network_urls_are_rejected() {
        assert!(matches!(
            open_camera("rtsp://10.0.0.2/stream", 640, 480),
            Err(DeviceError::Unsupported(_))
        ));
    }
}
