//! Frame buffers and borrowed frame views.
//!
//! - `Frame`: owned RGBA f32 buffer. Sources keep one and refill it on every capture.
//! - `FrameView`: what the loop receives from `FrameSource::acquire`. It borrows the
//!   source, so the borrow checker ends its life at the next `acquire` call.
//!
//! A consumer that needs pixels beyond the current tick copies them with
//! `FrameView::to_frame`.

use crate::error::DeviceError;

/// Channel layout of a frame buffer.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelLayout {
    /// Four f32 channels per pixel, values in 0..=255.
    #[default]
    RgbaF32,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::RgbaF32 => 4,
        }
    }

    /// Bits per pixel.
    pub fn depth(self) -> u32 {
        match self {
            PixelLayout::RgbaF32 => 4 * 32,
        }
    }
}

// ----------------------------------------------------------------------------
// Frame: owned buffer
// ----------------------------------------------------------------------------

/// Owned image buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pixels: Vec<f32>,
    width: u32,
    height: u32,
    layout: PixelLayout,
}

impl Frame {
    /// Wrap an RGBA f32 buffer. The length must be `width * height * 4`.
    pub fn from_rgba(pixels: Vec<f32>, width: u32, height: u32) -> Result<Self, DeviceError> {
        let expected = rgba_len(width, height)?;
        if pixels.len() != expected {
            return Err(DeviceError::Config(format!(
                "RGBA frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            pixels,
            width,
            height,
            layout: PixelLayout::RgbaF32,
        })
    }

    /// A black, fully opaque frame.
    pub fn blank(width: u32, height: u32) -> Result<Self, DeviceError> {
        let len = rgba_len(width, height)?;
        let mut pixels = vec![0.0f32; len];
        for alpha in pixels.iter_mut().skip(3).step_by(4) {
            *alpha = 255.0;
        }
        Self::from_rgba(pixels, width, height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Borrow this frame for one tick.
    pub fn view(&self) -> FrameView<'_> {
        FrameView { frame: self }
    }

    /// Mutable pixel access for sources refilling their capture buffer.
    pub(crate) fn pixels_mut(&mut self) -> &mut [f32] {
        &mut self.pixels
    }

    /// Resize the buffer in place, reusing the allocation when possible.
    pub(crate) fn reshape(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        let len = rgba_len(width, height)?;
        self.pixels.resize(len, 0.0);
        self.width = width;
        self.height = height;
        Ok(())
    }
}

fn rgba_len(width: u32, height: u32) -> Result<usize, DeviceError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(PixelLayout::RgbaF32.channels()))
        .filter(|len| *len > 0)
        .ok_or_else(|| DeviceError::Config(format!("invalid frame dimensions {width}x{height}")))
}

// ----------------------------------------------------------------------------
// FrameView: borrowed, valid until the next acquisition
// ----------------------------------------------------------------------------

/// Borrowed view of the frame most recently captured by a source.
///
/// There is no way to keep a `FrameView` across `acquire` calls: the view borrows
/// the source, and `acquire` needs the source mutably.
#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a> {
    frame: &'a Frame,
}

impl<'a> FrameView<'a> {
    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.frame.layout
    }

    /// Bits per pixel.
    pub fn pixel_depth(&self) -> u32 {
        self.frame.layout.depth()
    }

    /// Interleaved RGBA samples, row-major.
    pub fn pixels(&self) -> &'a [f32] {
        &self.frame.pixels
    }

    /// RGBA sample at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.frame.width || y >= self.frame.height {
            return None;
        }
        let idx = (y as usize * self.frame.width as usize + x as usize) * 4;
        let px = &self.frame.pixels[idx..idx + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Copy the pixels out so they can outlive the current tick.
    pub fn to_frame(&self) -> Frame {
        self.frame.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_frame_is_opaque_black() {
        let frame = Frame::blank(2, 2).unwrap();
        let view = frame.view();
        assert_eq!(view.pixel(1, 1), Some([0.0, 0.0, 0.0, 255.0]));
        assert_eq!(view.pixel(2, 0), None);
        assert_eq!(view.pixel_depth(), 128);
    }

    #[test]
    fn from_rgba_rejects_wrong_length() {
        assert!(Frame::from_rgba(vec![0.0; 7], 1, 2).is_err());
        assert!(Frame::from_rgba(vec![0.0; 8], 1, 2).is_ok());
    }

    #[test]
    fn zero_sized_frames_are_rejected() {
        assert!(Frame::blank(0, 480).is_err());
    }

    #[test]
    fn copied_view_survives_source_mutation() {
        let mut frame = Frame::blank(1, 1).unwrap();
        let copy = frame.view().to_frame();
        frame.pixels_mut()[0] = 200.0;
        assert_eq!(copy.view().pixel(0, 0), Some([0.0, 0.0, 0.0, 255.0]));
        assert_eq!(frame.view().pixel(0, 0), Some([200.0, 0.0, 0.0, 255.0]));
    }

    #[test]
    fn reshape_changes_dimensions() {
        let mut frame = Frame::blank(4, 4).unwrap();
        frame.reshape(2, 3).unwrap();
        assert_eq!(frame.view().pixels().len(), 2 * 3 * 4);
        assert_eq!((frame.width(), frame.height()), (2, 3));
    }
}
