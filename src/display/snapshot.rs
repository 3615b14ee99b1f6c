use std::fs;
use std::path::PathBuf;

use image::{Rgba, RgbaImage};

use super::PresentationSink;
use crate::detect::Overlay;
use crate::error::RenderError;
use crate::frame::FrameView;

/// File whose presence in the snapshot directory asks the loop to stop.
pub const CLOSE_SENTINEL: &str = "CLOSE";

/// Configuration for the snapshot sink.
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    pub dir: PathBuf,
    /// Write every Nth rendered frame.
    pub every: u64,
}

/// Sink that writes annotated PNG snapshots to a directory.
///
/// Each written frame gets a `frame-NNNNNN.png` and, when the overlay carries
/// captions, a `frame-NNNNNN.txt` with one caption per line plus the status text.
/// Creating a file named `CLOSE` in the directory counts as the user closing the
/// display.
pub struct SnapshotSink {
    config: SnapshotConfig,
    frames: u64,
    written: u64,
    status: String,
    open: bool,
}

impl SnapshotSink {
    pub fn new(config: SnapshotConfig) -> Result<Self, RenderError> {
        fs::create_dir_all(&config.dir)?;
        Ok(Self {
            config: SnapshotConfig {
                every: config.every.max(1),
                ..config
            },
            frames: 0,
            written: 0,
            status: String::new(),
            open: true,
        })
    }

    pub fn snapshots_written(&self) -> u64 {
        self.written
    }

    fn annotate(frame: &FrameView<'_>, overlay: &Overlay) -> Result<RgbaImage, RenderError> {
        let (width, height) = (frame.width(), frame.height());
        let bytes = frame
            .pixels()
            .iter()
            .map(|v| v.round().clamp(0.0, 255.0) as u8)
            .collect();
        let mut image =
            RgbaImage::from_vec(width, height, bytes).ok_or_else(|| RenderError::Frame {
                width,
                height,
                reason: "pixel buffer does not match dimensions".into(),
            })?;

        for element in overlay.elements.iter().filter(|e| e.draw_box) {
            let color = class_color(element.class_id);
            let max_x = width.saturating_sub(1) as f32;
            let max_y = height.saturating_sub(1) as f32;
            let left = element.bbox.left.clamp(0.0, max_x).round() as u32;
            let top = element.bbox.top.clamp(0.0, max_y).round() as u32;
            let right = element.bbox.right.clamp(0.0, max_x).round() as u32;
            let bottom = element.bbox.bottom.clamp(0.0, max_y).round() as u32;
            blend_rect(&mut image, left, top, right, bottom, color, overlay.alpha);
            outline_rect(&mut image, left, top, right, bottom, color);
        }
        Ok(image)
    }

    fn write_snapshot(&mut self, frame: &FrameView<'_>, overlay: &Overlay) -> Result<(), RenderError> {
        let image = Self::annotate(frame, overlay)?;
        let stem = format!("frame-{:06}", self.frames);
        let png = self.config.dir.join(format!("{stem}.png"));
        image.save(&png).map_err(|err| RenderError::Frame {
            width: frame.width(),
            height: frame.height(),
            reason: err.to_string(),
        })?;

        let captions: Vec<String> = overlay.elements.iter().filter_map(Overlay::caption).collect();
        if !captions.is_empty() {
            let mut text = captions.join("\n");
            text.push('\n');
            if !self.status.is_empty() {
                text.push_str(&self.status);
                text.push('\n');
            }
            fs::write(self.config.dir.join(format!("{stem}.txt")), text)?;
        }
        self.written += 1;
        log::debug!("snapshot written to {}", png.display());
        Ok(())
    }
}

impl PresentationSink for SnapshotSink {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn render_frame(&mut self, frame: &FrameView<'_>, overlay: &Overlay) -> Result<(), RenderError> {
        if !self.open {
            return Err(RenderError::Closed);
        }
        self.frames += 1;
        if (self.frames - 1) % self.config.every != 0 {
            return Ok(());
        }
        self.write_snapshot(frame, overlay)
    }

    fn set_status_text(&mut self, status: &str) {
        self.status.clear();
        self.status.push_str(status);
    }

    fn was_closed_by_user(&self) -> bool {
        self.config.dir.join(CLOSE_SENTINEL).exists()
    }

    fn close(&mut self) -> Result<(), RenderError> {
        if self.open {
            self.open = false;
            log::info!(
                "snapshot display closed: {} snapshots in {}",
                self.written,
                self.config.dir.display()
            );
        }
        Ok(())
    }
}

fn class_color(class_id: u32) -> [u8; 3] {
    const PALETTE: [[u8; 3]; 6] = [
        [0, 255, 0],
        [255, 64, 64],
        [64, 128, 255],
        [255, 200, 0],
        [255, 0, 255],
        [0, 255, 255],
    ];
    PALETTE[class_id as usize % PALETTE.len()]
}

fn blend_rect(image: &mut RgbaImage, left: u32, top: u32, right: u32, bottom: u32, color: [u8; 3], alpha: u8) {
    if alpha == 0 {
        return;
    }
    let a = alpha as f32 / 255.0;
    for y in top..=bottom {
        for x in left..=right {
            let px = image.get_pixel_mut(x, y);
            for c in 0..3 {
                px[c] = (px[c] as f32 * (1.0 - a) + color[c] as f32 * a).round() as u8;
            }
        }
    }
}

fn outline_rect(image: &mut RgbaImage, left: u32, top: u32, right: u32, bottom: u32, color: [u8; 3]) {
    let paint = Rgba([color[0], color[1], color[2], 255]);
    for x in left..=right {
        image.put_pixel(x, top, paint);
        image.put_pixel(x, bottom, paint);
    }
    for y in top..=bottom {
        image.put_pixel(left, y, paint);
        image.put_pixel(right, y, paint);
    }
}
