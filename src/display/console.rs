use std::time::{Duration, Instant};

use super::PresentationSink;
use crate::detect::Overlay;
use crate::error::RenderError;
use crate::frame::FrameView;

/// How often the console sink repeats an unchanged status line.
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Sink that "presents" through the log.
///
/// Frames are counted, overlay requests are logged at debug level, and the status line
/// is logged at most once every few seconds.
pub struct ConsoleSink {
    frames: u64,
    status: String,
    last_status_log: Option<Instant>,
    open: bool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            frames: 0,
            status: String::new(),
            last_status_log: None,
            open: true,
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn status(&self) -> &str {
        &self.status
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn render_frame(&mut self, frame: &FrameView<'_>, overlay: &Overlay) -> Result<(), RenderError> {
        if !self.open {
            return Err(RenderError::Closed);
        }
        self.frames += 1;
        for element in &overlay.elements {
            log::debug!(
                "overlay frame={} class={} box=({:.0},{:.0})-({:.0},{:.0}) draw_box={} caption={:?}",
                self.frames,
                element.class_id,
                element.bbox.left,
                element.bbox.top,
                element.bbox.right,
                element.bbox.bottom,
                element.draw_box,
                Overlay::caption(element)
            );
        }
        log::trace!(
            "rendered frame {} ({}x{})",
            self.frames,
            frame.width(),
            frame.height()
        );
        Ok(())
    }

    fn set_status_text(&mut self, status: &str) {
        let due = self
            .last_status_log
            .map_or(true, |at| at.elapsed() >= STATUS_INTERVAL);
        if due {
            log::info!("{}", status);
            self.last_status_log = Some(Instant::now());
        }
        self.status.clear();
        self.status.push_str(status);
    }

    fn was_closed_by_user(&self) -> bool {
        false
    }

    fn close(&mut self) -> Result<(), RenderError> {
        if self.open {
            self.open = false;
            log::info!("console display closed after {} frames", self.frames);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    #[test]
    fn counts_frames_and_keeps_latest_status() {
        let frame = Frame::blank(4, 4).unwrap();
        let mut sink = ConsoleSink::new();
        sink.render_frame(&frame.view(), &Overlay::default()).unwrap();
        sink.set_status_text("synthetic 0.3.1 | FP32 | Network 30 FPS");
        sink.set_status_text("synthetic 0.3.1 | FP32 | Network 31 FPS");
        assert_eq!(sink.frames_rendered(), 1);
        assert_eq!(sink.status(), "synthetic 0.3.1 | FP32 | Network 31 FPS");
        assert!(!sink.was_closed_by_user());
    }

    #[test]
    fn rendering_after_close_fails_but_close_is_idempotent() {
        let frame = Frame::blank(4, 4).unwrap();
        let mut sink = ConsoleSink::new();
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(matches!(
            sink.render_frame(&frame.view(), &Overlay::default()),
            Err(RenderError::Closed)
        ));
    }
}
