//! Presentation sinks.
//!
//! A sink shows the current frame with the overlay requested by the loop, carries a
//! status line, and tells the loop when the user asked to close it. Windowing is out
//! of scope for this crate; the sinks here log or write annotated snapshots.

use crate::detect::Overlay;
use crate::error::RenderError;
use crate::frame::FrameView;

mod console;
#[cfg(feature = "image-file")]
mod snapshot;

pub use console::ConsoleSink;
#[cfg(feature = "image-file")]
pub use snapshot::{SnapshotConfig, SnapshotSink};

/// Presentation sink trait.
///
/// Sinks must not keep the frame view past `render_frame`. `close` is idempotent.
pub trait PresentationSink {
    /// Sink identifier used in diagnostics.
    fn name(&self) -> &str;

    /// Draw a frame and the overlay elements requested for it.
    fn render_frame(&mut self, frame: &FrameView<'_>, overlay: &Overlay) -> Result<(), RenderError>;

    /// Replace the status text (window title, status bar).
    fn set_status_text(&mut self, status: &str);

    /// True once the user has asked to close the display.
    fn was_closed_by_user(&self) -> bool;

    fn close(&mut self) -> Result<(), RenderError>;
}
