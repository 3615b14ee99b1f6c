//! Real-time perception loop.
//!
//! Frames come from a [`FrameSource`] (camera, synthetic scene or still image), go
//! through an [`InferenceEngine`] (detector or classifier), and the results are
//! reported on the console and optionally shown by a [`PresentationSink`].
//!
//! # Module Structure
//!
//! - `frame`: frame buffers and the borrowed views handed out by sources
//! - `ingest`: frame sources (synthetic, V4L2, image files)
//! - `detect`: engines, network registry, overlay selection, timing
//! - `display`: presentation sinks (console, PNG snapshots)
//! - `pipeline`: the continuous loop and its shutdown protocol
//! - `single_shot`: one image, one classification
//! - `run_state`, `report`, `error`: lifecycle, console output, failure taxonomy
//! - `config`, `cli`, `ui`: settings layering, flags, startup progress

pub mod cli;
pub mod config;
pub mod detect;
pub mod display;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod report;
pub mod run_state;
pub mod single_shot;
pub mod ui;

pub use config::PerceptionConfig;
pub use detect::{
    ClassificationResult, Detection, EngineCapability, InferenceEngine, NetworkRegistry, Overlay,
    OverlayConfig, OverlayFlags,
};
pub use display::{ConsoleSink, PresentationSink};
pub use error::{AcquireError, DeviceError, EngineError, FatalError, RenderError};
pub use frame::{Frame, FrameView, PixelLayout};
pub use ingest::{open_camera, open_image, FrameSource};
pub use pipeline::{DetectionLoop, LoopConfig, RunSummary, StopReason};
pub use report::{format_status, Reporter};
pub use run_state::{RunState, StopSignal};
pub use single_shot::ClassificationRun;
