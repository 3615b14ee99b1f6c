//! Failure taxonomy for the collaborators driven by the perception loop.
//!
//! Every collaborator call returns one of these errors so the loop can decide,
//! without inspecting message text, whether a failure is retried on the next
//! tick or forces shutdown.

use std::time::Duration;

use thiserror::Error;

/// The frame source (camera, file, synthetic) is unusable.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("device {0} is not open")]
    NotOpen(String),

    #[error("device {device} disconnected: {reason}")]
    Disconnected { device: String, reason: String },

    #[error("device {0} is not supported by this build")]
    Unsupported(String),

    #[error("device configuration error: {0}")]
    Config(String),

    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a failed `FrameSource::acquire`.
///
/// `Timeout` is transient: the source is healthy, no frame arrived in time.
/// `Device` is fatal: no later acquisition can succeed.
#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("no frame within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl AcquireError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AcquireError::Timeout(_))
    }
}

/// The inference engine failed to load or failed mid-run.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("network '{0}' is not registered")]
    UnknownNetwork(String),

    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("engine '{engine}' does not support {operation}")]
    Unsupported {
        engine: &'static str,
        operation: &'static str,
    },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("model load failed: {0:#}")]
    Load(#[from] anyhow::Error),
}

/// The presentation sink could not draw or was torn down underneath the loop.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("display is closed")]
    Closed,

    #[error("frame of {width}x{height} cannot be rendered: {reason}")]
    Frame {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("display I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A failure that ends the continuous loop.
#[derive(Error, Debug)]
pub enum FatalError {
    #[error("frame source failed: {0}")]
    Device(#[from] DeviceError),

    #[error("inference engine failed: {0}")]
    Engine(#[from] EngineError),

    #[error("presentation failed: {0}")]
    Render(#[from] RenderError),
}
