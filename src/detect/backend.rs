use std::fmt;

use crate::detect::overlay::OverlayFlags;
use crate::detect::result::{ClassificationResult, Detection};
use crate::error::EngineError;
use crate::frame::FrameView;

/// What an engine can be asked to do.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineCapability {
    Detection,
    Classification,
}

/// Numeric precision the network runs at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Precision {
    #[default]
    Fp32,
    Fp16,
    Int8,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Precision::Fp32 => "FP32",
            Precision::Fp16 => "FP16",
            Precision::Int8 => "INT8",
        })
    }
}

/// Name and version triplet of the runtime executing the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeVersion {
    pub name: &'static str,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl RuntimeVersion {
    /// Version of this crate, for engines that run in-process.
    pub fn crate_version(name: &'static str) -> Self {
        let mut parts = env!("CARGO_PKG_VERSION")
            .split('.')
            .map(|part| part.parse::<u32>().unwrap_or(0));
        Self {
            name,
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            patch: parts.next().unwrap_or(0),
        }
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}.{}", self.name, self.major, self.minor, self.patch)
    }
}

/// Inference engine trait.
///
/// Engines treat the frame view as read-only and must not keep it past the call;
/// the borrow ends when the next frame is acquired.
pub trait InferenceEngine {
    /// Engine identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the engine supports a capability.
    fn supports(&self, capability: EngineCapability) -> bool;

    /// Detect objects in a frame.
    ///
    /// `overlay` tells engines that burn annotations into their own output which
    /// elements to draw. Engines that do not draw may ignore it.
    fn infer(
        &mut self,
        frame: &FrameView<'_>,
        overlay: OverlayFlags,
    ) -> Result<Vec<Detection>, EngineError>;

    /// Classify a whole frame.
    fn classify(&mut self, frame: &FrameView<'_>) -> Result<ClassificationResult, EngineError>;

    /// Human-readable description of a class id.
    fn label_for(&self, class_id: u32) -> String;

    /// Rolling frames-per-second of the network itself.
    fn current_fps(&self) -> f32;

    fn precision_mode(&self) -> Precision;

    fn runtime_version(&self) -> RuntimeVersion;

    /// Timing breakdown of the last inference, when profiling is enabled.
    fn profiler_snapshot(&self) -> Option<String> {
        None
    }

    /// Release runtime resources. Must be idempotent.
    fn shutdown(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}
