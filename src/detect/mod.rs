mod backend;
mod backends;
mod labels;
mod overlay;
mod registry;
mod result;
mod timing;

pub use backend::{EngineCapability, InferenceEngine, Precision, RuntimeVersion};
pub use backends::SyntheticEngine;
#[cfg(feature = "backend-tract")]
pub use backends::TractClassifier;
pub use labels::LabelMap;
pub use overlay::{
    Overlay, OverlayConfig, OverlayElement, OverlayFlags, DEFAULT_ALPHA, DEFAULT_OVERLAY,
};
pub use registry::{EngineOptions, NetworkRegistry, SYNTHETIC_NETWORK};
pub use result::{BoundingBox, ClassificationResult, Detection};
pub use timing::{FpsMeter, Profiler, Stage};
