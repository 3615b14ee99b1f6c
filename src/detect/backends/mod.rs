pub mod synthetic;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use synthetic::SyntheticEngine;

#[cfg(feature = "backend-tract")]
pub use tract::TractClassifier;
