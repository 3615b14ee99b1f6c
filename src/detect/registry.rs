use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::error::EngineError;

use super::backend::{EngineCapability, InferenceEngine};
use super::backends::SyntheticEngine;
use super::labels::LabelMap;

/// Name of the always-available synthetic network.
pub const SYNTHETIC_NETWORK: &str = "synthetic";

/// Options shared by every engine factory.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Minimum detection confidence, 0..=1.
    pub threshold: f32,
    /// Optional class description file.
    pub labels: Option<PathBuf>,
    /// Collect per-stage timings for profiler snapshots.
    pub profile: bool,
    /// Square input edge for classifiers loaded from model files.
    pub input_size: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            labels: None,
            profile: false,
            input_size: 224,
        }
    }
}

type EngineFactory =
    Box<dyn Fn(&EngineOptions) -> Result<Box<dyn InferenceEngine>, EngineError> + Send + Sync>;

struct Entry {
    description: String,
    factory: EngineFactory,
}

/// Registry of loadable networks, keyed by `--network` name.
///
/// Names ending in `.onnx` bypass the table and load a model file directly
/// (feature: backend-tract).
pub struct NetworkRegistry {
    entries: BTreeMap<String, Entry>,
    default_name: Option<String>,
}

impl NetworkRegistry {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            default_name: None,
        }
    }

    /// Registry with the networks this build ships.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            SYNTHETIC_NETWORK,
            "bright-object detector and hash classifier (no model file)",
            |opts| {
                let mut engine = SyntheticEngine::new(opts.threshold, opts.profile);
                if let Some(path) = &opts.labels {
                    engine = engine.with_labels(LabelMap::from_file(path)?);
                }
                Ok(Box::new(engine))
            },
        );
        registry
    }

    /// Register a network. The first registered network becomes the default.
    pub fn register<F>(&mut self, name: &str, description: &str, factory: F)
    where
        F: Fn(&EngineOptions) -> Result<Box<dyn InferenceEngine>, EngineError>
            + Send
            + Sync
            + 'static,
    {
        if self.default_name.is_none() {
            self.default_name = Some(name.to_string());
        }
        self.entries.insert(
            name.to_string(),
            Entry {
                description: description.to_string(),
                factory: Box::new(factory),
            },
        );
    }

    /// Set default network by name.
    pub fn set_default(&mut self, name: &str) -> Result<(), EngineError> {
        if !self.entries.contains_key(name) {
            return Err(EngineError::UnknownNetwork(name.to_string()));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// List registered networks.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Load a network by name, or the default when `name` is `None`.
    pub fn load(
        &self,
        name: Option<&str>,
        opts: &EngineOptions,
    ) -> Result<Box<dyn InferenceEngine>, EngineError> {
        let name = name
            .or(self.default_name.as_deref())
            .ok_or_else(|| EngineError::UnknownNetwork("<none registered>".into()))?;
        if name.ends_with(".onnx") {
            return load_model_file(name, opts);
        }
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| EngineError::UnknownNetwork(name.to_string()))?;
        (entry.factory)(opts)
    }

    /// Load a network and check it can do what the caller needs.
    pub fn load_for(
        &self,
        name: Option<&str>,
        opts: &EngineOptions,
        capability: EngineCapability,
    ) -> Result<Box<dyn InferenceEngine>, EngineError> {
        let mut engine = self.load(name, opts)?;
        if engine.supports(capability) {
            return Ok(engine);
        }
        let engine_name = engine.name();
        if let Err(err) = engine.shutdown() {
            log::warn!("failed to release engine {}: {}", engine_name, err);
        }
        Err(EngineError::Unsupported {
            engine: engine_name,
            operation: match capability {
                EngineCapability::Detection => "object detection",
                EngineCapability::Classification => "image classification",
            },
        })
    }

    /// Help text listing the available networks.
    pub fn usage(&self) -> String {
        let mut out = String::from("networks:\n");
        for (name, entry) in &self.entries {
            let marker = if self.default_name.as_deref() == Some(name.as_str()) {
                " (default)"
            } else {
                ""
            };
            let _ = writeln!(out, "  {:<12} {}{}", name, entry.description, marker);
        }
        if cfg!(feature = "backend-tract") {
            out.push_str("  PATH.onnx    ONNX image classifier loaded with tract (--labels FILE)\n");
        }
        out
    }
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(feature = "backend-tract")]
fn load_model_file(
    path: &str,
    opts: &EngineOptions,
) -> Result<Box<dyn InferenceEngine>, EngineError> {
    use super::backends::TractClassifier;

    let labels = match &opts.labels {
        Some(path) => LabelMap::from_file(path)?,
        None => LabelMap::default(),
    };
    let engine = TractClassifier::new(path, opts.input_size, opts.input_size)?
        .with_labels(labels)
        .with_profiling(opts.profile);
    Ok(Box::new(engine))
}

#[cfg(not(feature = "backend-tract"))]
fn load_model_file(
    path: &str,
    _opts: &EngineOptions,
) -> Result<Box<dyn InferenceEngine>, EngineError> {
    Err(EngineError::Unavailable(format!(
        "{} requires the backend-tract feature",
        path
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn builtin_registry_defaults_to_synthetic() {
        let registry = NetworkRegistry::builtin();
        assert_eq!(registry.default_name(), Some(SYNTHETIC_NETWORK));
        let engine = registry.load(None, &EngineOptions::default()).unwrap();
        assert_eq!(engine.name(), "synthetic");
    }

    #[test]
    fn unknown_network_is_an_error() {
        let mut registry = NetworkRegistry::builtin();
        assert!(matches!(
            registry.load(Some("ssd-mobilenet-v9"), &EngineOptions::default()),
            Err(EngineError::UnknownNetwork(name)) if name == "ssd-mobilenet-v9"
        ));
        assert!(registry.set_default("ssd-mobilenet-v9").is_err());
    }

    #[test]
    fn synthetic_network_uses_labels_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "n00000000 nothing").unwrap();
        writeln!(file, "n02084071 dog").unwrap();
        let opts = EngineOptions {
            labels: Some(file.path().to_path_buf()),
            ..EngineOptions::default()
        };

        let engine = NetworkRegistry::builtin().load(None, &opts).unwrap();

        assert_eq!(engine.label_for(1), "dog");
        assert_eq!(engine.label_for(5), "class #5");
    }

    #[test]
    fn missing_labels_file_fails_to_load() {
        let opts = EngineOptions {
            labels: Some(PathBuf::from("/nonexistent/labels.txt")),
            ..EngineOptions::default()
        };
        assert!(matches!(
            NetworkRegistry::builtin().load(None, &opts),
            Err(EngineError::Load(_))
        ));
    }

    #[test]
    fn empty_registry_has_nothing_to_load() {
        let registry = NetworkRegistry::new();
        assert!(registry.load(None, &EngineOptions::default()).is_err());
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn model_files_need_tract() {
        let registry = NetworkRegistry::builtin();
        assert!(matches!(
            registry.load(Some("googlenet.onnx"), &EngineOptions::default()),
            Err(EngineError::Unavailable(_))
        ));
    }

    #[test]
    fn usage_marks_default() {
        let usage = NetworkRegistry::builtin().usage();
        assert!(usage.contains("synthetic"));
        assert!(usage.contains("(default)"));
    }
}
