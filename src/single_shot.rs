//! Single-shot classification: one image, one classify call, one report line.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::detect::{ClassificationResult, EngineCapability, InferenceEngine};
use crate::ingest::FrameSource;
use crate::report::Reporter;

/// Runs one classification and releases both collaborators whatever happens.
pub struct ClassificationRun {
    source: Box<dyn FrameSource>,
    engine: Box<dyn InferenceEngine>,
    timeout: Duration,
}

impl ClassificationRun {
    pub fn new(source: Box<dyn FrameSource>, engine: Box<dyn InferenceEngine>) -> Self {
        Self {
            source,
            engine,
            timeout: crate::pipeline::DEFAULT_CAPTURE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Acquire once, classify once, report. No retries.
    ///
    /// The sentinel "no result" is reported and returned as `Ok`; only failing
    /// collaborators produce an error.
    pub fn run(mut self, reporter: &mut Reporter) -> Result<ClassificationResult> {
        let outcome = self.classify_once(reporter);
        self.release();
        outcome
    }

    fn classify_once(&mut self, reporter: &mut Reporter) -> Result<ClassificationResult> {
        if !self.engine.supports(EngineCapability::Classification) {
            return Err(anyhow!(
                "network {} cannot classify images",
                self.engine.name()
            ));
        }
        self.source
            .open()
            .with_context(|| format!("failed to open image {}", self.source.name()))?;
        let frame = self
            .source
            .acquire(self.timeout)
            .context("failed to load image")?;
        let result = self
            .engine
            .classify(&frame)
            .context("failed to classify image")?;

        let engine = &self.engine;
        reporter.classification(&result, |class_id| engine.label_for(class_id));
        if let Some(snapshot) = engine.profiler_snapshot() {
            reporter.profiler(&snapshot);
        }
        Ok(result)
    }

    fn release(&mut self) {
        if let Err(err) = self.source.close() {
            log::error!("failed to close image source {}: {}", self.source.name(), err);
        }
        if let Err(err) = self.engine.shutdown() {
            log::error!("failed to release engine {}: {}", self.engine.name(), err);
        }
        log::debug!("classification run released its collaborators");
    }
}
