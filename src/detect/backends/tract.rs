#![cfg(feature = "backend-tract")]

use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{EngineCapability, InferenceEngine, Precision, RuntimeVersion};
use crate::detect::labels::LabelMap;
use crate::detect::overlay::OverlayFlags;
use crate::detect::result::{ClassificationResult, Detection};
use crate::detect::timing::{Profiler, Stage};
use crate::error::EngineError;
use crate::frame::FrameView;

/// Default classifier input edge (GoogLeNet / ResNet style networks).
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Tract-based ONNX image classifier.
///
/// Loads a local model file and classifies RGBA frames, resampling them to the model
/// input size. Detection is not supported.
pub struct TractClassifier {
    model: Option<TypedRunnableModel<TypedModel>>,
    width: u32,
    height: u32,
    labels: LabelMap,
    profiler: Profiler,
}

impl TractClassifier {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model: Some(model),
            width,
            height,
            labels: LabelMap::default(),
            profiler: Profiler::new(false),
        })
    }

    pub fn with_labels(mut self, labels: LabelMap) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.profiler = Profiler::new(enabled);
        self
    }

    /// Nearest-neighbour resample into a normalised 1x3xHxW tensor.
    fn build_input(&self, frame: &FrameView<'_>) -> Result<Tensor> {
        let (src_w, src_h) = (frame.width() as usize, frame.height() as usize);
        if src_w == 0 || src_h == 0 {
            return Err(anyhow!("frame has no pixels"));
        }
        let (dst_w, dst_h) = (self.width as usize, self.height as usize);
        let pixels = frame.pixels();
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, dst_h, dst_w),
            |(_, channel, y, x)| {
                let sx = x * src_w / dst_w;
                let sy = y * src_h / dst_h;
                pixels[(sy * src_w + sx) * 4 + channel] / 255.0
            },
        );
        Ok(input.into_tensor())
    }

    fn best_class(outputs: TVec<TValue>) -> Result<(usize, f32)> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let scores = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let (best, max_score) = scores
            .iter()
            .cloned()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |acc, (i, s)| {
                if s > acc.1 {
                    (i, s)
                } else {
                    acc
                }
            });
        if !max_score.is_finite() {
            return Err(anyhow!("model produced no finite scores"));
        }
        // Raw logits are turned into a probability; softmax outputs pass through.
        let sum: f32 = scores.iter().sum();
        let already_probabilities =
            (sum - 1.0).abs() < 1e-3 && scores.iter().all(|s| (0.0..=1.0).contains(s));
        let confidence = if already_probabilities {
            max_score
        } else {
            let denom: f32 = scores.iter().map(|s| (s - max_score).exp()).sum();
            1.0 / denom
        };
        Ok((best, confidence))
    }
}

impl InferenceEngine for TractClassifier {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn supports(&self, capability: EngineCapability) -> bool {
        matches!(capability, EngineCapability::Classification)
    }

    fn infer(
        &mut self,
        _frame: &FrameView<'_>,
        _overlay: OverlayFlags,
    ) -> Result<Vec<Detection>, EngineError> {
        Err(EngineError::Unsupported {
            engine: "tract",
            operation: "object detection",
        })
    }

    fn classify(&mut self, frame: &FrameView<'_>) -> Result<ClassificationResult, EngineError> {
        let start = Instant::now();
        let input = self
            .build_input(frame)
            .map_err(|err| EngineError::Inference(format!("{:#}", err)))?;
        self.profiler.record(Stage::PreProcess, start.elapsed());

        let network = Instant::now();
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| EngineError::Unavailable("tract model released".into()))?;
        let outputs = model
            .run(tvec!(input.into()))
            .map_err(|err| EngineError::Inference(format!("{:#}", err)))?;
        self.profiler.record(Stage::Network, network.elapsed());

        let post = Instant::now();
        let (best, confidence) = Self::best_class(outputs)
            .map_err(|err| EngineError::Inference(format!("{:#}", err)))?;
        self.profiler.record(Stage::PostProcess, post.elapsed());
        self.profiler.finish();

        Ok(ClassificationResult::new(best as i32, confidence))
    }

    fn label_for(&self, class_id: u32) -> String {
        self.labels.get(class_id)
    }

    fn current_fps(&self) -> f32 {
        self.profiler.fps()
    }

    fn precision_mode(&self) -> Precision {
        Precision::Fp32
    }

    fn runtime_version(&self) -> RuntimeVersion {
        RuntimeVersion {
            name: "tract",
            major: 0,
            minor: 21,
            patch: 0,
        }
    }

    fn profiler_snapshot(&self) -> Option<String> {
        self.profiler.snapshot()
    }

    fn shutdown(&mut self) -> Result<(), EngineError> {
        self.model = None;
        Ok(())
    }
}
