use std::time::Instant;

use sha2::{Digest, Sha256};

use crate::detect::backend::{EngineCapability, InferenceEngine, Precision, RuntimeVersion};
use crate::detect::labels::LabelMap;
use crate::detect::overlay::OverlayFlags;
use crate::detect::result::{BoundingBox, ClassificationResult, Detection};
use crate::detect::timing::{Profiler, Stage};
use crate::error::EngineError;
use crate::frame::FrameView;

/// Luminance above which a pixel counts as part of an object.
const BRIGHT_LUMA: f32 = 200.0;

/// Classes the synthetic engine reports.
const SYNTHETIC_LABELS: &[&str] = &[
    "background",
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "bus",
    "truck",
    "dog",
    "cat",
    "backpack",
];

/// Synthetic engine for demos and tests.
///
/// Detection finds bright blobs per frame quadrant; classification hashes a coarse
/// sample of the frame. Both are deterministic for a given frame, and a completely
/// flat frame cannot be classified.
pub struct SyntheticEngine {
    labels: LabelMap,
    threshold: f32,
    profiler: Profiler,
    closed: bool,
}

impl SyntheticEngine {
    pub fn new(threshold: f32, profile: bool) -> Self {
        Self {
            labels: LabelMap::from_static(SYNTHETIC_LABELS),
            threshold: threshold.clamp(0.0, 1.0),
            profiler: Profiler::new(profile),
            closed: false,
        }
    }

    /// Replace the built-in class names, e.g. with a `--labels` file.
    pub fn with_labels(mut self, labels: LabelMap) -> Self {
        self.labels = labels;
        self
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::Unavailable("synthetic engine shut down".into()));
        }
        Ok(())
    }

    /// Bright-pixel bounding box inside one region, with its fill ratio.
    fn scan_region(
        frame: &FrameView<'_>,
        x0: u32,
        y0: u32,
        x1: u32,
        y1: u32,
    ) -> Option<(BoundingBox, f32, [u8; 32])> {
        let mut min = (u32::MAX, u32::MAX);
        let mut max = (0u32, 0u32);
        let mut bright = 0u64;
        let mut hasher = Sha256::new();
        for y in y0..y1 {
            for x in x0..x1 {
                let Some([r, g, b, _]) = frame.pixel(x, y) else {
                    continue;
                };
                let luma = 0.299 * r + 0.587 * g + 0.114 * b;
                if luma >= BRIGHT_LUMA {
                    bright += 1;
                    min = (min.0.min(x), min.1.min(y));
                    max = (max.0.max(x), max.1.max(y));
                }
            }
        }
        if bright == 0 {
            return None;
        }
        let bbox = BoundingBox::new(min.0 as f32, min.1 as f32, (max.0 + 1) as f32, (max.1 + 1) as f32);
        let area = (bbox.width() * bbox.height()).max(1.0);
        let fill = (bright as f32 / area).min(1.0);
        hasher.update(((bbox.width() as u32) / 8).to_le_bytes());
        hasher.update(((bbox.height() as u32) / 8).to_le_bytes());
        Some((bbox, fill, hasher.finalize().into()))
    }

    fn class_from_digest(&self, digest: &[u8; 32]) -> u32 {
        let classes = (self.labels.len() as u32).saturating_sub(1).max(1);
        1 + u32::from(digest[0]) % classes
    }
}

impl InferenceEngine for SyntheticEngine {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn supports(&self, capability: EngineCapability) -> bool {
        matches!(
            capability,
            EngineCapability::Detection | EngineCapability::Classification
        )
    }

    fn infer(
        &mut self,
        frame: &FrameView<'_>,
        _overlay: OverlayFlags,
    ) -> Result<Vec<Detection>, EngineError> {
        self.ensure_open()?;
        let start = Instant::now();
        let (w, h) = (frame.width(), frame.height());
        let (mid_x, mid_y) = (w / 2, h / 2);
        let regions = [
            (0, 0, mid_x, mid_y),
            (mid_x, 0, w, mid_y),
            (0, mid_y, mid_x, h),
            (mid_x, mid_y, w, h),
        ];
        self.profiler.record(Stage::PreProcess, start.elapsed());

        let network = Instant::now();
        let found: Vec<_> = regions
            .iter()
            .filter_map(|&(x0, y0, x1, y1)| Self::scan_region(frame, x0, y0, x1, y1))
            .collect();
        self.profiler.record(Stage::Network, network.elapsed());

        let post = Instant::now();
        let detections: Vec<Detection> = found
            .into_iter()
            .map(|(bbox, fill, digest)| Detection {
                class_id: self.class_from_digest(&digest),
                confidence: 0.5 + 0.5 * fill,
                bbox,
            })
            .filter(|det| det.confidence >= self.threshold)
            .collect();
        self.profiler.record(Stage::PostProcess, post.elapsed());
        self.profiler.finish();
        Ok(detections)
    }

    fn classify(&mut self, frame: &FrameView<'_>) -> Result<ClassificationResult, EngineError> {
        self.ensure_open()?;
        let start = Instant::now();
        let pixels = frame.pixels();
        let first = pixels.first().copied().unwrap_or_default();
        let flat = pixels
            .chunks_exact(4)
            .all(|px| px[0] == first && px[1] == first && px[2] == first);

        let mut hasher = Sha256::new();
        for sample in pixels.iter().step_by(97) {
            hasher.update([(*sample / 32.0) as u8]);
        }
        let digest: [u8; 32] = hasher.finalize().into();
        self.profiler.record(Stage::Network, start.elapsed());
        self.profiler.finish();

        if flat {
            return Ok(ClassificationResult::unclassified());
        }
        let class_id = self.class_from_digest(&digest) as i32;
        let confidence = 0.5 + f32::from(digest[1]) / 510.0;
        Ok(ClassificationResult::new(class_id, confidence))
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
        RuntimeVersion::crate_version("synthetic")
    }

    fn profiler_snapshot(&self) -> Option<String> {
        self.profiler.snapshot()
    }

    fn shutdown(&mut self) -> Result<(), EngineError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn frame_with_square(width: u32, height: u32, x0: u32, y0: u32, side: u32) -> Frame {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let inside = x >= x0 && x < x0 + side && y >= y0 && y < y0 + side;
                let v = if inside { 250.0 } else { 30.0 };
                pixels.extend_from_slice(&[v, v, v, 255.0]);
            }
        }
        Frame::from_rgba(pixels, width, height).unwrap()
    }

    #[test]
    fn detects_bright_square_with_tight_box() {
        let frame = frame_with_square(40, 40, 2, 3, 5);
        let mut engine = SyntheticEngine::new(0.5, false);
        let detections = engine.infer(&frame.view(), OverlayFlags::all()).unwrap();
        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert_eq!(det.bbox, BoundingBox::new(2.0, 3.0, 7.0, 8.0));
        assert_eq!(det.confidence, 1.0);
        assert!(det.class_id >= 1 && (det.class_id as usize) < SYNTHETIC_LABELS.len());
    }

    #[test]
    fn empty_scene_has_no_detections() {
        let frame = Frame::blank(16, 16).unwrap();
        let mut engine = SyntheticEngine::new(0.5, false);
        assert!(engine.infer(&frame.view(), OverlayFlags::empty()).unwrap().is_empty());
    }

    #[test]
    fn flat_frame_is_unclassified() {
        let frame = Frame::blank(16, 16).unwrap();
        let mut engine = SyntheticEngine::new(0.5, false);
        let result = engine.classify(&frame.view()).unwrap();
        assert_eq!(result.recognized(), None);
    }

    #[test]
    fn classification_is_deterministic() {
        let frame = frame_with_square(32, 32, 4, 4, 8);
        let mut engine = SyntheticEngine::new(0.5, false);
        let first = engine.classify(&frame.view()).unwrap();
        let second = engine.classify(&frame.view()).unwrap();
        assert_eq!(first, second);
        let (_, confidence) = first.recognized().unwrap();
        assert!((0.5..=1.0).contains(&confidence));
    }

    #[test]
    fn shutdown_makes_engine_unavailable() {
        let frame = Frame::blank(8, 8).unwrap();
        let mut engine = SyntheticEngine::new(0.5, true);
        engine.shutdown().unwrap();
        engine.shutdown().unwrap();
        assert!(matches!(
            engine.infer(&frame.view(), OverlayFlags::empty()),
            Err(EngineError::Unavailable(_))
        ));
    }

    #[test]
    fn profiling_produces_snapshots() {
        let frame = frame_with_square(16, 16, 0, 0, 4);
        let mut engine = SyntheticEngine::new(0.5, true);
        assert!(engine.profiler_snapshot().is_none());
        engine.infer(&frame.view(), OverlayFlags::empty()).unwrap();
        assert!(engine.profiler_snapshot().unwrap().starts_with("[profiler] frame 1"));
    }
}
