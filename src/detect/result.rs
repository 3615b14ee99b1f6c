/// Axis-aligned box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// One object found by a detector.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    /// Confidence in 0..=1.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Output of a classifier.
///
/// A negative class index or confidence is the "no result" sentinel: the classifier
/// ran but could not decide. That is not an engine error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassificationResult {
    pub class_id: i32,
    pub confidence: f32,
}

impl ClassificationResult {
    pub fn new(class_id: i32, confidence: f32) -> Self {
        Self {
            class_id,
            confidence,
        }
    }

    /// The "no result" sentinel.
    pub fn unclassified() -> Self {
        Self::new(-1, -1.0)
    }

    /// Class id and confidence when the classifier produced a result.
    pub fn recognized(&self) -> Option<(u32, f32)> {
        if self.class_id < 0 || self.confidence < 0.0 {
            return None;
        }
        Some((self.class_id as u32, self.confidence))
    }
}
