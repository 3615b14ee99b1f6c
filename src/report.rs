//! Console report: the program output of a run.
//!
//! Diagnostics go through `log`; detections, classifications and profiler snapshots
//! are written here. A failed write is logged and never stops the loop.

use std::io::{self, Write};

use crate::detect::{ClassificationResult, Detection, Precision, RuntimeVersion};

/// Status string shown by presentation sinks.
pub fn format_status(runtime: RuntimeVersion, precision: Precision, fps: f32) -> String {
    format!("{} | {} | Network {:.0} FPS", runtime, precision, fps)
}

pub struct Reporter {
    out: Box<dyn Write + Send>,
}

impl Reporter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Report a tick's detections in engine order. An empty tick writes nothing.
    pub fn detections(&mut self, detections: &[Detection], label_for: impl Fn(u32) -> String) {
        if detections.is_empty() {
            return;
        }
        let mut text = format!("{} objects detected\n", detections.len());
        for (n, det) in detections.iter().enumerate() {
            let b = &det.bbox;
            text.push_str(&format!(
                "detected obj {} class #{} ({}) confidence={:.6}\n",
                n,
                det.class_id,
                label_for(det.class_id),
                det.confidence
            ));
            text.push_str(&format!(
                "bounding box {} ({:.2}, {:.2}) ({:.2}, {:.2}) w={:.2} h={:.2}\n",
                n,
                b.left,
                b.top,
                b.right,
                b.bottom,
                b.width(),
                b.height()
            ));
        }
        self.emit(&text);
    }

    /// Report a single-shot classification. The sentinel result prints no label.
    pub fn classification(&mut self, result: &ClassificationResult, label_for: impl Fn(u32) -> String) {
        let line = match result.recognized() {
            Some((class_id, confidence)) => format!(
                "image is recognized as '{}' (class #{}) with {:.6}% confidence\n",
                label_for(class_id),
                class_id,
                confidence * 100.0
            ),
            None => "failed to classify image\n".to_string(),
        };
        self.emit(&line);
    }

    pub fn profiler(&mut self, snapshot: &str) {
        self.emit(&format!("{}\n", snapshot));
    }

    fn emit(&mut self, text: &str) {
        if let Err(err) = self
            .out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush())
        {
            log::warn!("failed to write report: {}", err);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::detect::BoundingBox;

    /// In-memory writer shared with the test.
    #[derive(Clone, Default)]
    pub(crate) struct Captured(pub Arc<Mutex<Vec<u8>>>);

    impl Captured {
        pub(crate) fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn detection_lines_follow_engine_order() {
        let captured = Captured::default();
        let mut reporter = Reporter::new(Box::new(captured.clone()));
        let detections = vec![
            Detection {
                class_id: 2,
                confidence: 0.75,
                bbox: BoundingBox::new(10.0, 20.0, 50.0, 60.0),
            },
            Detection {
                class_id: 1,
                confidence: 0.5,
                bbox: BoundingBox::new(0.0, 0.0, 4.0, 2.0),
            },
        ];
        reporter.detections(&detections, |id| format!("label{}", id));
        assert_eq!(
            captured.text(),
            "2 objects detected\n\
             detected obj 0 class #2 (label2) confidence=0.750000\n\
             bounding box 0 (10.00, 20.00) (50.00, 60.00) w=40.00 h=40.00\n\
             detected obj 1 class #1 (label1) confidence=0.500000\n\
             bounding box 1 (0.00, 0.00) (4.00, 2.00) w=4.00 h=2.00\n"
        );
    }

    #[test]
    fn empty_tick_writes_nothing() {
        let captured = Captured::default();
        let mut reporter = Reporter::new(Box::new(captured.clone()));
        reporter.detections(&[], |_| panic!("label lookup without detections"));
        reporter.detections(&[], |_| panic!("label lookup without detections"));
        assert!(captured.text().is_empty());
    }

    #[test]
    fn unclassified_prints_no_label() {
        let captured = Captured::default();
        let mut reporter = Reporter::new(Box::new(captured.clone()));
        reporter.classification(&ClassificationResult::unclassified(), |_| {
            panic!("label lookup for unclassified result")
        });
        assert_eq!(captured.text(), "failed to classify image\n");
    }

    #[test]
    fn classification_line() {
        let captured = Captured::default();
        let mut reporter = Reporter::new(Box::new(captured.clone()));
        reporter.classification(&ClassificationResult::new(7, 0.5), |_| "banana".into());
        assert_eq!(
            captured.text(),
            "image is recognized as 'banana' (class #7) with 50.000000% confidence\n"
        );
    }

    #[test]
    fn status_string_shape() {
        let runtime = RuntimeVersion {
            name: "tract",
            major: 0,
            minor: 21,
            patch: 0,
        };
        assert_eq!(
            format_status(runtime, Precision::Fp32, 29.6),
            "tract 0.21.0 | FP32 | Network 30 FPS"
        );
    }
}
