//! Scripted collaborators that record every call into a shared event log.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use log::{Level, LevelFilter, Log, Metadata, Record};

use perception_loop::detect::{
    BoundingBox, ClassificationResult, Detection, EngineCapability, InferenceEngine, Overlay,
    OverlayFlags, Precision, RuntimeVersion,
};
use perception_loop::display::PresentationSink;
use perception_loop::error::{AcquireError, DeviceError, EngineError, RenderError};
use perception_loop::frame::{Frame, FrameView};
use perception_loop::ingest::FrameSource;
use perception_loop::report::Reporter;
use perception_loop::run_state::StopSignal;

#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| e.as_str() == event).count()
    }

    /// Events that start with `prefix`, in order.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }
}

/// What the next `acquire` does.
#[derive(Clone, Debug)]
pub enum Step {
    Frame,
    Timeout,
    /// Deliver a frame, raising the stop signal while "blocked" in acquire.
    FrameWithSignal(StopSignal),
    Disconnect,
}

/// Source that follows a script, then keeps delivering frames.
pub struct ScriptedSource {
    log: EventLog,
    script: VecDeque<Step>,
    frame: Frame,
    fail_open: bool,
}

impl ScriptedSource {
    pub fn new(log: &EventLog, script: impl IntoIterator<Item = Step>) -> Self {
        Self {
            log: log.clone(),
            script: script.into_iter().collect(),
            frame: Frame::blank(8, 6).unwrap(),
            fail_open: false,
        }
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

impl FrameSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn open(&mut self) -> Result<(), DeviceError> {
        self.log.push("open:source");
        if self.fail_open {
            return Err(DeviceError::Disconnected {
                device: "scripted".into(),
                reason: "busy".into(),
            });
        }
        Ok(())
    }

    fn acquire(&mut self, timeout: Duration) -> Result<FrameView<'_>, AcquireError> {
        self.log.push("acquire");
        match self.script.pop_front().unwrap_or(Step::Frame) {
            Step::Frame => Ok(self.frame.view()),
            Step::Timeout => Err(AcquireError::Timeout(timeout)),
            Step::FrameWithSignal(signal) => {
                signal.raise();
                Ok(self.frame.view())
            }
            Step::Disconnect => Err(AcquireError::Device(DeviceError::Disconnected {
                device: "scripted".into(),
                reason: "unplugged".into(),
            })),
        }
    }

    fn width(&self) -> u32 {
        self.frame.width()
    }

    fn height(&self) -> u32 {
        self.frame.height()
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.log.push("close:source");
        Ok(())
    }
}

/// Engine returning fixed detections, optionally failing on the Nth inference.
pub struct ScriptedEngine {
    log: EventLog,
    detections: Vec<Detection>,
    fail_on: Option<usize>,
    classification: ClassificationResult,
    capabilities: Vec<EngineCapability>,
    inferences: usize,
    fail_shutdown: bool,
    profiling: bool,
}

impl ScriptedEngine {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            detections: vec![
                detection(3, 0.91, 10.0, 10.0, 40.0, 30.0),
                detection(1, 0.62, 2.0, 4.0, 6.0, 8.0),
                detection(7, 0.55, 20.0, 0.0, 25.0, 5.0),
            ],
            fail_on: None,
            classification: ClassificationResult::new(4, 0.8),
            capabilities: vec![EngineCapability::Detection, EngineCapability::Classification],
            inferences: 0,
            fail_shutdown: false,
            profiling: false,
        }
    }

    pub fn failing_on(mut self, inference: usize) -> Self {
        self.fail_on = Some(inference);
        self
    }

    pub fn classifying(mut self, result: ClassificationResult) -> Self {
        self.classification = result;
        self
    }

    pub fn only(mut self, capability: EngineCapability) -> Self {
        self.capabilities = vec![capability];
        self
    }

    pub fn failing_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }

    pub fn detecting(mut self, detections: Vec<Detection>) -> Self {
        self.detections = detections;
        self
    }

    /// Emit `[profiler] inference N` after every inference.
    pub fn profiling(mut self) -> Self {
        self.profiling = true;
        self
    }
}

pub fn detection(class_id: u32, confidence: f32, l: f32, t: f32, r: f32, b: f32) -> Detection {
    Detection {
        class_id,
        confidence,
        bbox: BoundingBox::new(l, t, r, b),
    }
}

impl InferenceEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn supports(&self, capability: EngineCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn infer(
        &mut self,
        _frame: &FrameView<'_>,
        _overlay: OverlayFlags,
    ) -> Result<Vec<Detection>, EngineError> {
        self.inferences += 1;
        self.log.push("infer");
        if self.fail_on == Some(self.inferences) {
            return Err(EngineError::Inference("device lost".into()));
        }
        Ok(self.detections.clone())
    }

    fn classify(&mut self, _frame: &FrameView<'_>) -> Result<ClassificationResult, EngineError> {
        self.log.push("classify");
        if self.fail_on.is_some() {
            return Err(EngineError::Inference("device lost".into()));
        }
        Ok(self.classification)
    }

    fn label_for(&self, class_id: u32) -> String {
        self.log.push(format!("label:{}", class_id));
        format!("class-{}", class_id)
    }

    fn current_fps(&self) -> f32 {
        42.4
    }

    fn precision_mode(&self) -> Precision {
        Precision::Fp16
    }

    fn runtime_version(&self) -> RuntimeVersion {
        RuntimeVersion {
            name: "scripted",
            major: 1,
            minor: 2,
            patch: 3,
        }
    }

    fn profiler_snapshot(&self) -> Option<String> {
        self.profiling
            .then(|| format!("[profiler] inference {}", self.inferences))
    }

    fn shutdown(&mut self) -> Result<(), EngineError> {
        self.log.push("shutdown:engine");
        if self.fail_shutdown {
            return Err(EngineError::Unavailable("already gone".into()));
        }
        Ok(())
    }
}

/// Sink recording overlays and status lines; reports user close after N renders.
pub struct RecordingSink {
    log: EventLog,
    overlays: Arc<Mutex<Vec<Overlay>>>,
    close_after: Option<usize>,
    renders: usize,
    fail_close: bool,
}

impl RecordingSink {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            overlays: Arc::default(),
            close_after: None,
            renders: 0,
            fail_close: false,
        }
    }

    pub fn closing_after(mut self, renders: usize) -> Self {
        self.close_after = Some(renders);
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn overlays(&self) -> Arc<Mutex<Vec<Overlay>>> {
        Arc::clone(&self.overlays)
    }
}

impl PresentationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn render_frame(&mut self, _frame: &FrameView<'_>, overlay: &Overlay) -> Result<(), RenderError> {
        self.renders += 1;
        self.log.push("render");
        self.overlays.lock().unwrap().push(overlay.clone());
        Ok(())
    }

    fn set_status_text(&mut self, status: &str) {
        self.log.push(format!("status:{}", status));
    }

    fn was_closed_by_user(&self) -> bool {
        self.close_after.is_some_and(|n| self.renders >= n)
    }

    fn close(&mut self) -> Result<(), RenderError> {
        self.log.push("close:display");
        if self.fail_close {
            return Err(RenderError::Closed);
        }
        Ok(())
    }
}

/// In-memory stdout.
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn reporter(&self) -> Reporter {
        Reporter::new(Box::new(self.clone()))
    }

    pub fn text(&self) -> String {
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

/// Logger keeping warnings per thread, so parallel tests stay apart.
struct ThreadLogger {
    records: Mutex<Vec<(ThreadId, String)>>,
}

impl Log for ThreadLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.records
                .lock()
                .unwrap()
                .push((thread::current().id(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: ThreadLogger = ThreadLogger {
    records: Mutex::new(Vec::new()),
};

/// Route warnings to the in-memory logger. Safe to call from every test.
pub fn capture_warnings() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Warn);
    }
}

/// Warnings logged so far by the calling thread.
pub fn warnings() -> Vec<String> {
    let me = thread::current().id();
    LOGGER
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|(id, _)| *id == me)
        .map(|(_, message)| message.clone())
        .collect()
}
