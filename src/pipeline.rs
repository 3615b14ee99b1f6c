//! The continuous perception loop.
//!
//! One control thread runs strictly sequential ticks:
//!
//! 1. leave if a stop was requested (never a partial tick)
//! 2. acquire a frame; a timeout is retried on the next tick, a device failure is fatal
//! 3. run detection on it; an engine failure is fatal
//! 4. report every detection in engine order
//! 5. present the frame, overlay and status line, unless headless
//! 6. report the engine's profiler snapshot, if any
//!
//! Stops are cooperative. An interrupt only raises the [`StopSignal`]; a user close is
//! seen right after rendering. Either way the current tick finishes and the loop leaves
//! at the next boundary. Collaborators are then released in the order source, display,
//! engine, exactly once, whichever way the run ended.

use std::time::Duration;

use crate::detect::{EngineCapability, InferenceEngine, Overlay, OverlayConfig};
use crate::display::PresentationSink;
use crate::error::{AcquireError, DeviceError, EngineError, FatalError};
use crate::ingest::FrameSource;
use crate::report::{format_status, Reporter};
use crate::run_state::{RunState, StopSignal};

/// How long one `acquire` may block before the tick counts as a transient failure.
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Clone, Debug)]
pub struct LoopConfig {
    pub capture_timeout: Duration,
    pub overlay: OverlayConfig,
    /// Stop normally after this many ticks.
    pub max_frames: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
            overlay: OverlayConfig::default(),
            max_frames: None,
        }
    }
}

/// Why the loop stopped.
#[derive(Debug)]
pub enum StopReason {
    /// Interrupt signal.
    Signal,
    /// The presentation sink reported that the user closed it.
    WindowClosed,
    /// `max_frames` ticks ran.
    FrameLimit,
    Fatal(FatalError),
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::Fatal(_))
    }
}

/// Counters for one run.
#[derive(Debug)]
pub struct RunSummary {
    pub ticks: u64,
    /// Frames acquired.
    pub frames: u64,
    /// Capture timeouts.
    pub transient_failures: u64,
    pub inferences: u64,
    pub detections: u64,
    pub stop: StopReason,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: u64,
    frames: u64,
    transient_failures: u64,
    inferences: u64,
    detections: u64,
}

impl Counters {
    fn finish(self, stop: StopReason) -> RunSummary {
        RunSummary {
            ticks: self.ticks,
            frames: self.frames,
            transient_failures: self.transient_failures,
            inferences: self.inferences,
            detections: self.detections,
            stop,
        }
    }
}

/// Continuous camera -> detector -> display loop.
///
/// Owns its collaborators; dropping the loop releases whatever is still held.
pub struct DetectionLoop {
    source: Option<Box<dyn FrameSource>>,
    display: Option<Box<dyn PresentationSink>>,
    engine: Option<Box<dyn InferenceEngine>>,
    config: LoopConfig,
    stop: StopSignal,
    reporter: Reporter,
    state: RunState,
}

impl DetectionLoop {
    /// Take ownership of an opened source, a loaded engine and an optional display
    /// (`None` runs headless).
    ///
    /// Fails if the engine cannot detect objects. Everything passed in is released
    /// before the error is returned.
    pub fn new(
        source: Box<dyn FrameSource>,
        engine: Box<dyn InferenceEngine>,
        display: Option<Box<dyn PresentationSink>>,
        config: LoopConfig,
        stop: StopSignal,
        reporter: Reporter,
    ) -> Result<Self, FatalError> {
        let supported = engine.supports(EngineCapability::Detection);
        let engine_name = engine.name();
        let detection_loop = Self {
            source: Some(source),
            display,
            engine: Some(engine),
            config,
            stop,
            reporter,
            state: RunState::Running,
        };
        if !supported {
            return Err(EngineError::Unsupported {
                engine: engine_name,
                operation: "object detection",
            }
            .into());
        }
        Ok(detection_loop)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_headless(&self) -> bool {
        self.display.is_none()
    }

    /// Run until stopped, then tear down.
    pub fn run(&mut self) -> RunSummary {
        let mut counters = Counters::default();
        let mut requested = None;

        let reason = loop {
            if self.state.is_running() && self.stop.is_raised() {
                log::info!("stop signal received");
                self.state.advance(RunState::StopRequested);
                requested = Some(StopReason::Signal);
            }
            if !self.state.is_running() {
                break requested.take().unwrap_or(StopReason::Signal);
            }

            match self.tick(&mut counters) {
                Ok(Some(reason)) => {
                    self.state.advance(RunState::StopRequested);
                    requested = Some(reason);
                }
                Ok(None) => {
                    if self.config.max_frames.is_some_and(|max| counters.ticks >= max) {
                        log::info!("frame limit of {} reached", counters.ticks);
                        self.state.advance(RunState::StopRequested);
                        requested = Some(StopReason::FrameLimit);
                    }
                }
                Err(err) => {
                    log::error!("{}", err);
                    self.state.advance(RunState::StopRequested);
                    break StopReason::Fatal(err);
                }
            }
        };

        self.teardown();
        let summary = counters.finish(reason);
        log::info!(
            "run finished: {} ticks, {} frames, {} capture timeouts, {} inferences, {} detections",
            summary.ticks,
            summary.frames,
            summary.transient_failures,
            summary.inferences,
            summary.detections
        );
        summary
    }

    /// One acquire/infer/report/present pass. Returns a stop request raised by the
    /// display, or the error that ends the run.
    fn tick(&mut self, counters: &mut Counters) -> Result<Option<StopReason>, FatalError> {
        counters.ticks += 1;

        let source = self
            .source
            .as_mut()
            .ok_or_else(|| DeviceError::NotOpen("frame source".into()))?;
        let frame = match source.acquire(self.config.capture_timeout) {
            Ok(frame) => frame,
            Err(AcquireError::Timeout(waited)) => {
                counters.transient_failures += 1;
                log::warn!("failed to capture frame within {:?}", waited);
                return Ok(None);
            }
            Err(AcquireError::Device(err)) => return Err(err.into()),
        };
        counters.frames += 1;

        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| EngineError::Unavailable("engine already released".into()))?;
        let detections = engine.infer(&frame, self.config.overlay.flags)?;
        counters.inferences += 1;
        counters.detections += detections.len() as u64;

        let engine: &dyn InferenceEngine = &**engine;
        self.reporter
            .detections(&detections, |class_id| engine.label_for(class_id));

        let mut requested = None;
        if let Some(display) = self.display.as_mut() {
            let overlay = Overlay::build(&detections, &self.config.overlay, |class_id| {
                engine.label_for(class_id)
            });
            display.render_frame(&frame, &overlay)?;
            display.set_status_text(&format_status(
                engine.runtime_version(),
                engine.precision_mode(),
                engine.current_fps(),
            ));
            if display.was_closed_by_user() {
                log::info!("display {} closed by user", display.name());
                requested = Some(StopReason::WindowClosed);
            }
        }

        if let Some(snapshot) = engine.profiler_snapshot() {
            self.reporter.profiler(&snapshot);
        }
        Ok(requested)
    }

    /// Release every collaborator still held: source, then display, then engine.
    ///
    /// Safe to call more than once. A failed release is logged and the rest still run.
    pub fn teardown(&mut self) {
        if self.state == RunState::Stopped {
            return;
        }
        self.state.advance(RunState::StopRequested);
        self.state.advance(RunState::ShuttingDown);
        log::info!("shutting down...");

        if let Some(mut source) = self.source.take() {
            if let Err(err) = source.close() {
                log::error!("failed to close frame source {}: {}", source.name(), err);
            }
        }
        if let Some(mut display) = self.display.take() {
            if let Err(err) = display.close() {
                log::error!("failed to close display {}: {}", display.name(), err);
            }
        }
        if let Some(mut engine) = self.engine.take() {
            if let Err(err) = engine.shutdown() {
                log::error!("failed to release engine {}: {}", engine.name(), err);
            }
        }

        self.state.advance(RunState::Stopped);
        log::info!("shutdown complete.");
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.teardown();
    }
}
