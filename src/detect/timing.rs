//! Rolling FPS and per-stage timing for engines.

use std::time::Duration;

/// Exponentially smoothed frames-per-second of the network.
#[derive(Clone, Copy, Debug, Default)]
pub struct FpsMeter {
    smoothed: f32,
}

impl FpsMeter {
    pub fn record(&mut self, elapsed: Duration) {
        let secs = elapsed.as_secs_f32();
        if secs <= 0.0 {
            return;
        }
        let instant = 1.0 / secs;
        self.smoothed = if self.smoothed == 0.0 {
            instant
        } else {
            0.9 * self.smoothed + 0.1 * instant
        };
    }

    pub fn fps(&self) -> f32 {
        self.smoothed
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    PreProcess,
    Network,
    PostProcess,
}

impl Stage {
    fn index(self) -> usize {
        match self {
            Stage::PreProcess => 0,
            Stage::Network => 1,
            Stage::PostProcess => 2,
        }
    }
}

/// Timings of the last inference plus the rolling FPS derived from them.
#[derive(Clone, Debug, Default)]
pub struct Profiler {
    enabled: bool,
    stages: [Duration; 3],
    fps: FpsMeter,
    frames: u64,
}

impl Profiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.stages[stage.index()] = elapsed;
    }

    /// Close out one inference; the total drives the FPS figure.
    pub fn finish(&mut self) {
        self.frames += 1;
        self.fps.record(self.total());
    }

    pub fn total(&self) -> Duration {
        self.stages.iter().sum()
    }

    pub fn fps(&self) -> f32 {
        self.fps.fps()
    }

    /// Formatted timings, or `None` when profiling is off or nothing ran yet.
    pub fn snapshot(&self) -> Option<String> {
        if !self.enabled || self.frames == 0 {
            return None;
        }
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;
        Some(format!(
            "[profiler] frame {} | pre-process {:.2} ms | network {:.2} ms | post-process {:.2} ms | total {:.2} ms",
            self.frames,
            ms(self.stages[0]),
            ms(self.stages[1]),
            ms(self.stages[2]),
            ms(self.total())
        ))
    }
}
