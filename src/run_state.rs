//! Loop lifecycle and the asynchronous stop request.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};

/// Lifecycle of one perception run.
///
/// Transitions only go forward: `Running -> StopRequested -> ShuttingDown -> Stopped`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    #[default]
    Running,
    StopRequested,
    ShuttingDown,
    Stopped,
}

impl RunState {
    /// Move forward to `next`. Moving backwards or sideways is ignored.
    pub fn advance(&mut self, next: RunState) -> bool {
        if next > *self {
            log::debug!("run state {} -> {}", self, next);
            *self = next;
            true
        } else {
            false
        }
    }

    pub fn is_running(self) -> bool {
        self == RunState::Running
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Running => "running",
            RunState::StopRequested => "stop-requested",
            RunState::ShuttingDown => "shutting-down",
            RunState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Stop request shared between the loop and an interrupt handler.
///
/// The handler only sets the flag. The loop reads it at tick boundaries and does
/// all logging and teardown itself.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route SIGINT/SIGTERM to this signal.
    ///
    /// Only one handler can be installed per process.
    pub fn install(&self) -> Result<()> {
        let raised = Arc::clone(&self.raised);
        ctrlc::set_handler(move || raised.store(true, Ordering::SeqCst))
            .context("error setting Ctrl-C handler")
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}
