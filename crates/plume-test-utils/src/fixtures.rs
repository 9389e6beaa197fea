//! Scripted workers for barrier and controller tests.
//!
//! - [`CountingWorker`]: bumps a shared counter every step.
//! - [`RecordingWorker`]: records every `(round, time)` it sees.
//! - [`FailingWorker`]: returns an error every `every`-th round.
//! - [`PanickingWorker`]: panics in one chosen round.
//! - [`SleepyWorker`]: sleeps a fixed duration per step.
//! - [`BrokenHooksWorker`]: panics in `on_start` and/or `on_stop`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use plume_core::{RoundId, SimTime, WorkerError};
use plume_engine::{StepContext, Worker};

/// Increments a shared counter once per step.
pub struct CountingWorker {
    pub name: String,
    pub counter: Arc<AtomicU64>,
}

impl CountingWorker {
    pub fn new(name: impl Into<String>, counter: Arc<AtomicU64>) -> Self {
        Self {
            name: name.into(),
            counter,
        }
    }
}

impl Worker for CountingWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, _ctx: &StepContext) -> Result<(), WorkerError> {
        self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Shared log of `(round, time)` pairs.
pub type RoundLog = Arc<Mutex<Vec<(RoundId, SimTime)>>>;

/// Appends every context it is stepped with to a shared log.
pub struct RecordingWorker {
    pub name: String,
    pub log: RoundLog,
}

impl RecordingWorker {
    /// Returns the worker and a handle to its log.
    pub fn new(name: impl Into<String>) -> (Self, RoundLog) {
        let log = RoundLog::default();
        (
            Self {
                name: name.into(),
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl Worker for RecordingWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, ctx: &StepContext) -> Result<(), WorkerError> {
        self.log
            .lock()
            .map_err(|_| WorkerError::StepFailed {
                reason: "round log poisoned".into(),
            })?
            .push((ctx.round, ctx.time));
        Ok(())
    }
}

/// Fails every `every`-th round (rounds `every`, `2 * every`, ...).
pub struct FailingWorker {
    pub name: String,
    pub every: u64,
}

impl FailingWorker {
    pub fn new(name: impl Into<String>, every: u64) -> Self {
        Self {
            name: name.into(),
            every: every.max(1),
        }
    }
}

impl Worker for FailingWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, ctx: &StepContext) -> Result<(), WorkerError> {
        if ctx.round.0 % self.every == 0 {
            return Err(WorkerError::StepFailed {
                reason: format!("scripted failure in round {}", ctx.round),
            });
        }
        Ok(())
    }
}

/// Panics in exactly one round.
pub struct PanickingWorker {
    pub name: String,
    pub round: RoundId,
}

impl PanickingWorker {
    pub fn new(name: impl Into<String>, round: RoundId) -> Self {
        Self {
            name: name.into(),
            round,
        }
    }
}

impl Worker for PanickingWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, ctx: &StepContext) -> Result<(), WorkerError> {
        if ctx.round == self.round {
            panic!("scripted panic in round {}", ctx.round);
        }
        Ok(())
    }
}

/// Sleeps for a fixed wall-clock duration every step.
pub struct SleepyWorker {
    pub name: String,
    pub nap: Duration,
}

impl SleepyWorker {
    pub fn new(name: impl Into<String>, nap: Duration) -> Self {
        Self {
            name: name.into(),
            nap,
        }
    }
}

impl Worker for SleepyWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, _ctx: &StepContext) -> Result<(), WorkerError> {
        std::thread::sleep(self.nap);
        Ok(())
    }
}

/// Panics in its lifecycle hooks; counts the steps it does get to run.
pub struct BrokenHooksWorker {
    pub name: String,
    pub panic_on_start: bool,
    pub panic_on_stop: bool,
    pub steps: Arc<AtomicU64>,
}

impl BrokenHooksWorker {
    pub fn new(name: impl Into<String>, panic_on_start: bool, panic_on_stop: bool) -> Self {
        Self {
            name: name.into(),
            panic_on_start,
            panic_on_stop,
            steps: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Worker for BrokenHooksWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, _ctx: &StepContext) -> Result<(), WorkerError> {
        self.steps.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_start(&mut self) {
        if self.panic_on_start {
            panic!("setup failed");
        }
    }

    fn on_stop(&mut self) {
        if self.panic_on_stop {
            panic!("teardown failed");
        }
    }
}
