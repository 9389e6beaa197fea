//! Run controller: spawns worker threads and drives the barrier round
//! by round.
//!
//! ```text
//! Controller::run
//! ├── spawn one runner thread per worker ("plume-worker-{id}-{name}")
//! ├── barrier.wait_ready()
//! ├── loop t = start..=end step dt
//! │   ├── release_round(t) → await_round()
//! │   ├── drain StepFaults, record RoundMetrics, warn on slow rounds
//! │   └── checkpoint hook every `checkpoint_every` rounds
//! └── barrier.stop() → join every runner → RunReport
//! ```
//!
//! The controller thread is the only writer of simulation time. It
//! never runs concurrently with a round: the checkpoint hook sees a
//! quiescent system.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use plume_core::{SimTime, WorkerId};

use crate::barrier::{RoundSummary, ThreadBarrier};
use crate::config::{ConfigError, RunConfig};
use crate::metrics::{RoundMetrics, RunMetrics};
use crate::runner::{spawn_worker, CancelToken, StepFault, WorkerExit};
use crate::worker::Worker;

type CheckpointHook = Box<dyn FnMut(&RoundSummary)>;

/// Outcome of [`Controller::run`].
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Rounds completed.
    pub rounds: u64,
    /// Simulation time of the last completed round.
    pub final_time: Option<SimTime>,
    /// Timing summary.
    pub metrics: RunMetrics,
    /// Every step fault reported during the run, in arrival order.
    pub faults: Vec<StepFault>,
    /// Exit status of each runner that joined cleanly.
    pub workers: Vec<WorkerExit>,
    /// Runner threads spawned.
    pub workers_spawned: usize,
}

impl RunReport {
    /// Number of step faults.
    pub fn fault_count(&self) -> usize {
        self.faults.len()
    }

    /// Whether every spawned runner thread joined without panicking.
    pub fn all_joined(&self) -> bool {
        self.workers.len() == self.workers_spawned
    }
}

/// Drives a fixed set of workers through a run.
pub struct Controller {
    config: RunConfig,
    workers: Vec<(Box<dyn Worker>, CancelToken)>,
    checkpoint: Option<CheckpointHook>,
}

impl Controller {
    /// A controller for `config` with no workers yet.
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            workers: Vec::new(),
            checkpoint: None,
        }
    }

    /// The run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Number of workers added so far.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Add a worker. Returns its barrier id and a token that stops it
    /// at the next round boundary.
    pub fn add_worker(&mut self, worker: Box<dyn Worker>) -> (WorkerId, CancelToken) {
        let id = WorkerId(self.workers.len() as u32);
        let token = CancelToken::new();
        self.workers.push((worker, token.clone()));
        (id, token)
    }

    /// Register a hook called between rounds every
    /// [`checkpoint_every`](RunConfig::checkpoint_every) rounds.
    pub fn on_checkpoint(&mut self, hook: impl FnMut(&RoundSummary) + 'static) {
        self.checkpoint = Some(Box::new(hook));
    }

    /// Run to completion: until `end_ms` has been released, or every
    /// worker has retired.
    pub fn run(mut self) -> Result<RunReport, ConfigError> {
        self.config.validate()?;
        if self.workers.is_empty() {
            return Err(ConfigError::NoWorkers);
        }
        let config = self.config.clone();
        let barrier = Arc::new(ThreadBarrier::new(self.workers.len()));
        let (fault_tx, fault_rx) = crossbeam_channel::unbounded();

        let mut handles: Vec<JoinHandle<WorkerExit>> = Vec::with_capacity(self.workers.len());
        for (i, (worker, token)) in self.workers.drain(..).enumerate() {
            let spawned = spawn_worker(
                Arc::clone(&barrier),
                WorkerId(i as u32),
                worker,
                token,
                config.dt_ms,
                fault_tx.clone(),
            );
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    log::error!("failed to spawn worker {i}: {e}");
                    barrier.stop();
                    join_all(handles);
                    return Err(ConfigError::ThreadSpawnFailed {
                        reason: e.to_string(),
                    });
                }
            }
        }
        drop(fault_tx);
        let workers_spawned = handles.len();

        log::info!(
            "run starting: {workers_spawned} workers, {}..={} ms every {} ms",
            config.start_ms,
            config.end_ms,
            config.dt_ms
        );

        let mut faults = Vec::new();
        let mut metrics = RunMetrics::default();
        let mut final_time = None;
        let outcome = self.drive(&barrier, &fault_rx, &mut faults, &mut metrics, &mut final_time);

        barrier.stop();
        let workers = join_all(handles);
        faults.extend(fault_rx.try_iter());
        outcome?;

        log::info!(
            "run finished: {} rounds, final time {}, {} faults",
            metrics.rounds,
            final_time.map_or_else(|| "-".to_string(), |t: SimTime| t.to_string()),
            faults.len()
        );
        Ok(RunReport {
            rounds: metrics.rounds,
            final_time,
            metrics,
            faults,
            workers,
            workers_spawned,
        })
    }

    /// The round loop. Returns early on barrier failure; the caller
    /// stops the barrier and joins threads either way.
    fn drive(
        &mut self,
        barrier: &ThreadBarrier,
        fault_rx: &Receiver<StepFault>,
        faults: &mut Vec<StepFault>,
        metrics: &mut RunMetrics,
        final_time: &mut Option<SimTime>,
    ) -> Result<(), ConfigError> {
        let config = &self.config;
        let warn_after = Duration::from_millis(config.round_warn_ms);
        barrier.wait_ready()?;

        let mut t = config.start_ms;
        while t <= config.end_ms {
            if barrier.active_workers() == 0 {
                log::info!("all workers retired before {}", SimTime(t));
                break;
            }
            let started = Instant::now();
            barrier.release_round(SimTime(t))?;
            let summary = barrier.await_round()?;
            let elapsed = started.elapsed();

            let before = faults.len();
            faults.extend(fault_rx.try_iter());
            let round_faults = faults.len() - before;

            let slow = config.round_warn_ms > 0 && elapsed > warn_after;
            if slow {
                log::warn!(
                    "round {} at {} took {} ms (limit {} ms)",
                    summary.round,
                    summary.time,
                    elapsed.as_millis(),
                    config.round_warn_ms
                );
            }
            metrics.record(
                RoundMetrics {
                    round: summary.round,
                    time: summary.time,
                    wall_us: elapsed.as_micros() as u64,
                    finished: summary.finished,
                    faults: round_faults,
                },
                slow,
            );
            *final_time = Some(summary.time);

            if config.checkpoint_every > 0 && summary.round.0 % config.checkpoint_every == 0 {
                if let Some(hook) = self.checkpoint.as_mut() {
                    hook(&summary);
                }
            }

            t = match t.checked_add(config.dt_ms) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(())
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.config)
            .field("workers", &self.workers.len())
            .field("checkpoint", &self.checkpoint.is_some())
            .finish()
    }
}

/// Join every runner, keeping the exits of those that did not panic.
fn join_all(handles: Vec<JoinHandle<WorkerExit>>) -> Vec<WorkerExit> {
    let mut exits = Vec::with_capacity(handles.len());
    for handle in handles {
        let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
        match handle.join() {
            Ok(exit) => exits.push(exit),
            Err(_) => log::error!("runner thread {name} panicked outside its step"),
        }
    }
    exits
}
