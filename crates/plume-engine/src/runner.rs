//! Generic worker runner: the thread loop around [`Worker::step`].
//!
//! Per round the runner checks the worker's [`CancelToken`], snapshots
//! the simulation time, runs the step with errors and panics caught,
//! and always reports completion to the barrier. A failing step is
//! logged and forwarded to the controller as a [`StepFault`] over a
//! crossbeam channel; it never stalls the round.
//!
//! The `on_start` and `on_stop` hooks are guarded the same way. A worker
//! whose `on_start` panics still registers, so the barrier can become
//! ready, and then retires at the first round without stepping.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use plume_core::{BarrierError, RoundId, WorkerError, WorkerId};

use crate::barrier::{Release, ThreadBarrier};
use crate::worker::{StepContext, Worker};

/// Cooperative stop flag for one worker.
///
/// Checked by the runner at the top of every round. Cancelling takes
/// effect at the next round boundary; the barrier never preempts.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the worker leave the run.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A caught step failure, sent to the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepFault {
    /// The failing worker.
    pub worker: WorkerId,
    /// Its name.
    pub name: String,
    /// The round in which it failed; `RoundId(0)` for `on_start`.
    pub round: RoundId,
    /// What went wrong.
    pub error: WorkerError,
}

/// How a runner thread ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerExit {
    /// The worker.
    pub worker: WorkerId,
    /// Rounds in which the step ran (including failed steps).
    pub rounds: u64,
    /// Steps that failed or panicked.
    pub faults: u64,
    /// Whether the worker left via its cancel token.
    pub cancelled: bool,
    /// Barrier error that ended the loop, if any.
    pub barrier_error: Option<BarrierError>,
}

/// State moved onto a worker thread.
pub(crate) struct Runner {
    pub id: WorkerId,
    pub worker: Box<dyn Worker>,
    pub barrier: Arc<ThreadBarrier>,
    pub cancel: CancelToken,
    pub dt_ms: i64,
    pub faults: Sender<StepFault>,
}

impl Runner {
    /// Run the worker until the barrier stops, the worker is cancelled,
    /// or the barrier reports a protocol violation.
    pub fn run(mut self) -> WorkerExit {
        let name = self.worker.name().to_string();
        let mut exit = WorkerExit {
            worker: self.id,
            rounds: 0,
            faults: 0,
            cancelled: false,
            barrier_error: None,
        };

        let mut last_round = RoundId::default();
        let mut setup_failed = false;
        if let Err(error) = self.hook(&name, "on_start", |w| w.on_start()) {
            setup_failed = true;
            self.report(&mut exit, &name, last_round, error);
        }

        let mut release = self.barrier.initialized(self.id);
        loop {
            let round = match release {
                Ok(Release::Round(round)) => round,
                Ok(Release::Stop) => break,
                Err(e) => {
                    log::error!("worker {} ({name}) left the barrier: {e}", self.id);
                    exit.barrier_error = Some(e);
                    break;
                }
            };
            last_round = round;

            if setup_failed {
                setup_failed = false;
                log::warn!("worker {} ({name}) retiring after failed setup", self.id);
                if let Err(e) = self.barrier.request_stop(self.id) {
                    exit.barrier_error = Some(e);
                    break;
                }
            } else if self.cancel.is_cancelled() && !exit.cancelled {
                exit.cancelled = true;
                if let Err(e) = self.barrier.request_stop(self.id) {
                    exit.barrier_error = Some(e);
                    break;
                }
            } else {
                let ctx = StepContext {
                    round,
                    time: self.barrier.simulation_time(),
                    dt_ms: self.dt_ms,
                };
                exit.rounds += 1;
                if let Err(error) = self.step(&name, &ctx) {
                    self.report(&mut exit, &name, round, error);
                }
            }

            release = self.barrier.loopfinished(self.id);
        }
        if let Err(error) = self.hook(&name, "on_stop", |w| w.on_stop()) {
            self.report(&mut exit, &name, last_round, error);
        }
        log::debug!(
            "worker {} ({name}) exited after {} rounds",
            self.id,
            exit.rounds
        );
        exit
    }

    fn report(&self, exit: &mut WorkerExit, name: &str, round: RoundId, error: WorkerError) {
        exit.faults += 1;
        // Best-effort: the controller may already have stopped listening.
        let _ = self.faults.send(StepFault {
            worker: self.id,
            name: name.to_string(),
            round,
            error,
        });
    }

    /// Run a lifecycle hook, turning a panic into [`WorkerError::Panicked`].
    fn hook(
        &mut self,
        name: &str,
        hook: &str,
        f: impl FnOnce(&mut dyn Worker),
    ) -> Result<(), WorkerError> {
        let worker = &mut *self.worker;
        catch_unwind(AssertUnwindSafe(|| f(worker))).map_err(|payload| {
            let message = panic_message(payload.as_ref());
            log::error!("worker {} ({name}) panicked in {hook}: {message}", self.id);
            WorkerError::Panicked { message }
        })
    }

    /// Run one step, turning a panic into [`WorkerError::Panicked`].
    fn step(&mut self, name: &str, ctx: &StepContext) -> Result<(), WorkerError> {
        let worker = &mut self.worker;
        match catch_unwind(AssertUnwindSafe(|| worker.step(ctx))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                log::warn!("worker {} ({name}) failed round {}: {e}", self.id, ctx.round);
                Err(e)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!(
                    "worker {} ({name}) panicked in round {}: {message}",
                    self.id,
                    ctx.round
                );
                Err(WorkerError::Panicked { message })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Spawn `worker` on a named thread driven by `barrier`.
///
/// The worker registers as `id`; `id` must be below the barrier's
/// expected count.
pub fn spawn_worker(
    barrier: Arc<ThreadBarrier>,
    id: WorkerId,
    worker: Box<dyn Worker>,
    cancel: CancelToken,
    dt_ms: i64,
    faults: Sender<StepFault>,
) -> std::io::Result<JoinHandle<WorkerExit>> {
    let thread_name = format!("plume-worker-{}-{}", id.0, worker.name());
    let runner = Runner {
        id,
        worker,
        barrier,
        cancel,
        dt_ms,
        faults,
    };
    thread::Builder::new()
        .name(thread_name)
        .spawn(move || runner.run())
}
