//! The per-round worker contract.
//!
//! A [`Worker`] advances one sub-domain by exactly one simulation step
//! per round. It never touches the barrier itself: the runner in
//! [`crate::runner`] owns the registration, cancellation and
//! completion protocol, and calls [`Worker::step`] in between.

use plume_core::{RoundId, SimTime, WorkerError};

/// Read-only view of the round a worker is stepping.
///
/// Every worker in the same round receives an identical context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepContext {
    /// The round being executed.
    pub round: RoundId,
    /// Simulation time snapshot taken at the start of the step.
    pub time: SimTime,
    /// Round length in milliseconds.
    pub dt_ms: i64,
}

/// One independently scheduled unit of per-round work.
///
/// Implementations must return from [`step`](Self::step) in bounded
/// time: the round cannot complete until every worker has stepped.
pub trait Worker: Send {
    /// Name used for the worker thread and in log messages.
    fn name(&self) -> &str;

    /// Advance by one step.
    ///
    /// Errors are logged and reported to the controller; the round still
    /// completes for this worker.
    fn step(&mut self, ctx: &StepContext) -> Result<(), WorkerError>;

    /// Called once on the worker thread before registering with the barrier.
    ///
    /// A panic here is reported as a fault; the worker still registers
    /// and then retires at the first round without stepping.
    fn on_start(&mut self) {}

    /// Called once on the worker thread after leaving the barrier.
    /// A panic here is reported as a fault.
    fn on_stop(&mut self) {}
}

impl<W: Worker + ?Sized> Worker for Box<W> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn step(&mut self, ctx: &StepContext) -> Result<(), WorkerError> {
        (**self).step(ctx)
    }

    fn on_start(&mut self) {
        (**self).on_start()
    }

    fn on_stop(&mut self) {
        (**self).on_stop()
    }
}

/// Hook invoked after a worker's own per-round work.
///
/// Each callback runs in isolation: a failure is logged and reported but
/// does not prevent later callbacks from running.
pub trait RoundCallback: Send {
    /// Name used in log messages and [`WorkerError::CallbackFailed`].
    fn name(&self) -> &str;

    /// Run for the round described by `ctx`.
    fn on_round(&mut self, ctx: &StepContext) -> Result<(), WorkerError>;
}

/// A named closure as a [`RoundCallback`].
pub struct FnCallback<F> {
    name: String,
    f: F,
}

impl<F> FnCallback<F>
where
    F: FnMut(&StepContext) -> Result<(), WorkerError> + Send,
{
    /// Wrap `f` under `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> RoundCallback for FnCallback<F>
where
    F: FnMut(&StepContext) -> Result<(), WorkerError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_round(&mut self, ctx: &StepContext) -> Result<(), WorkerError> {
        (self.f)(ctx)
    }
}

/// Run every callback for `ctx`, isolating failures.
///
/// Returns the first failure (as [`WorkerError::CallbackFailed`]) after
/// all callbacks have run.
pub(crate) fn run_callbacks(
    owner: &str,
    callbacks: &mut [Box<dyn RoundCallback>],
    ctx: &StepContext,
) -> Result<(), WorkerError> {
    let mut first_error = None;
    for cb in callbacks.iter_mut() {
        if let Err(e) = cb.on_round(ctx) {
            log::warn!("{owner}: callback '{}' failed in round {}: {e}", cb.name(), ctx.round);
            first_error.get_or_insert(WorkerError::CallbackFailed {
                name: cb.name().to_string(),
                reason: e.to_string(),
            });
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Closure adapter for ad-hoc per-round work.
pub struct FnWorker<F> {
    name: String,
    f: F,
}

impl<F> FnWorker<F>
where
    F: FnMut(&StepContext) -> Result<(), WorkerError> + Send,
{
    /// Wrap `f` as a worker named `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Worker for FnWorker<F>
where
    F: FnMut(&StepContext) -> Result<(), WorkerError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, ctx: &StepContext) -> Result<(), WorkerError> {
        (self.f)(ctx)
    }
}
