//! Lock-step round barrier between one controller and N workers.
//!
//! Every round is an all-arrive-then-all-release rendezvous: the
//! controller releases round k with a simulation time, each active
//! worker steps once and reports back via
//! [`loopfinished`](ThreadBarrier::loopfinished), and no worker may start
//! round k+1 until every worker has reported round k.
//!
//! ```text
//! Registering ──all initialized──► Ready ──release_round──► Running
//!                                                            │
//!        ┌──────────────── release_round ◄── RoundComplete
//!        ▼                                     (all finished)
//!     Running ...                 stop() from any state ──► Stopped
//! ```
//!
//! One `Mutex` guards the protocol state; two `Condvar`s wake workers
//! (release) and the controller (readiness and completion). The current
//! simulation time lives in an atomic so workers read it without taking
//! the lock.
//!
//! The first [`ProtocolViolation`] poisons the barrier: it is recorded,
//! logged, and returned from every blocked and subsequent call on both
//! sides. A misbehaving worker fails the run instead of hanging it.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use plume_core::{BarrierError, ProtocolViolation, RoundId, SimTime, WorkerId};

/// Phase of the barrier protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarrierState {
    /// Waiting for every expected worker to call `initialized`.
    Registering,
    /// All workers registered; the first round has not been released.
    Ready,
    /// A round is in flight; the controller waits for its completion in
    /// [`await_round`](ThreadBarrier::await_round).
    Running,
    /// Every participant finished the current round and no new round
    /// has been released yet.
    RoundComplete,
    /// No further rounds will be released.
    Stopped,
}

/// What a worker should do after a barrier call returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Release {
    /// Step for this round.
    Round(RoundId),
    /// Exit the worker loop.
    Stop,
}

/// Outcome of one completed round, returned by
/// [`await_round`](ThreadBarrier::await_round).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundSummary {
    /// The round that completed.
    pub round: RoundId,
    /// Simulation time the round was released with.
    pub time: SimTime,
    /// Workers that reported completion.
    pub finished: usize,
    /// Workers that retired during this round.
    pub retired: Vec<WorkerId>,
    /// Workers that will take part in the next round.
    pub active: usize,
}

#[derive(Debug, Default)]
struct Slot {
    registered: bool,
    finished: Option<RoundId>,
    retire_requested: bool,
    retired: bool,
}

struct Inner {
    state: BarrierState,
    round: RoundId,
    workers: IndexMap<WorkerId, Slot>,
    registered: usize,
    active: usize,
    participants: usize,
    finished: usize,
    retired_this_round: Vec<WorkerId>,
    violation: Option<ProtocolViolation>,
}

impl Inner {
    fn check_poison(&self) -> Result<(), BarrierError> {
        match &self.violation {
            Some(v) => Err(BarrierError::Protocol(v.clone())),
            None => Ok(()),
        }
    }
}

/// Reusable lock-step rendezvous for a fixed set of workers.
///
/// Worker ids are `WorkerId(0)..WorkerId(expected)`.
pub struct ThreadBarrier {
    expected: usize,
    inner: Mutex<Inner>,
    /// Workers wait here for the next release.
    release_cv: Condvar,
    /// The controller waits here for readiness and round completion.
    controller_cv: Condvar,
    time_ms: AtomicI64,
}

// Compile-time assertion: the barrier is shared across worker threads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<ThreadBarrier>();
};

impl ThreadBarrier {
    /// Create a barrier expecting `expected` workers.
    pub fn new(expected: usize) -> Self {
        let workers = (0..expected as u32)
            .map(|i| (WorkerId(i), Slot::default()))
            .collect();
        let state = if expected == 0 {
            BarrierState::Ready
        } else {
            BarrierState::Registering
        };
        Self {
            expected,
            inner: Mutex::new(Inner {
                state,
                round: RoundId(0),
                workers,
                registered: 0,
                active: 0,
                participants: 0,
                finished: 0,
                retired_this_round: Vec::new(),
                violation: None,
            }),
            release_cv: Condvar::new(),
            controller_cv: Condvar::new(),
            time_ms: AtomicI64::new(0),
        }
    }

    /// Number of workers this barrier was built for.
    pub fn expected(&self) -> usize {
        self.expected
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Protocol state is only mutated in short critical sections that
        // cannot panic midway, so a poisoned mutex still holds valid state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_release<'a>(&self, guard: MutexGuard<'a, Inner>) -> MutexGuard<'a, Inner> {
        self.release_cv
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_controller<'a>(&self, guard: MutexGuard<'a, Inner>) -> MutexGuard<'a, Inner> {
        self.controller_cv
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `violation`, wake everyone, and return it as an error.
    fn poison(&self, inner: &mut Inner, violation: ProtocolViolation) -> BarrierError {
        log::error!("barrier protocol violation: {violation}");
        let recorded = inner.violation.get_or_insert(violation).clone();
        self.release_cv.notify_all();
        self.controller_cv.notify_all();
        BarrierError::Protocol(recorded)
    }

    /// Block a worker until the round after `seen` is released.
    fn await_release(
        &self,
        mut inner: MutexGuard<'_, Inner>,
        seen: RoundId,
    ) -> Result<Release, BarrierError> {
        while inner.round == seen
            && inner.state != BarrierState::Stopped
            && inner.violation.is_none()
        {
            inner = self.wait_release(inner);
        }
        inner.check_poison()?;
        if inner.round != seen {
            Ok(Release::Round(inner.round))
        } else {
            Ok(Release::Stop)
        }
    }

    // ── Worker side ──────────────────────────────────────────────

    /// Register `worker` and block until the first round is released.
    ///
    /// Returns [`Release::Stop`] if the barrier is stopped before any
    /// round runs.
    pub fn initialized(&self, worker: WorkerId) -> Result<Release, BarrierError> {
        let mut inner = self.lock();
        inner.check_poison()?;
        if inner.state == BarrierState::Stopped {
            return Ok(Release::Stop);
        }
        let expected = self.expected;
        let state = inner.state;
        let violation = match inner.workers.get_mut(&worker) {
            None => Some(ProtocolViolation::UnknownWorker { worker, expected }),
            Some(_) if state != BarrierState::Registering => {
                Some(ProtocolViolation::LateRegistration { worker })
            }
            Some(slot) if slot.registered => {
                Some(ProtocolViolation::DuplicateRegistration { worker })
            }
            Some(slot) => {
                slot.registered = true;
                None
            }
        };
        if let Some(v) = violation {
            return Err(self.poison(&mut inner, v));
        }

        inner.registered += 1;
        inner.active += 1;
        log::debug!(
            "worker {worker} registered ({}/{expected})",
            inner.registered
        );
        if inner.registered == expected {
            inner.state = BarrierState::Ready;
            self.controller_cv.notify_all();
        }
        let seen = inner.round;
        self.await_release(inner, seen)
    }

    /// Simulation time of the current round. Never blocks.
    pub fn simulation_time(&self) -> SimTime {
        SimTime(self.time_ms.load(Ordering::Acquire))
    }

    /// Report `worker` finished with the current round and block until
    /// the next one is released.
    ///
    /// Returns [`Release::Stop`] when the barrier stops, or immediately
    /// when this worker asked to stop during the round.
    pub fn loopfinished(&self, worker: WorkerId) -> Result<Release, BarrierError> {
        let mut inner = self.lock();
        inner.check_poison()?;
        let round = inner.round;
        let state = inner.state;
        let expected = self.expected;

        let outcome = match inner.workers.get_mut(&worker) {
            None => Err(ProtocolViolation::UnknownWorker { worker, expected }),
            Some(slot) if slot.retired => Err(ProtocolViolation::Retired { worker }),
            Some(slot) if !slot.registered => Err(ProtocolViolation::OutOfRound { worker, round }),
            // A stop issued mid-round releases stragglers without counting them.
            Some(_) if state == BarrierState::Stopped => return Ok(Release::Stop),
            Some(slot) if state != BarrierState::Running || slot.finished == Some(round) => {
                Err(ProtocolViolation::OutOfRound { worker, round })
            }
            Some(slot) => {
                slot.finished = Some(round);
                if slot.retire_requested {
                    slot.retired = true;
                }
                Ok(slot.retired)
            }
        };
        let retiring = match outcome {
            Ok(retiring) => retiring,
            Err(v) => return Err(self.poison(&mut inner, v)),
        };

        inner.finished += 1;
        if retiring {
            inner.active -= 1;
            inner.retired_this_round.push(worker);
            log::info!("worker {worker} retired after round {round}");
        }
        if inner.finished == inner.participants {
            inner.state = BarrierState::RoundComplete;
            self.controller_cv.notify_all();
        }
        if retiring {
            return Ok(Release::Stop);
        }
        self.await_release(inner, round)
    }

    /// Ask to leave the barrier. Takes effect from the next round: this
    /// round's [`loopfinished`](Self::loopfinished) returns
    /// [`Release::Stop`] and the worker is no longer waited for.
    pub fn request_stop(&self, worker: WorkerId) -> Result<(), BarrierError> {
        let mut inner = self.lock();
        inner.check_poison()?;
        let expected = self.expected;
        let violation = match inner.workers.get_mut(&worker) {
            None => Some(ProtocolViolation::UnknownWorker { worker, expected }),
            Some(slot) if slot.retired => Some(ProtocolViolation::Retired { worker }),
            Some(slot) if !slot.registered => Some(ProtocolViolation::OutOfRound {
                worker,
                round: RoundId(0),
            }),
            Some(slot) => {
                slot.retire_requested = true;
                None
            }
        };
        match violation {
            Some(v) => Err(self.poison(&mut inner, v)),
            None => {
                log::debug!("worker {worker} requested stop in round {}", inner.round);
                Ok(())
            }
        }
    }

    // ── Controller side ──────────────────────────────────────────

    /// Block until every expected worker has registered.
    pub fn wait_ready(&self) -> Result<(), BarrierError> {
        let mut inner = self.lock();
        while inner.state == BarrierState::Registering && inner.violation.is_none() {
            inner = self.wait_controller(inner);
        }
        inner.check_poison()?;
        match inner.state {
            BarrierState::Stopped => Err(BarrierError::Stopped),
            _ => Ok(()),
        }
    }

    /// Publish `time` and release the next round to all active workers.
    ///
    /// Valid only when no round is in flight.
    pub fn release_round(&self, time: SimTime) -> Result<RoundId, BarrierError> {
        let mut inner = self.lock();
        inner.check_poison()?;
        match inner.state {
            BarrierState::Ready | BarrierState::RoundComplete => {}
            BarrierState::Stopped => return Err(BarrierError::Stopped),
            other => {
                let v = ProtocolViolation::ControllerMisuse {
                    reason: format!("release_round while {other:?}"),
                };
                return Err(self.poison(&mut inner, v));
            }
        }
        self.time_ms.store(time.0, Ordering::Release);
        inner.round = inner.round.next();
        inner.participants = inner.active;
        inner.finished = 0;
        inner.retired_this_round.clear();
        inner.state = if inner.participants == 0 {
            BarrierState::RoundComplete
        } else {
            BarrierState::Running
        };
        log::trace!("released round {} at {time}", inner.round);
        self.release_cv.notify_all();
        Ok(inner.round)
    }

    /// Block until every participant of the current round has finished.
    pub fn await_round(&self) -> Result<RoundSummary, BarrierError> {
        let mut inner = self.lock();
        inner.check_poison()?;
        if matches!(inner.state, BarrierState::Registering | BarrierState::Ready) {
            let v = ProtocolViolation::ControllerMisuse {
                reason: "await_round before any round was released".into(),
            };
            return Err(self.poison(&mut inner, v));
        }
        while inner.state == BarrierState::Running && inner.violation.is_none() {
            inner = self.wait_controller(inner);
        }
        inner.check_poison()?;
        if inner.state == BarrierState::Stopped {
            return Err(BarrierError::Stopped);
        }
        Ok(RoundSummary {
            round: inner.round,
            time: self.simulation_time(),
            finished: inner.finished,
            retired: std::mem::take(&mut inner.retired_this_round),
            active: inner.active,
        })
    }

    /// Stop the barrier. Every blocked worker returns [`Release::Stop`].
    /// Idempotent.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.state != BarrierState::Stopped {
            log::debug!("barrier stopped after round {}", inner.round);
            inner.state = BarrierState::Stopped;
        }
        self.release_cv.notify_all();
        self.controller_cv.notify_all();
    }

    /// Current protocol phase.
    pub fn state(&self) -> BarrierState {
        self.lock().state
    }

    /// Most recently released round (`RoundId(0)` before the first).
    pub fn round(&self) -> RoundId {
        self.lock().round
    }

    /// Registered workers that have not retired.
    pub fn active_workers(&self) -> usize {
        self.lock().active
    }

    /// The recorded protocol violation, if any.
    pub fn violation(&self) -> Option<ProtocolViolation> {
        self.lock().violation.clone()
    }
}

impl std::fmt::Debug for ThreadBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ThreadBarrier")
            .field("expected", &self.expected)
            .field("state", &inner.state)
            .field("round", &inner.round)
            .field("active", &inner.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// Spawn `n` workers that each run `rounds` rounds (or until stopped),
    /// bumping `counter` once per round.
    fn spawn_counting(
        barrier: &Arc<ThreadBarrier>,
        n: u32,
        counter: &Arc<AtomicU64>,
    ) -> Vec<thread::JoinHandle<Result<u64, BarrierError>>> {
        (0..n)
            .map(|i| {
                let barrier = Arc::clone(barrier);
                let counter = Arc::clone(counter);
                thread::spawn(move || {
                    let id = WorkerId(i);
                    let mut steps = 0;
                    let mut release = barrier.initialized(id)?;
                    while let Release::Round(_) = release {
                        counter.fetch_add(1, Ordering::Relaxed);
                        steps += 1;
                        release = barrier.loopfinished(id)?;
                    }
                    Ok(steps)
                })
            })
            .collect()
    }

    #[test]
    fn zero_workers_start_ready() {
        let b = ThreadBarrier::new(0);
        assert_eq!(b.state(), BarrierState::Ready);
        b.wait_ready().unwrap();
        b.release_round(SimTime(5)).unwrap();
        let summary = b.await_round().unwrap();
        assert_eq!(summary.finished, 0);
        assert_eq!(summary.active, 0);
    }

    #[test]
    fn rounds_complete_in_lock_step() {
        let b = Arc::new(ThreadBarrier::new(3));
        let counter = Arc::new(AtomicU64::new(0));
        let handles = spawn_counting(&b, 3, &counter);
        b.wait_ready().unwrap();
        assert_eq!(b.state(), BarrierState::Ready);

        for k in 1..=5u64 {
            let round = b.release_round(SimTime(k as i64 * 10)).unwrap();
            assert_eq!(round, RoundId(k));
            let summary = b.await_round().unwrap();
            assert_eq!(summary.round, RoundId(k));
            assert_eq!(summary.time, SimTime(k as i64 * 10));
            assert_eq!(summary.finished, 3);
            // All steps of round k are done before the controller resumes.
            assert_eq!(counter.load(Ordering::Relaxed), 3 * k);
            assert_eq!(b.state(), BarrierState::RoundComplete);
        }
        b.stop();
        for h in handles {
            assert_eq!(h.join().unwrap(), Ok(5));
        }
        assert_eq!(b.state(), BarrierState::Stopped);
    }

    #[test]
    fn state_is_running_until_the_last_worker_finishes() {
        let b = Arc::new(ThreadBarrier::new(1));
        let (go_tx, go_rx) = crossbeam_channel::bounded::<()>(0);
        let worker = {
            let b = Arc::clone(&b);
            thread::spawn(move || {
                assert_eq!(b.initialized(WorkerId(0)), Ok(Release::Round(RoundId(1))));
                go_rx.recv().unwrap();
                b.loopfinished(WorkerId(0))
            })
        };
        b.wait_ready().unwrap();
        b.release_round(SimTime(0)).unwrap();
        assert_eq!(b.state(), BarrierState::Running);
        go_tx.send(()).unwrap();
        b.await_round().unwrap();
        assert_eq!(b.state(), BarrierState::RoundComplete);
        b.stop();
        assert_eq!(worker.join().unwrap(), Ok(Release::Stop));
    }

    #[test]
    fn stop_before_first_round_releases_registrants() {
        let b = Arc::new(ThreadBarrier::new(2));
        let counter = Arc::new(AtomicU64::new(0));
        let handles = spawn_counting(&b, 2, &counter);
        b.wait_ready().unwrap();
        b.stop();
        for h in handles {
            assert_eq!(h.join().unwrap(), Ok(0));
        }
        assert_eq!(b.release_round(SimTime(0)), Err(BarrierError::Stopped));
    }

    #[test]
    fn stop_unblocks_partial_registration() {
        let b = Arc::new(ThreadBarrier::new(2));
        let counter = Arc::new(AtomicU64::new(0));
        let handles = spawn_counting(&b, 1, &counter);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(b.state(), BarrierState::Registering);
        b.stop();
        assert_eq!(b.wait_ready(), Err(BarrierError::Stopped));
        for h in handles {
            assert_eq!(h.join().unwrap(), Ok(0));
        }
    }

    #[test]
    fn request_stop_takes_effect_next_round() {
        let b = Arc::new(ThreadBarrier::new(2));
        let stays = {
            let b = Arc::clone(&b);
            thread::spawn(move || {
                let mut rounds = 0;
                let mut r = b.initialized(WorkerId(0))?;
                while let Release::Round(_) = r {
                    rounds += 1;
                    r = b.loopfinished(WorkerId(0))?;
                }
                Ok::<_, BarrierError>(rounds)
            })
        };
        let leaves = {
            let b = Arc::clone(&b);
            thread::spawn(move || {
                let mut rounds = 0;
                let mut r = b.initialized(WorkerId(1))?;
                while let Release::Round(round) = r {
                    rounds += 1;
                    if round == RoundId(2) {
                        b.request_stop(WorkerId(1))?;
                    }
                    r = b.loopfinished(WorkerId(1))?;
                }
                Ok::<_, BarrierError>(rounds)
            })
        };
        b.wait_ready().unwrap();

        b.release_round(SimTime(0)).unwrap();
        assert_eq!(b.await_round().unwrap().active, 2);
        b.release_round(SimTime(1)).unwrap();
        let s = b.await_round().unwrap();
        // The leaving worker still completed round 2.
        assert_eq!(s.finished, 2);
        assert_eq!(s.retired, vec![WorkerId(1)]);
        assert_eq!(s.active, 1);
        assert_eq!(leaves.join().unwrap(), Ok(2));

        b.release_round(SimTime(2)).unwrap();
        let s = b.await_round().unwrap();
        assert_eq!(s.finished, 1);
        assert!(s.retired.is_empty());
        b.stop();
        assert_eq!(stays.join().unwrap(), Ok(3));
    }

    #[test]
    fn unknown_worker_poisons_everyone() {
        let b = Arc::new(ThreadBarrier::new(1));
        let err = b.initialized(WorkerId(7)).unwrap_err();
        assert_eq!(
            err,
            BarrierError::Protocol(ProtocolViolation::UnknownWorker {
                worker: WorkerId(7),
                expected: 1
            })
        );
        // The controller sees the same violation instead of hanging.
        assert_eq!(b.wait_ready(), Err(err.clone()));
        assert_eq!(b.initialized(WorkerId(0)), Err(err));
    }

    #[test]
    fn duplicate_registration_wakes_blocked_first_call() {
        let b = Arc::new(ThreadBarrier::new(2));
        let first = {
            let b = Arc::clone(&b);
            thread::spawn(move || b.initialized(WorkerId(0)))
        };
        thread::sleep(Duration::from_millis(20));
        let err = b.initialized(WorkerId(0)).unwrap_err();
        assert_eq!(
            err,
            BarrierError::Protocol(ProtocolViolation::DuplicateRegistration {
                worker: WorkerId(0)
            })
        );
        assert_eq!(first.join().unwrap(), Err(err));
    }

    #[test]
    fn registration_after_ready_is_late() {
        let b = Arc::new(ThreadBarrier::new(1));
        let w = {
            let b = Arc::clone(&b);
            thread::spawn(move || b.initialized(WorkerId(0)))
        };
        b.wait_ready().unwrap();
        let err = b.initialized(WorkerId(0)).unwrap_err();
        assert_eq!(
            err,
            BarrierError::Protocol(ProtocolViolation::LateRegistration {
                worker: WorkerId(0)
            })
        );
        // The registered worker is released with the violation.
        assert_eq!(w.join().unwrap(), Err(err));
    }

    #[test]
    fn double_loopfinished_is_out_of_round() {
        let b = Arc::new(ThreadBarrier::new(2));
        let w0 = {
            let b = Arc::clone(&b);
            thread::spawn(move || -> Result<(), BarrierError> {
                b.initialized(WorkerId(0))?;
                // Finishing twice in one round: the second call is detected
                // only after the first returns, so call from a helper thread.
                let b2 = Arc::clone(&b);
                let first = thread::spawn(move || b2.loopfinished(WorkerId(0)));
                thread::sleep(Duration::from_millis(20));
                let second = b.loopfinished(WorkerId(0));
                assert!(matches!(
                    second,
                    Err(BarrierError::Protocol(ProtocolViolation::OutOfRound { .. }))
                ));
                assert!(first.join().unwrap().is_err());
                Ok(())
            })
        };
        let w1 = {
            let b = Arc::clone(&b);
            thread::spawn(move || {
                b.initialized(WorkerId(1))?;
                // Stay in the round until worker 0 has misbehaved.
                thread::sleep(Duration::from_millis(100));
                b.loopfinished(WorkerId(1))
            })
        };
        b.wait_ready().unwrap();
        b.release_round(SimTime(0)).unwrap();
        assert!(matches!(b.await_round(), Err(BarrierError::Protocol(_))));
        w0.join().unwrap().unwrap();
        assert!(w1.join().unwrap().is_err());
        assert!(b.violation().is_some());
    }

    #[test]
    fn loopfinished_before_release_is_out_of_round() {
        let b = ThreadBarrier::new(1);
        assert_eq!(
            b.loopfinished(WorkerId(0)),
            Err(BarrierError::Protocol(ProtocolViolation::OutOfRound {
                worker: WorkerId(0),
                round: RoundId(0)
            }))
        );
    }

    #[test]
    fn retired_worker_cannot_call_again() {
        let b = Arc::new(ThreadBarrier::new(1));
        let w = {
            let b = Arc::clone(&b);
            thread::spawn(move || -> Result<Release, BarrierError> {
                b.initialized(WorkerId(0))?;
                b.request_stop(WorkerId(0))?;
                assert_eq!(b.loopfinished(WorkerId(0))?, Release::Stop);
                b.loopfinished(WorkerId(0))
            })
        };
        b.wait_ready().unwrap();
        b.release_round(SimTime(0)).unwrap();
        let result = w.join().unwrap();
        assert_eq!(
            result,
            Err(BarrierError::Protocol(ProtocolViolation::Retired {
                worker: WorkerId(0)
            }))
        );
    }

    #[test]
    fn release_during_round_is_controller_misuse() {
        let b = Arc::new(ThreadBarrier::new(1));
        let w = {
            let b = Arc::clone(&b);
            thread::spawn(move || {
                let r = b.initialized(WorkerId(0));
                // Hold the round open until the controller misbehaves.
                thread::sleep(Duration::from_millis(50));
                (r, b.loopfinished(WorkerId(0)))
            })
        };
        b.wait_ready().unwrap();
        b.release_round(SimTime(0)).unwrap();
        assert!(matches!(
            b.release_round(SimTime(1)),
            Err(BarrierError::Protocol(ProtocolViolation::ControllerMisuse { .. }))
        ));
        let (first, finished) = w.join().unwrap();
        assert_eq!(first, Ok(Release::Round(RoundId(1))));
        assert!(finished.is_err());
    }

    #[test]
    fn await_before_release_is_misuse() {
        let b = ThreadBarrier::new(0);
        assert!(matches!(
            b.await_round(),
            Err(BarrierError::Protocol(ProtocolViolation::ControllerMisuse { .. }))
        ));
    }

    #[test]
    fn workers_see_released_time() {
        let b = Arc::new(ThreadBarrier::new(1));
        let w = {
            let b = Arc::clone(&b);
            thread::spawn(move || -> Result<Vec<SimTime>, BarrierError> {
                let mut seen = Vec::new();
                let mut r = b.initialized(WorkerId(0))?;
                while let Release::Round(_) = r {
                    seen.push(b.simulation_time());
                    r = b.loopfinished(WorkerId(0))?;
                }
                Ok(seen)
            })
        };
        b.wait_ready().unwrap();
        for t in [100, 200, 300] {
            b.release_round(SimTime(t)).unwrap();
            b.await_round().unwrap();
        }
        b.stop();
        assert_eq!(
            w.join().unwrap().unwrap(),
            vec![SimTime(100), SimTime(200), SimTime(300)]
        );
    }
}
