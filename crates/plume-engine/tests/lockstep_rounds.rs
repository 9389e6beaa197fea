//! End-to-end lock-step behaviour of the controller and barrier.
//!
//! Every test drives real runner threads through [`Controller::run`] and
//! checks the round contract from the outside:
//!
//! - each worker steps exactly once per released round,
//! - no worker starts round `r + 1` before all workers finished round `r`,
//! - failing or panicking steps never stall the run,
//! - a cancelled worker leaves at the next round boundary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use plume_core::{MaterialId, RoundId, SimTime, TimeAxis, WorkerError};
use plume_engine::{Controller, FnWorker, RunConfig, RunReport, StepContext};
use plume_raster::{MeasurementRaster, SyncPolicy};
use plume_test_utils::{
    unit_grid, BrokenHooksWorker, CountingWorker, FailingWorker, PanickingWorker,
    RecordingWorker, SleepyWorker,
};

fn run_config(rounds: i64, dt_ms: i64) -> RunConfig {
    RunConfig {
        start_ms: 0,
        end_ms: (rounds - 1) * dt_ms,
        dt_ms,
        checkpoint_every: 0,
        round_warn_ms: 0,
    }
}

/// Build and run a controller on its own thread, failing instead of
/// hanging if the run does not finish in time.
fn run_within(
    limit: Duration,
    build: impl FnOnce() -> Controller + Send + 'static,
) -> RunReport {
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let _ = tx.send(build().run());
    });
    rx.recv_timeout(limit)
        .expect("run did not finish")
        .unwrap()
}

fn exactly_once(workers: usize, rounds: i64) {
    let counter = Arc::new(AtomicU64::new(0));
    let mut controller = Controller::new(run_config(rounds, 1));
    for i in 0..workers {
        controller.add_worker(Box::new(CountingWorker::new(
            format!("count-{i}"),
            Arc::clone(&counter),
        )));
    }
    let report = controller.run().unwrap();
    assert_eq!(report.rounds, rounds as u64);
    assert_eq!(
        counter.load(Ordering::Relaxed),
        workers as u64 * rounds as u64
    );
    assert!(report.all_joined());
    assert!(report
        .workers
        .iter()
        .all(|w| w.rounds == rounds as u64 && w.barrier_error.is_none()));
}

#[test]
fn single_worker_thousand_rounds() {
    exactly_once(1, 1000);
}

#[test]
fn two_workers_thousand_rounds() {
    exactly_once(2, 1000);
}

#[test]
fn eight_workers_thousand_rounds() {
    exactly_once(8, 1000);
}

#[test]
fn rounds_never_overlap() {
    const WORKERS: usize = 6;
    const ROUNDS: i64 = 300;
    let finished: Arc<Vec<AtomicU64>> =
        Arc::new((0..=ROUNDS as usize + 1).map(|_| AtomicU64::new(0)).collect());
    let overlaps = Arc::new(AtomicU64::new(0));

    let mut controller = Controller::new(run_config(ROUNDS, 10));
    for i in 0..WORKERS {
        let finished = Arc::clone(&finished);
        let overlaps = Arc::clone(&overlaps);
        controller.add_worker(Box::new(FnWorker::new(
            format!("iso-{i}"),
            move |ctx: &StepContext| {
                let r = ctx.round.0 as usize;
                if r > 1 && finished[r - 1].load(Ordering::Acquire) != WORKERS as u64 {
                    overlaps.fetch_add(1, Ordering::Relaxed);
                }
                finished[r].fetch_add(1, Ordering::AcqRel);
                Ok(())
            },
        )));
    }
    let report = controller.run().unwrap();
    assert_eq!(report.rounds, ROUNDS as u64);
    assert_eq!(overlaps.load(Ordering::Relaxed), 0);
    for r in 1..=ROUNDS as usize {
        assert_eq!(finished[r].load(Ordering::Relaxed), WORKERS as u64, "round {r}");
    }
}

#[test]
fn every_worker_sees_the_same_time_per_round() {
    let mut controller = Controller::new(run_config(50, 250));
    let mut logs = Vec::new();
    for i in 0..4 {
        let (worker, log) = RecordingWorker::new(format!("rec-{i}"));
        controller.add_worker(Box::new(worker));
        logs.push(log);
    }
    controller.run().unwrap();

    let expected: Vec<(RoundId, SimTime)> = (0..50)
        .map(|i| (RoundId(i as u64 + 1), SimTime(i * 250)))
        .collect();
    for log in logs {
        assert_eq!(*log.lock().unwrap(), expected);
    }
}

#[test]
fn failing_worker_does_not_stall_the_run() {
    let counter = Arc::new(AtomicU64::new(0));
    let mut controller = Controller::new(run_config(30, 10));
    controller.add_worker(Box::new(CountingWorker::new("ok", Arc::clone(&counter))));
    controller.add_worker(Box::new(FailingWorker::new("flaky", 3)));

    let report = controller.run().unwrap();
    assert_eq!(report.rounds, 30);
    assert_eq!(counter.load(Ordering::Relaxed), 30);
    assert_eq!(report.fault_count(), 10);
    assert!(report
        .faults
        .iter()
        .all(|f| f.name == "flaky" && f.round.0 % 3 == 0));
    let flaky = report.workers.iter().find(|w| w.faults > 0).unwrap();
    assert_eq!(flaky.rounds, 30);
    assert_eq!(flaky.faults, 10);
}

#[test]
fn panicking_worker_completes_its_round() {
    let counter = Arc::new(AtomicU64::new(0));
    let mut controller = Controller::new(run_config(20, 10));
    controller.add_worker(Box::new(CountingWorker::new("ok", Arc::clone(&counter))));
    controller.add_worker(Box::new(PanickingWorker::new("boom", RoundId(5))));

    let report = controller.run().unwrap();
    assert_eq!(report.rounds, 20);
    assert_eq!(counter.load(Ordering::Relaxed), 20);
    assert!(report.all_joined());
    assert_eq!(report.fault_count(), 1);
    let fault = &report.faults[0];
    assert_eq!(fault.round, RoundId(5));
    assert!(matches!(fault.error, WorkerError::Panicked { .. }));
}

#[test]
fn panicking_on_start_retires_without_stalling() {
    let counter = Arc::new(AtomicU64::new(0));
    let broken = BrokenHooksWorker::new("broken-setup", true, false);
    let broken_steps = Arc::clone(&broken.steps);
    let c = Arc::clone(&counter);
    let report = run_within(Duration::from_secs(10), move || {
        let mut controller = Controller::new(run_config(15, 10));
        controller.add_worker(Box::new(CountingWorker::new("ok", c)));
        controller.add_worker(Box::new(broken));
        controller
    });

    assert_eq!(report.rounds, 15);
    assert_eq!(counter.load(Ordering::Relaxed), 15);
    assert_eq!(broken_steps.load(Ordering::Relaxed), 0);
    assert!(report.all_joined());
    assert_eq!(report.fault_count(), 1);
    let fault = &report.faults[0];
    assert_eq!(fault.name, "broken-setup");
    assert_eq!(fault.round, RoundId(0));
    assert_eq!(
        fault.error,
        WorkerError::Panicked {
            message: "setup failed".into()
        }
    );
    let exit = report.workers.iter().find(|w| w.faults == 1).unwrap();
    assert_eq!(exit.rounds, 0);
    assert!(!exit.cancelled);
    assert!(exit.barrier_error.is_none());
}

#[test]
fn panicking_on_stop_is_reported() {
    let broken = BrokenHooksWorker::new("broken-teardown", false, true);
    let steps = Arc::clone(&broken.steps);
    let report = run_within(Duration::from_secs(10), move || {
        let mut controller = Controller::new(run_config(5, 10));
        controller.add_worker(Box::new(broken));
        controller
    });

    assert_eq!(report.rounds, 5);
    assert_eq!(steps.load(Ordering::Relaxed), 5);
    assert!(report.all_joined());
    assert_eq!(report.fault_count(), 1);
    assert_eq!(report.faults[0].round, RoundId(5));
    assert!(matches!(
        report.faults[0].error,
        WorkerError::Panicked { ref message } if message == "teardown failed"
    ));
}

#[test]
fn cancelled_worker_leaves_at_next_boundary() {
    let counter = Arc::new(AtomicU64::new(0));
    let mut controller = Controller::new(RunConfig {
        checkpoint_every: 1,
        ..run_config(40, 10)
    });
    controller.add_worker(Box::new(CountingWorker::new("stays", Arc::clone(&counter))));
    let (_, token) = controller.add_worker(Box::new(SleepyWorker::new(
        "leaves",
        Duration::from_micros(50),
    )));
    controller.on_checkpoint(move |summary| {
        if summary.round == RoundId(10) {
            token.cancel();
        }
    });

    let report = controller.run().unwrap();
    assert_eq!(report.rounds, 40);
    assert_eq!(counter.load(Ordering::Relaxed), 40);
    let leaver = report.workers.iter().find(|w| w.cancelled).unwrap();
    // Stepped rounds 1..=10; round 11 was its exit round.
    assert_eq!(leaver.rounds, 10);
    assert_eq!(report.metrics.last.as_ref().map(|m| m.finished), Some(1));
}

#[test]
fn workers_measure_into_shared_raster() {
    let times = TimeAxis::uniform(0, 1000, 1).unwrap();
    let raster = Arc::new(unit_grid(2, times, SyncPolicy::Locked));
    let mut controller = Controller::new(run_config(10, 10));
    for id in 0..4u32 {
        let raster = Arc::clone(&raster);
        controller.add_worker(Box::new(FnWorker::new(
            format!("measure-{id}"),
            move |ctx: &StepContext| {
                let (ix, iy) = (id / 2, id % 2);
                let position = [ix as f64 + 0.5, iy as f64 + 0.5, 0.0];
                if raster.measure(ctx.time, &position, MaterialId(0), 1.0) {
                    Ok(())
                } else {
                    Err(WorkerError::StepFailed {
                        reason: "measurement dropped".into(),
                    })
                }
            },
        )));
    }
    let report = controller.run().unwrap();
    assert_eq!(report.fault_count(), 0);
    for cell in 0..4 {
        assert_eq!(raster.particles_counted(cell, 0, MaterialId(0)), 10);
        assert_eq!(raster.mass(cell, 0, MaterialId(0)), 10.0);
    }
    assert_eq!(raster.max_particle_count(), 10);
    assert_eq!(raster.allocated_cells(), 4);
}

#[test]
fn checkpoint_sees_quiescent_counts() {
    let counter = Arc::new(AtomicU64::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut controller = Controller::new(RunConfig {
        checkpoint_every: 5,
        ..run_config(25, 10)
    });
    for i in 0..3 {
        controller.add_worker(Box::new(CountingWorker::new(
            format!("w{i}"),
            Arc::clone(&counter),
        )));
    }
    let c = Arc::clone(&counter);
    let s = Arc::clone(&seen);
    controller.on_checkpoint(move |summary| {
        s.lock()
            .unwrap()
            .push((summary.round.0, c.load(Ordering::Relaxed)));
    });
    controller.run().unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(5, 15), (10, 30), (15, 45), (20, 60), (25, 75)]
    );
}
