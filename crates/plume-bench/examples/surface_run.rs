//! End-to-end surface and pipe measurement example.
//!
//! Demonstrates: build raster and monitored pipes → feed particle updates
//! from a transport thread → run movement and time-spot measurement
//! workers under the controller → read counts back between rounds.

use std::sync::Arc;
use std::thread;

use plume_bench::{grid_particles, reference_axis, reference_raster};
use plume_core::{SimTime, WorkerError};
use plume_engine::{
    CadenceMode, Controller, EntityKind, FnCallback, Location, MeasurementWorker,
    MonitoredEntity, ParticleMovementWorker, ParticleUpdate, RunConfig, StepContext,
};
use plume_raster::{MeasurementRaster, SyncPolicy};

fn main() {
    println!("=== Plume Surface Run Example ===\n");

    let raster = Arc::new(reference_raster(SyncPolicy::Atomic).unwrap());
    let pipes: Vec<Arc<MonitoredEntity>> = (0..3)
        .map(|i| {
            let pipe = MonitoredEntity::new(format!("pipe-{i}"), EntityKind::Pipe, reference_axis());
            pipe.set_volume(0.25 * (i + 1) as f64);
            Arc::new(pipe)
        })
        .collect();

    // Transport: 20K particles, every fifth one inside a pipe.
    let (tx, rx) = crossbeam_channel::bounded::<ParticleUpdate>(4096);
    let producer = thread::spawn(move || {
        let mut particles = grid_particles(42, 100);
        for i in 0..20_000usize {
            let location = if i % 5 == 0 {
                Location::Entity(i % 3)
            } else {
                Location::Surface
            };
            let update = ParticleUpdate {
                particle: particles.next_particle(),
                location,
            };
            if tx.send(update).is_err() {
                break;
            }
        }
    });

    let config = RunConfig {
        start_ms: 0,
        end_ms: 600_000,
        dt_ms: 1000,
        checkpoint_every: 120,
        round_warn_ms: 50,
    };
    let mut controller = Controller::new(config);

    let movement: Arc<dyn MeasurementRaster> = raster.clone();
    controller.add_worker(Box::new(ParticleMovementWorker::new(
        "movement",
        rx,
        movement,
        pipes.clone(),
    )));
    controller.add_worker(Box::new(
        MeasurementWorker::new("measurement")
            .with_cadence(CadenceMode::TimeSpot, reference_axis())
            .with_entities(pipes.clone())
            .with_callback(Box::new(FnCallback::new(
                "minute-marker",
                |ctx: &StepContext| -> Result<(), WorkerError> {
                    if ctx.time.0 % 60_000 == 0 {
                        log::debug!("minute {} reached", ctx.time.0 / 60_000);
                    }
                    Ok(())
                },
            ))),
    ));

    let r = raster.clone();
    controller.on_checkpoint(move |summary| {
        println!(
            "  round {:>4} at {:>8}: {:>6} surface particles, peak cell {:>4}",
            summary.round,
            summary.time,
            r.total_particles(),
            r.max_particle_count(),
        );
    });

    let report = controller.run().unwrap();
    producer.join().unwrap();

    println!(
        "\nRun: {} rounds, final time {}, mean round {:.1}μs, {} faults",
        report.rounds,
        report.final_time.unwrap_or(SimTime::ZERO),
        report.metrics.mean_round_us(),
        report.fault_count(),
    );
    println!(
        "Raster: {} particles in {} allocated cells",
        raster.total_particles(),
        raster.allocated_cells()
    );
    for pipe in &pipes {
        let tl = pipe.timeline();
        let sampled: Vec<u64> = (0..tl.len()).map(|i| tl.count_at(i)).filter(|&n| n > 0).collect();
        println!(
            "  {}: {} particles over {} samples, mean volume {:?}",
            pipe.name(),
            tl.total_count(),
            sampled.len(),
            (0..tl.len()).find_map(|i| tl.mean_volume_at(i)),
        );
    }

    println!("\n=== Done ===");
}
