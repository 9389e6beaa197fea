//! Particle-movement worker: routes particle updates into the raster or
//! entity timelines.
//!
//! The particle transport itself is external. It pushes one
//! [`ParticleUpdate`] per moved particle onto a crossbeam channel; each
//! round this worker drains everything queued so far and counts it at
//! the round's simulation time.

use std::sync::Arc;

use crossbeam_channel::{Receiver, TryRecvError};

use plume_core::{ParticleRecord, WorkerError};
use plume_raster::MeasurementRaster;

use crate::timeline::MonitoredEntity;
use crate::worker::{StepContext, Worker};

/// Where a particle currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    /// On the overland surface: counted by the raster.
    Surface,
    /// Inside the monitored entity at this index: counted by its timeline.
    Entity(usize),
}

/// One moved particle.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleUpdate {
    /// The particle after moving.
    pub particle: ParticleRecord,
    /// Where it ended up.
    pub location: Location,
}

/// Running totals of a [`ParticleMovementWorker`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MovementStats {
    /// Updates drained from the channel.
    pub received: u64,
    /// Updates counted by the raster.
    pub surface_counted: u64,
    /// Updates counted by an entity timeline.
    pub entity_counted: u64,
    /// Updates dropped (outside raster, inactive timeline, unknown entity).
    pub dropped: u64,
}

/// Drains particle updates each round into shared measurement stores.
pub struct ParticleMovementWorker {
    name: String,
    updates: Receiver<ParticleUpdate>,
    raster: Arc<dyn MeasurementRaster>,
    entities: Vec<Arc<MonitoredEntity>>,
    stats: MovementStats,
    disconnected: bool,
}

impl ParticleMovementWorker {
    /// A worker reading `updates` into `raster` and `entities`.
    pub fn new(
        name: impl Into<String>,
        updates: Receiver<ParticleUpdate>,
        raster: Arc<dyn MeasurementRaster>,
        entities: Vec<Arc<MonitoredEntity>>,
    ) -> Self {
        Self {
            name: name.into(),
            updates,
            raster,
            entities,
            stats: MovementStats::default(),
            disconnected: false,
        }
    }

    /// Totals so far.
    pub fn stats(&self) -> MovementStats {
        self.stats
    }

    fn route(&mut self, ctx: &StepContext, update: ParticleUpdate) {
        self.stats.received += 1;
        let counted = match update.location {
            Location::Surface => {
                let ok = self.raster.measure_particle(ctx.time, &update.particle);
                self.stats.surface_counted += ok as u64;
                ok
            }
            Location::Entity(i) => {
                let ok = self
                    .entities
                    .get(i)
                    .is_some_and(|e| e.timeline().observe());
                self.stats.entity_counted += ok as u64;
                ok
            }
        };
        if !counted {
            self.stats.dropped += 1;
            log::trace!(
                "{}: dropped particle {} at {:?}",
                self.name,
                update.particle.id,
                update.location
            );
        }
    }
}

impl Worker for ParticleMovementWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, ctx: &StepContext) -> Result<(), WorkerError> {
        loop {
            match self.updates.try_recv() {
                Ok(update) => self.route(ctx, update),
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    // Report the closed feed once, then keep stepping idle.
                    if self.disconnected {
                        return Ok(());
                    }
                    self.disconnected = true;
                    return Err(WorkerError::ChannelClosed {
                        channel: format!("{} particle updates", self.name),
                    });
                }
            }
        }
    }
}

impl std::fmt::Debug for ParticleMovementWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleMovementWorker")
            .field("name", &self.name)
            .field("entities", &self.entities.len())
            .field("stats", &self.stats)
            .finish()
    }
}
