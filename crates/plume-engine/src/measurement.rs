//! The measurement worker: runs a cadence over monitored entities, then
//! the attached round callbacks.

use std::sync::Arc;

use plume_core::{TimeAxis, WorkerError};

use crate::cadence::{CadenceEvent, CadenceMode, MeasurementCadence};
use crate::timeline::MonitoredEntity;
use crate::worker::{run_callbacks, RoundCallback, StepContext, Worker};

/// Per-round measurement synchronization for a set of entities.
///
/// Without a cadence (no measurement configuration) the worker still
/// takes part in every round but aggregates nothing.
pub struct MeasurementWorker {
    name: String,
    entities: Vec<Arc<MonitoredEntity>>,
    cadence: Option<MeasurementCadence>,
    callbacks: Vec<Box<dyn RoundCallback>>,
    last_event: CadenceEvent,
}

impl MeasurementWorker {
    /// A worker with no entities, no cadence and no callbacks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: Vec::new(),
            cadence: None,
            callbacks: Vec::new(),
            last_event: CadenceEvent::Idle,
        }
    }

    /// Measure with `mode` over `times`.
    pub fn with_cadence(mut self, mode: CadenceMode, times: TimeAxis) -> Self {
        self.cadence = Some(MeasurementCadence::new(mode, times));
        self
    }

    /// Monitor `entities`.
    pub fn with_entities(mut self, entities: Vec<Arc<MonitoredEntity>>) -> Self {
        self.entities = entities;
        self
    }

    /// Attach a callback run after the cadence every round.
    pub fn add_callback(&mut self, callback: Box<dyn RoundCallback>) {
        self.callbacks.push(callback);
    }

    /// Builder form of [`add_callback`](Self::add_callback).
    pub fn with_callback(mut self, callback: Box<dyn RoundCallback>) -> Self {
        self.add_callback(callback);
        self
    }

    /// Monitored entities.
    pub fn entities(&self) -> &[Arc<MonitoredEntity>] {
        &self.entities
    }

    /// The configured cadence, if any.
    pub fn cadence(&self) -> Option<&MeasurementCadence> {
        self.cadence.as_ref()
    }

    /// What the cadence did in the most recent round.
    pub fn last_event(&self) -> CadenceEvent {
        self.last_event
    }
}

impl Worker for MeasurementWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&mut self) {
        if let Some(cadence) = &self.cadence {
            cadence.prepare(&self.entities);
        }
    }

    fn step(&mut self, ctx: &StepContext) -> Result<(), WorkerError> {
        if let Some(cadence) = &mut self.cadence {
            self.last_event = cadence.advance(ctx.time, ctx.dt_ms, &self.entities);
        }
        run_callbacks(&self.name, &mut self.callbacks, ctx)
    }
}

impl std::fmt::Debug for MeasurementWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementWorker")
            .field("name", &self.name)
            .field("entities", &self.entities.len())
            .field("cadence", &self.cadence.as_ref().map(MeasurementCadence::mode))
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
