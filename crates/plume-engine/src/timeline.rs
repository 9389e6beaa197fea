//! Per-entity measurement timelines.
//!
//! A [`TimeLine`] belongs to one monitored entity (pipe, manhole or
//! surface cell). Particle-movement workers bump its live counter via
//! [`observe`](TimeLine::observe) while it is active; the measurement
//! worker periodically [`flush`](TimeLine::flush)es that counter into
//! the sample at a time index, together with the entity's current
//! fluid volume.
//!
//! All state is atomic. The live counter tolerates many writers; the
//! sample arrays have a single writer (the measurement worker) and any
//! number of readers.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use plume_core::TimeAxis;

/// Append-by-index particle sample series for one entity.
pub struct TimeLine {
    times: TimeAxis,
    active: AtomicBool,
    pending: AtomicU32,
    counts: Box<[AtomicU64]>,
    volume: Box<[AtomicU64]>,
    samples: Box<[AtomicU32]>,
}

impl TimeLine {
    /// An empty, inactive timeline over `times`.
    pub fn new(times: TimeAxis) -> Self {
        let n = times.len();
        Self {
            times,
            active: AtomicBool::new(false),
            pending: AtomicU32::new(0),
            counts: (0..n).map(|_| AtomicU64::new(0)).collect(),
            volume: (0..n).map(|_| AtomicU64::new(0f64.to_bits())).collect(),
            samples: (0..n).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// The sample time axis.
    pub fn times(&self) -> &TimeAxis {
        &self.times
    }

    /// Number of sample slots.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether there are no sample slots (never true for a valid axis).
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Whether observations are currently accepted.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Open or close the timeline for observations.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Count one particle passing through. Ignored while inactive.
    pub fn observe(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.pending.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Particles observed since the last flush or reset.
    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Relaxed)
    }

    /// Discard the live counter. Returns the discarded value.
    pub fn reset_pending(&self) -> u32 {
        self.pending.swap(0, Ordering::AcqRel)
    }

    /// Move the live counter into sample `index`, recording `volume`.
    ///
    /// The counter is reset exactly once per call. Nothing is written
    /// when it was zero or `index` is out of range. Returns the
    /// particles taken from the counter.
    pub fn flush(&self, index: usize, volume: f64) -> u32 {
        let n = self.reset_pending();
        if n == 0 || index >= self.len() {
            return n;
        }
        self.counts[index].fetch_add(n as u64, Ordering::Relaxed);
        let v = f64::from_bits(self.volume[index].load(Ordering::Relaxed));
        self.volume[index].store((v + volume).to_bits(), Ordering::Relaxed);
        self.samples[index].fetch_add(1, Ordering::Release);
        n
    }

    /// Particles recorded at `index`.
    pub fn count_at(&self, index: usize) -> u64 {
        self.counts
            .get(index)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Number of flushes that contributed to `index`.
    pub fn samples_at(&self, index: usize) -> u32 {
        self.samples
            .get(index)
            .map_or(0, |c| c.load(Ordering::Acquire))
    }

    /// Mean sampled fluid volume at `index`, or `None` if never sampled.
    pub fn mean_volume_at(&self, index: usize) -> Option<f64> {
        let samples = self.samples_at(index);
        if samples == 0 {
            return None;
        }
        let total = f64::from_bits(self.volume[index].load(Ordering::Relaxed));
        Some(total / samples as f64)
    }

    /// Particles recorded across all indices.
    pub fn total_count(&self) -> u64 {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Clear every sample and the live counter, and deactivate.
    pub fn reset(&mut self) {
        *self = Self::new(self.times.clone());
    }
}

impl std::fmt::Debug for TimeLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeLine")
            .field("len", &self.len())
            .field("active", &self.is_active())
            .field("pending", &self.pending())
            .field("total", &self.total_count())
            .finish()
    }
}

/// Kind of monitored entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A pipe segment.
    Pipe,
    /// A manhole / junction.
    Manhole,
    /// A surface cell.
    Surface,
}

/// A network element whose particle passages are measured.
///
/// The hydraulic layer updates [`volume`](Self::volume) between rounds;
/// the measurement worker samples it on every flush.
pub struct MonitoredEntity {
    name: String,
    kind: EntityKind,
    volume_bits: AtomicU64,
    timeline: TimeLine,
}

impl MonitoredEntity {
    /// New entity with zero volume and an empty timeline.
    pub fn new(name: impl Into<String>, kind: EntityKind, times: TimeAxis) -> Self {
        Self {
            name: name.into(),
            kind,
            volume_bits: AtomicU64::new(0f64.to_bits()),
            timeline: TimeLine::new(times),
        }
    }

    /// Entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity kind.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Current fluid volume.
    pub fn volume(&self) -> f64 {
        f64::from_bits(self.volume_bits.load(Ordering::Acquire))
    }

    /// Set the current fluid volume.
    pub fn set_volume(&self, volume: f64) {
        self.volume_bits.store(volume.to_bits(), Ordering::Release);
    }

    /// The entity's timeline.
    pub fn timeline(&self) -> &TimeLine {
        &self.timeline
    }

    /// Flush the timeline into `index` with the current volume.
    pub fn flush(&self, index: usize) -> u32 {
        self.timeline.flush(index, self.volume())
    }
}

impl std::fmt::Debug for MonitoredEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoredEntity")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("volume", &self.volume())
            .field("timeline", &self.timeline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn axis() -> TimeAxis {
        TimeAxis::uniform(0, 1000, 4).unwrap()
    }

    #[test]
    fn inactive_timeline_ignores_observations() {
        let tl = TimeLine::new(axis());
        assert!(!tl.observe());
        assert_eq!(tl.pending(), 0);
        tl.set_active(true);
        assert!(tl.observe());
        assert_eq!(tl.pending(), 1);
    }

    #[test]
    fn flush_moves_counter_once() {
        let tl = TimeLine::new(axis());
        tl.set_active(true);
        for _ in 0..5 {
            tl.observe();
        }
        assert_eq!(tl.flush(2, 3.0), 5);
        assert_eq!(tl.pending(), 0);
        // Second flush finds nothing and writes nothing.
        assert_eq!(tl.flush(2, 9.0), 0);
        assert_eq!(tl.count_at(2), 5);
        assert_eq!(tl.samples_at(2), 1);
        assert_eq!(tl.mean_volume_at(2), Some(3.0));
        assert_eq!(tl.mean_volume_at(1), None);
    }

    #[test]
    fn flush_out_of_range_still_resets() {
        let tl = TimeLine::new(axis());
        tl.set_active(true);
        tl.observe();
        assert_eq!(tl.flush(10, 1.0), 1);
        assert_eq!(tl.pending(), 0);
        assert_eq!(tl.total_count(), 0);
    }

    #[test]
    fn mean_volume_over_samples() {
        let tl = TimeLine::new(axis());
        tl.set_active(true);
        tl.observe();
        tl.flush(0, 2.0);
        tl.observe();
        tl.flush(0, 4.0);
        assert_eq!(tl.count_at(0), 2);
        assert_eq!(tl.mean_volume_at(0), Some(3.0));
    }

    #[test]
    fn concurrent_observers_are_counted() {
        let e = Arc::new(MonitoredEntity::new("p1", EntityKind::Pipe, axis()));
        e.timeline().set_active(true);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let e = Arc::clone(&e);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        e.timeline().observe();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        e.set_volume(1.5);
        assert_eq!(e.flush(1), 8000);
        assert_eq!(e.timeline().count_at(1), 8000);
        assert_eq!(e.timeline().mean_volume_at(1), Some(1.5));
    }

    #[test]
    fn reset_clears_samples() {
        let mut tl = TimeLine::new(axis());
        tl.set_active(true);
        tl.observe();
        tl.flush(0, 1.0);
        tl.reset();
        assert_eq!(tl.total_count(), 0);
        assert!(!tl.is_active());
        assert_eq!(tl.len(), 4);
    }
}
