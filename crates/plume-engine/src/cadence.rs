//! Measurement cadences: when entity counters are flushed into their
//! timelines.
//!
//! - **Time-spot:** counters only accept particles inside short windows
//!   that open one round before each sample time. A window stays open
//!   for one round; on the next round it is flushed into the cached
//!   write index and closed, and the next opening time is scheduled.
//! - **Continuous:** counters are always active. Whenever the clamped
//!   sample index changes between rounds, pending counts are flushed
//!   into the new index. Rounds that stay within one index do nothing.

use std::sync::Arc;

use plume_core::{SimTime, TimeAxis};

use crate::timeline::MonitoredEntity;

/// Which cadence a measurement worker runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CadenceMode {
    /// Sample only inside scheduled windows.
    TimeSpot,
    /// Flush whenever the sample index changes.
    #[default]
    Continuous,
}

/// What one [`MeasurementCadence::advance`] call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CadenceEvent {
    /// Nothing to do this round.
    Idle,
    /// A time-spot window opened; counters were zeroed and activated.
    Opened,
    /// A time-spot window closed after flushing into `index`.
    Closed {
        /// Sample index written.
        index: usize,
        /// Particles flushed across all entities.
        particles: u64,
        /// Next opening time.
        next_open: SimTime,
    },
    /// Continuous mode flushed into a new sample index.
    Flushed {
        /// Sample index written.
        index: usize,
        /// Particles flushed across all entities.
        particles: u64,
    },
}

#[derive(Clone, Debug)]
enum CadenceState {
    TimeSpot {
        open: bool,
        next_open: SimTime,
        write_index: usize,
    },
    Continuous {
        last_index: Option<usize>,
    },
}

/// Per-worker measurement schedule over a shared time axis.
#[derive(Clone, Debug)]
pub struct MeasurementCadence {
    times: TimeAxis,
    state: CadenceState,
}

impl MeasurementCadence {
    /// A cadence in `mode` over `times`.
    pub fn new(mode: CadenceMode, times: TimeAxis) -> Self {
        let state = match mode {
            CadenceMode::TimeSpot => CadenceState::TimeSpot {
                open: false,
                next_open: SimTime::ZERO,
                write_index: 0,
            },
            CadenceMode::Continuous => CadenceState::Continuous { last_index: None },
        };
        Self { times, state }
    }

    /// Selected mode.
    pub fn mode(&self) -> CadenceMode {
        match self.state {
            CadenceState::TimeSpot { .. } => CadenceMode::TimeSpot,
            CadenceState::Continuous { .. } => CadenceMode::Continuous,
        }
    }

    /// The sample time axis.
    pub fn times(&self) -> &TimeAxis {
        &self.times
    }

    /// Whether a time-spot window is open. Always `false` in continuous mode.
    pub fn is_open(&self) -> bool {
        matches!(self.state, CadenceState::TimeSpot { open: true, .. })
    }

    /// Next time-spot opening time.
    pub fn next_open_time(&self) -> Option<SimTime> {
        match self.state {
            CadenceState::TimeSpot { next_open, .. } => Some(next_open),
            CadenceState::Continuous { .. } => None,
        }
    }

    /// Sample index the next time-spot window will write to.
    pub fn write_index(&self) -> Option<usize> {
        match self.state {
            CadenceState::TimeSpot { write_index, .. } => Some(write_index),
            CadenceState::Continuous { .. } => None,
        }
    }

    /// Set the initial activation of `entities` for this mode: inactive
    /// for time-spot (until the first window opens), active for
    /// continuous.
    pub fn prepare(&self, entities: &[Arc<MonitoredEntity>]) {
        let active = self.mode() == CadenceMode::Continuous;
        for e in entities {
            e.timeline().set_active(active);
        }
    }

    /// Run the cadence for the round at `now`.
    pub fn advance(
        &mut self,
        now: SimTime,
        dt_ms: i64,
        entities: &[Arc<MonitoredEntity>],
    ) -> CadenceEvent {
        let times = &self.times;
        match &mut self.state {
            CadenceState::TimeSpot {
                open,
                next_open,
                write_index,
            } => {
                if *open {
                    let mut particles = 0u64;
                    for e in entities {
                        particles += e.flush(*write_index) as u64;
                        e.timeline().set_active(false);
                    }
                    let written = *write_index;
                    let index = times.clamped_index_of(now);
                    let n = times.len();
                    if n > index + 1 {
                        *next_open = if n == index + 2 {
                            // Last window: open two steps before the end so
                            // it closes before the final sample time.
                            SimTime(times.end_time().0 - 2 * dt_ms)
                        } else {
                            // Index below n - 1, so the lookup succeeds.
                            let at = times.time_at(index + 1).unwrap_or(times.end_time());
                            SimTime(at.0 - dt_ms)
                        };
                        *write_index = index + 1;
                    }
                    *open = false;
                    log::debug!(
                        "measurement window closed at {now}: {particles} particles into index {written}, next opens at {next_open}"
                    );
                    CadenceEvent::Closed {
                        index: written,
                        particles,
                        next_open: *next_open,
                    }
                } else if now >= *next_open {
                    *open = true;
                    for e in entities {
                        e.timeline().set_active(true);
                        e.timeline().reset_pending();
                    }
                    log::debug!("measurement window opened at {now} for index {write_index}");
                    CadenceEvent::Opened
                } else {
                    CadenceEvent::Idle
                }
            }
            CadenceState::Continuous { last_index } => {
                let index = times.clamped_index_of(now);
                if *last_index == Some(index) {
                    return CadenceEvent::Idle;
                }
                *last_index = Some(index);
                let mut particles = 0u64;
                for e in entities {
                    if e.timeline().pending() > 0 {
                        particles += e.flush(index) as u64;
                    }
                }
                log::trace!("flushed {particles} particles into index {index} at {now}");
                CadenceEvent::Flushed { index, particles }
            }
        }
    }
}
