//! Per-round and per-run timing metrics.
//!
//! [`RoundMetrics`] captures one round as seen by the controller;
//! [`RunMetrics`] folds them into the summary carried by
//! [`RunReport`](crate::RunReport).

use std::time::Duration;

use plume_core::{RoundId, SimTime};

/// Timing and participation for a single round.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoundMetrics {
    /// The round.
    pub round: RoundId,
    /// Simulation time it was released with.
    pub time: SimTime,
    /// Wall-clock time from release to completion, in microseconds.
    pub wall_us: u64,
    /// Workers that finished the round.
    pub finished: usize,
    /// Step faults reported during the round.
    pub faults: usize,
}

/// Aggregate over all rounds of a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunMetrics {
    /// Rounds completed.
    pub rounds: u64,
    /// Sum of round wall times, in microseconds.
    pub total_us: u64,
    /// Slowest round, in microseconds.
    pub max_round_us: u64,
    /// Rounds that exceeded the configured warning threshold.
    pub slow_rounds: u64,
    /// The most recent round.
    pub last: Option<RoundMetrics>,
}

impl RunMetrics {
    /// Fold `round` into the aggregate.
    pub fn record(&mut self, round: RoundMetrics, slow: bool) {
        self.rounds += 1;
        self.total_us += round.wall_us;
        self.max_round_us = self.max_round_us.max(round.wall_us);
        self.slow_rounds += slow as u64;
        self.last = Some(round);
    }

    /// Mean round wall time in microseconds, 0 before the first round.
    pub fn mean_round_us(&self) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            self.total_us as f64 / self.rounds as f64
        }
    }

    /// Total wall time spent inside rounds.
    pub fn total(&self) -> Duration {
        Duration::from_micros(self.total_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = RunMetrics::default();
        assert_eq!(m.rounds, 0);
        assert_eq!(m.mean_round_us(), 0.0);
        assert!(m.last.is_none());
    }

    #[test]
    fn record_accumulates() {
        let mut m = RunMetrics::default();
        for (i, us) in [100u64, 300, 200].into_iter().enumerate() {
            m.record(
                RoundMetrics {
                    round: RoundId(i as u64 + 1),
                    wall_us: us,
                    ..RoundMetrics::default()
                },
                us > 250,
            );
        }
        assert_eq!(m.rounds, 3);
        assert_eq!(m.total_us, 600);
        assert_eq!(m.max_round_us, 300);
        assert_eq!(m.slow_rounds, 1);
        assert_eq!(m.mean_round_us(), 200.0);
        assert_eq!(m.total(), Duration::from_micros(600));
        assert_eq!(m.last.unwrap().round, RoundId(3));
    }
}
