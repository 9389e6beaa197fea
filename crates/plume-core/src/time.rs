//! Measurement time axis shared by rasters and timelines.
//!
//! A [`TimeAxis`] maps simulated time to a measurement *time index*.
//! Index `i` covers `[time_at(i), time_at(i + 1))`. The last index covers
//! one interval past its stamp; anything later resolves to `len()`.
//! Rasters drop times on either side of the axis
//! ([`window_index`](TimeAxis::window_index)); cadences clamp them
//! ([`clamped_index_of`](TimeAxis::clamped_index_of)).

use crate::error::TimeAxisError;
use crate::id::SimTime;

#[derive(Clone, Debug, PartialEq)]
enum AxisKind {
    Uniform {
        start_ms: i64,
        interval_ms: i64,
        count: usize,
    },
    Explicit(Box<[i64]>),
}

/// Ordered sequence of measurement instants.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeAxis {
    kind: AxisKind,
}

impl TimeAxis {
    /// Evenly spaced axis: `count` stamps starting at `start_ms`, `interval_ms` apart.
    pub fn uniform(start_ms: i64, interval_ms: i64, count: usize) -> Result<Self, TimeAxisError> {
        if count == 0 {
            return Err(TimeAxisError::Empty);
        }
        if interval_ms <= 0 {
            return Err(TimeAxisError::NonPositiveInterval { interval_ms });
        }
        // The last stamp and the end of its interval must both fit in i64.
        let fits = i64::try_from(count)
            .ok()
            .and_then(|n| interval_ms.checked_mul(n))
            .and_then(|span| start_ms.checked_add(span))
            .is_some();
        if !fits {
            return Err(TimeAxisError::Overflow {
                start_ms,
                interval_ms,
                count,
            });
        }
        Ok(Self {
            kind: AxisKind::Uniform {
                start_ms,
                interval_ms,
                count,
            },
        })
    }

    /// Axis from explicit millisecond stamps, which must be strictly increasing.
    pub fn from_times(times_ms: Vec<i64>) -> Result<Self, TimeAxisError> {
        if times_ms.is_empty() {
            return Err(TimeAxisError::Empty);
        }
        if let Some(i) = times_ms.windows(2).position(|w| w[1] <= w[0]) {
            return Err(TimeAxisError::NotIncreasing { index: i + 1 });
        }
        Ok(Self {
            kind: AxisKind::Explicit(times_ms.into_boxed_slice()),
        })
    }

    /// Number of time indices.
    pub fn len(&self) -> usize {
        match &self.kind {
            AxisKind::Uniform { count, .. } => *count,
            AxisKind::Explicit(times) => times.len(),
        }
    }

    /// Always `false`; construction rejects empty axes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stamp of index `i`, or `None` past the end.
    pub fn time_at(&self, i: usize) -> Option<SimTime> {
        match &self.kind {
            AxisKind::Uniform {
                start_ms,
                interval_ms,
                count,
            } => (i < *count).then(|| SimTime(start_ms + interval_ms * i as i64)),
            AxisKind::Explicit(times) => times.get(i).copied().map(SimTime),
        }
    }

    /// Stamp of the first index.
    pub fn start_time(&self) -> SimTime {
        match &self.kind {
            AxisKind::Uniform { start_ms, .. } => SimTime(*start_ms),
            AxisKind::Explicit(times) => SimTime(times[0]),
        }
    }

    /// Stamp of the last index.
    pub fn end_time(&self) -> SimTime {
        match &self.kind {
            AxisKind::Uniform {
                start_ms,
                interval_ms,
                count,
            } => SimTime(start_ms + interval_ms * (*count as i64 - 1)),
            AxisKind::Explicit(times) => SimTime(times[times.len() - 1]),
        }
    }

    /// Raw time index for `t`.
    ///
    /// Saturates at 0 before the start. Past the last interval the result
    /// is `len()` or larger (uniform axes keep counting), so callers must
    /// bounds-check or use [`clamped_index_of`](Self::clamped_index_of).
    pub fn index_of(&self, t: SimTime) -> usize {
        match &self.kind {
            AxisKind::Uniform {
                start_ms,
                interval_ms,
                ..
            } => {
                if t.0 < *start_ms {
                    0
                } else {
                    // Only a far-future `t` overflows; it is past the end either way.
                    t.0.checked_sub(*start_ms)
                        .map_or(usize::MAX, |d| (d / interval_ms) as usize)
                }
            }
            AxisKind::Explicit(times) => {
                if t.0 < times[0] {
                    return 0;
                }
                let last = times.len() - 1;
                let last_interval = if last == 0 {
                    1
                } else {
                    times[last] - times[last - 1]
                };
                if t.0 >= times[last].saturating_add(last_interval) {
                    return times.len();
                }
                times.partition_point(|&x| x <= t.0) - 1
            }
        }
    }

    /// Time index for `t` when it lies inside the axis, `None` before the
    /// first stamp or past the last interval.
    pub fn window_index(&self, t: SimTime) -> Option<usize> {
        if t < self.start_time() {
            return None;
        }
        let i = self.index_of(t);
        (i < self.len()).then_some(i)
    }

    /// Time index for `t`, clamped to the last valid index.
    pub fn clamped_index_of(&self, t: SimTime) -> usize {
        self.index_of(t).min(self.len() - 1)
    }
}
