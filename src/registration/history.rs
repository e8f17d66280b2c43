use std::collections::vec_deque::{self, VecDeque};

use crate::error::InvalidInput;

/// A value with a timestamp in seconds.
pub trait Timestamped {
    fn timestamp_secs(&self) -> f64;
}

/// A pressure sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureReading {
    pub timestamp_secs: f64,
    pub value_cm_h2o: f32,
}

/// The aggregate envelope energy of one processed audio chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyPoint {
    pub timestamp_secs: f64,
    pub energy: f32,
}

impl Timestamped for PressureReading {
    fn timestamp_secs(&self) -> f64 {
        self.timestamp_secs
    }
}

impl Timestamped for EnergyPoint {
    fn timestamp_secs(&self) -> f64 {
        self.timestamp_secs
    }
}

/// A time ordered history covering at most `max_duration_secs`.
///
/// Every push drops the entries whose timestamp is at or before
/// `latest - max_duration_secs`. Timestamps must be pushed in
/// non-decreasing order.
pub struct TimedHistory<T> {
    points: VecDeque<T>,
    max_duration_secs: f64,
}

impl<T: Timestamped> TimedHistory<T> {
    pub fn new(max_duration_secs: f64) -> Self {
        TimedHistory {
            points: VecDeque::new(),
            max_duration_secs,
        }
    }

    /// Appends `point` and prunes entries that have fallen out of the
    /// history duration.
    pub fn push(&mut self, point: T) -> Result<(), InvalidInput> {
        let timestamp = point.timestamp_secs();
        if !timestamp.is_finite() {
            return Err(InvalidInput::NonFiniteTimestamp {
                timestamp_secs: timestamp,
            });
        }
        if let Some(previous) = self.latest_timestamp() {
            if timestamp < previous {
                return Err(InvalidInput::TimestampOutOfOrder {
                    previous,
                    got: timestamp,
                });
            }
        }

        self.points.push_back(point);
        let cutoff = timestamp - self.max_duration_secs;
        while let Some(oldest) = self.points.front() {
            if oldest.timestamp_secs() > cutoff {
                break;
            }
            self.points.pop_front();
        }
        Ok(())
    }

    /// Returns the point closest in time to `timestamp_secs`. Ties go to
    /// the earlier point.
    ///
    /// `cursor` is advanced to the first point at or after `timestamp_secs`
    /// and is reused across calls, so a sequence of lookups with
    /// non-decreasing timestamps walks the history once. Start it at 0.
    pub fn nearest_from(&self, timestamp_secs: f64, cursor: &mut usize) -> Option<&T> {
        while let Some(point) = self.points.get(*cursor) {
            if point.timestamp_secs() >= timestamp_secs {
                break;
            }
            *cursor += 1;
        }
        let after = self.points.get(*cursor);
        let before = cursor.checked_sub(1).and_then(|i| self.points.get(i));
        match (before, after) {
            (Some(before), Some(after)) => {
                let before_distance = timestamp_secs - before.timestamp_secs();
                let after_distance = after.timestamp_secs() - timestamp_secs;
                if after_distance < before_distance {
                    Some(after)
                } else {
                    Some(before)
                }
            }
            (before, after) => before.or(after),
        }
    }

    pub fn latest_timestamp(&self) -> Option<f64> {
        self.points.back().map(|point| point.timestamp_secs())
    }

    pub fn oldest_timestamp(&self) -> Option<f64> {
        self.points.front().map(|point| point.timestamp_secs())
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.points.get(index)
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn max_duration_secs(&self) -> f64 {
        self.max_duration_secs
    }
}
