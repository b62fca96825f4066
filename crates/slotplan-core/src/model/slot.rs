//! Time quantum, slots and horizons.
//!
//! All timestamps are UTC. The grid is anchored at the Unix epoch, so a
//! timestamp is aligned when it is a whole multiple of the granularity.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Fixed time quantum for the candidate grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Granularity(u32);

impl Granularity {
    /// Create a granularity of `minutes`. It must be positive and divide a day.
    pub fn new(minutes: u32) -> Result<Self, ValidationError> {
        if minutes == 0 || MINUTES_PER_DAY % minutes != 0 {
            return Err(ValidationError::InvalidValue {
                field: "granularity_minutes".into(),
                message: format!("{minutes} must be positive and divide 1440"),
            });
        }
        Ok(Self(minutes))
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.0 as i64)
    }

    fn seconds(&self) -> i64 {
        self.0 as i64 * 60
    }

    /// Whether `at` sits exactly on the grid.
    pub fn is_aligned(&self, at: DateTime<Utc>) -> bool {
        at.timestamp_subsec_nanos() == 0 && at.timestamp().rem_euclid(self.seconds()) == 0
    }

    /// Whether `duration` is a positive whole number of quanta.
    pub fn divides(&self, duration: Duration) -> bool {
        let secs = duration.num_seconds();
        secs > 0 && secs % self.seconds() == 0 && duration.subsec_nanos() == 0
    }

    /// Latest grid point not after `at`.
    pub fn floor(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let secs = at.timestamp();
        let floored = secs - secs.rem_euclid(self.seconds());
        Utc.timestamp_opt(floored, 0).single().unwrap_or(at)
    }

    /// Earliest grid point not before `at`.
    pub fn ceil(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        if self.is_aligned(at) {
            return at;
        }
        self.floor(at) + self.duration()
    }

    /// Number of whole quanta in `duration`.
    pub fn quanta(&self, duration: Duration) -> usize {
        (duration.num_seconds().max(0) / self.seconds()) as usize
    }
}

impl Default for Granularity {
    fn default() -> Self {
        Self(15)
    }
}

impl TryFrom<u32> for Granularity {
    type Error = ValidationError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        Granularity::new(minutes)
    }
}

impl From<Granularity> for u32 {
    fn from(g: Granularity) -> u32 {
        g.0
    }
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSlot {
    /// Create a slot, rejecting empty or inverted intervals.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if start >= end {
            return Err(ValidationError::InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Create a slot whose bounds both sit on the grid.
    pub fn aligned(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Self, ValidationError> {
        let slot = Self::new(start, end)?;
        slot.check_alignment(granularity)?;
        Ok(slot)
    }

    pub fn check_alignment(&self, granularity: Granularity) -> Result<(), ValidationError> {
        for (field, at) in [("start", self.start), ("end", self.end)] {
            if !granularity.is_aligned(at) {
                return Err(ValidationError::Misaligned {
                    field: field.into(),
                    at,
                    granularity_minutes: granularity.minutes(),
                });
            }
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    /// Check if this slot shares any time with `[start, end)`.
    pub fn overlaps_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.overlaps_range(other.start, other.end)
    }

    /// Whether `other` lies entirely inside this slot.
    pub fn contains(&self, other: &TimeSlot) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn contains_instant(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// The span of time subject to solving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if start >= end {
            return Err(ValidationError::InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Seven days from `start`.
    pub fn week_starting(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: start + Duration::days(7),
        }
    }

    /// The remaining part of this range from `now` on, starting at the next
    /// grid point. Returns `None` once nothing schedulable is left.
    pub fn residual(&self, now: DateTime<Utc>, granularity: Granularity) -> Option<Self> {
        let start = granularity.ceil(now.max(self.start));
        (start < self.end).then_some(Self {
            start,
            end: self.end,
        })
    }

    /// Shrink inward so both bounds sit on the grid.
    pub fn aligned_to(&self, granularity: Granularity) -> Option<Self> {
        let start = granularity.ceil(self.start);
        let end = granularity.floor(self.end);
        (start < end).then_some(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, slot: &TimeSlot) -> bool {
        slot.overlaps_range(self.start, self.end)
    }

    pub fn contains(&self, slot: &TimeSlot) -> bool {
        self.start <= slot.start && slot.end <= self.end
    }
}
