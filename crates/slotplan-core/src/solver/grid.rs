//! Candidate grid over the horizon.
//!
//! Quantum `i` covers `[start + i*g, start + (i+1)*g)`. A quantum is blocked
//! when a fixed event, an explicit blocked interval or a preference rule
//! (daily hours, weekends) forbids task time there.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::model::{FixedEvent, Granularity, Preferences, Task, TimeRange, TimeSlot};

pub(crate) struct Grid {
    start: DateTime<Utc>,
    granularity: Granularity,
    len: usize,
    /// blocked_prefix[i] = number of blocked quanta in 0..i
    blocked_prefix: Vec<usize>,
    /// Local-day index of every quantum
    day_of: Vec<usize>,
    /// Local date of each day index
    dates: Vec<NaiveDate>,
}

impl Grid {
    /// Build the grid for an aligned horizon.
    pub fn build(
        horizon: &TimeRange,
        granularity: Granularity,
        fixed_events: &[FixedEvent],
        preferences: &Preferences,
    ) -> Self {
        let len = granularity.quanta(horizon.duration());
        let mut blocked_prefix = Vec::with_capacity(len + 1);
        let mut day_of = Vec::with_capacity(len);
        let mut dates: Vec<NaiveDate> = Vec::new();

        blocked_prefix.push(0);
        for i in 0..len {
            let q_start = horizon.start + offset(granularity, i);
            let q_end = q_start + granularity.duration();

            let blocked = preferences.blocks(q_start, q_end)
                || fixed_events
                    .iter()
                    .any(|e| e.slot.overlaps_range(q_start, q_end));
            blocked_prefix.push(blocked_prefix[i] + usize::from(blocked));

            // Local dates only move forward along the grid
            let date = preferences.local_date(q_start);
            if dates.last() != Some(&date) {
                dates.push(date);
            }
            day_of.push(dates.len() - 1);
        }

        Self {
            start: horizon.start,
            granularity,
            len,
            blocked_prefix,
            day_of,
            dates,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn day_of(&self) -> &[usize] {
        &self.day_of
    }

    pub fn days(&self) -> usize {
        self.dates.len()
    }

    /// Day index of a local date on the grid.
    pub fn day_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.iter().position(|d| *d == date)
    }

    pub fn time_at(&self, index: usize) -> DateTime<Utc> {
        self.start + offset(self.granularity, index)
    }

    /// Quanta `[first, end)` covered by `slot`, relative to the grid start.
    /// Either bound may fall outside the grid.
    pub fn span_of(&self, slot: &TimeSlot) -> (i64, i64) {
        let g = i64::from(self.granularity.minutes());
        let first = (slot.start - self.start).num_minutes().div_euclid(g);
        let end = ((slot.end - self.start).num_minutes() + g - 1).div_euclid(g);
        (first, end)
    }

    /// Slot covering quanta `start..start + quanta`.
    pub fn slot(&self, start: usize, quanta: usize) -> TimeSlot {
        TimeSlot {
            start: self.time_at(start),
            end: self.time_at(start + quanta),
        }
    }

    pub fn is_free(&self, start: usize, quanta: usize) -> bool {
        self.blocked_prefix[start + quanta] == self.blocked_prefix[start]
    }

    /// Start indices where `task` fits its window and touches no blocked quantum.
    pub fn feasible_starts(&self, task: &Task, quanta: usize) -> Vec<usize> {
        if quanta == 0 || quanta > self.len {
            return Vec::new();
        }
        (0..=self.len - quanta)
            .filter(|&i| {
                self.time_at(i) >= task.earliest_start
                    && self.time_at(i + quanta) <= task.latest_end
                    && self.is_free(i, quanta)
            })
            .collect()
    }
}

fn offset(granularity: Granularity, quanta: usize) -> Duration {
    Duration::minutes(i64::from(granularity.minutes()) * quanta as i64)
}
