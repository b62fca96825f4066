//! Per-user scheduling preferences.
//!
//! Hard parts (blocked intervals, allowed daily hours, weekends, minimum gap,
//! daily cap) constrain the solver. Soft parts (morning preference, late
//! penalty, category weighting) are only read by scorers.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::slot::TimeSlot;
use crate::error::ValidationError;

/// Time-of-day weighting for one task category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPreference {
    /// First preferred local hour (inclusive)
    pub start_hour: u32,
    /// Last preferred local hour (inclusive)
    pub end_hour: u32,
    /// Multiplier inside the preferred hours
    #[serde(default = "default_inside_factor")]
    pub inside_factor: f64,
    /// Multiplier outside the preferred hours
    #[serde(default = "default_outside_factor")]
    pub outside_factor: f64,
}

fn default_inside_factor() -> f64 {
    1.3
}
fn default_outside_factor() -> f64 {
    0.8
}

impl CategoryPreference {
    pub fn factor_at(&self, local_hour: u32) -> f64 {
        if (self.start_hour..=self.end_hour).contains(&local_hour) {
            self.inside_factor
        } else {
            self.outside_factor
        }
    }
}

/// Scheduling preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Absolute intervals where no task may run
    #[serde(default)]
    pub blocked: Vec<TimeSlot>,
    /// No task before this local hour
    #[serde(default)]
    pub day_start_hour: Option<u32>,
    /// No task at or after this local hour (24 = midnight)
    #[serde(default)]
    pub day_end_hour: Option<u32>,
    /// Allow tasks on Saturday and Sunday
    #[serde(default = "default_true")]
    pub weekend_ok: bool,
    /// Minimum gap between consecutive scheduled tasks
    #[serde(default)]
    pub min_gap_minutes: u32,
    /// Cap on scheduled task minutes per local day
    #[serde(default)]
    pub max_task_minutes_per_day: Option<u32>,
    /// Local time offset from UTC in minutes
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// First local hour of the preferred morning (inclusive)
    #[serde(default = "default_morning_start")]
    pub prefer_morning_start_hour: u32,
    /// Last local hour of the preferred morning (inclusive)
    #[serde(default = "default_morning_end")]
    pub prefer_morning_end_hour: u32,
    /// Local hour from which slots are penalized
    #[serde(default = "default_avoid_after")]
    pub avoid_after_hour: u32,
    /// Days before a task's latest end where slots gain urgency
    #[serde(default = "default_pressure_days")]
    pub deadline_pressure_days: u32,
    /// Time-of-day weighting keyed by task category
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryPreference>,
}

fn default_true() -> bool {
    true
}
fn default_morning_start() -> u32 {
    8
}
fn default_morning_end() -> u32 {
    11
}
fn default_avoid_after() -> u32 {
    20
}
fn default_pressure_days() -> u32 {
    3
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            blocked: Vec::new(),
            day_start_hour: None,
            day_end_hour: None,
            weekend_ok: true,
            min_gap_minutes: 0,
            max_task_minutes_per_day: None,
            utc_offset_minutes: 0,
            prefer_morning_start_hour: default_morning_start(),
            prefer_morning_end_hour: default_morning_end(),
            avoid_after_hour: default_avoid_after(),
            deadline_pressure_days: default_pressure_days(),
            categories: BTreeMap::new(),
        }
    }
}

impl Preferences {
    /// Restrict tasks to `[start_hour, end_hour)` local time.
    pub fn with_day_hours(mut self, start_hour: u32, end_hour: u32) -> Self {
        self.day_start_hour = Some(start_hour);
        self.day_end_hour = Some(end_hour);
        self
    }

    pub fn with_min_gap(mut self, minutes: u32) -> Self {
        self.min_gap_minutes = minutes;
        self
    }

    pub fn with_blocked(mut self, slot: TimeSlot) -> Self {
        self.blocked.push(slot);
        self
    }

    pub fn with_category(mut self, name: impl Into<String>, pref: CategoryPreference) -> Self {
        self.categories.insert(name.into(), pref);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let start = self.day_start_hour.unwrap_or(0);
        let end = self.day_end_hour.unwrap_or(24);
        if start > 23 || end > 24 || start >= end {
            return Err(ValidationError::InvalidValue {
                field: "preferences.day_hours".into(),
                message: format!("[{start}, {end}) is not a valid daily range"),
            });
        }
        if self.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ValidationError::InvalidValue {
                field: "preferences.utc_offset_minutes".into(),
                message: format!("{} is out of range", self.utc_offset_minutes),
            });
        }
        for slot in &self.blocked {
            if slot.start >= slot.end {
                return Err(ValidationError::InvalidTimeRange {
                    start: slot.start,
                    end: slot.end,
                });
            }
        }
        for (name, cat) in &self.categories {
            let factors_ok = [cat.inside_factor, cat.outside_factor]
                .iter()
                .all(|f| f.is_finite() && *f >= 0.0);
            if cat.start_hour > cat.end_hour || cat.end_hour > 23 || !factors_ok {
                return Err(ValidationError::InvalidValue {
                    field: format!("preferences.categories.{name}"),
                    message: "hours must satisfy start <= end <= 23 and factors be non-negative".into(),
                });
            }
        }
        Ok(())
    }

    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset())
    }

    /// Local calendar day of `at`.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        self.local(at).date_naive()
    }

    pub fn is_weekend(&self, at: DateTime<Utc>) -> bool {
        matches!(self.local(at).weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Whether no task may occupy `[start, end)`.
    ///
    /// Daily hours and weekends are judged from the local time at `start`,
    /// so callers should pass single grid quanta.
    pub fn blocks(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if self.blocked.iter().any(|b| b.overlaps_range(start, end)) {
            return true;
        }
        if !self.weekend_ok && self.is_weekend(start) {
            return true;
        }
        if self.day_start_hour.is_some() || self.day_end_hour.is_some() {
            let local = self.local(start);
            let minute_of_day = (local.hour() * 60 + local.minute()) as i64;
            let len = (end - start).num_minutes();
            let open = self.day_start_hour.unwrap_or(0) as i64 * 60;
            let close = self.day_end_hour.unwrap_or(24) as i64 * 60;
            if minute_of_day < open || minute_of_day + len > close {
                return true;
            }
        }
        false
    }
}
