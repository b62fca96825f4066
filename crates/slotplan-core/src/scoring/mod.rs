//! Utility scoring boundary.
//!
//! The solver asks a [`ScoringFunction`] how desirable it is to run a task in
//! a given slot. Real deployments plug in a learned oracle; the core ships a
//! constant scorer and a preference-based prior that needs no history.

pub mod cache;

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::error::ScoreError;
use crate::model::{Preferences, Task, TimeSlot};

pub use cache::ScoreCache;

/// Capability to score a (task, slot) placement. Higher is better.
pub trait ScoringFunction {
    fn score(&self, task: &Task, slot: &TimeSlot, preferences: &Preferences)
        -> Result<f64, ScoreError>;
}

impl<F> ScoringFunction for F
where
    F: Fn(&Task, &TimeSlot, &Preferences) -> Result<f64, ScoreError>,
{
    fn score(
        &self,
        task: &Task,
        slot: &TimeSlot,
        preferences: &Preferences,
    ) -> Result<f64, ScoreError> {
        self(task, slot, preferences)
    }
}

/// Same utility for every placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantScorer(pub f64);

impl ScoringFunction for ConstantScorer {
    fn score(&self, _: &Task, _: &TimeSlot, _: &Preferences) -> Result<f64, ScoreError> {
        Ok(self.0)
    }
}

/// Cold-start prior built from preferences alone.
///
/// Per 15-minute sample: 0.45 base, +0.20 in the preferred morning, −0.15
/// from `avoid_after_hour` on, −0.15 on weekends, clipped to [0.05, 0.95].
/// The sample is then scaled by the task category's time-of-day factor and
/// raised by up to 0.10 as the task's latest end approaches. The slot score
/// is the mean over samples, clipped to [0, 1].
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferenceScorer;

const SAMPLE_MINUTES: i64 = 15;
const PRESSURE_BOOST: f64 = 0.10;

impl PreferenceScorer {
    fn sample(&self, task: &Task, at: DateTime<Utc>, prefs: &Preferences) -> f64 {
        let hour = prefs.local(at).hour();
        let mut u: f64 = 0.45;
        if (prefs.prefer_morning_start_hour..=prefs.prefer_morning_end_hour).contains(&hour) {
            u += 0.20;
        }
        if hour >= prefs.avoid_after_hour {
            u -= 0.15;
        }
        if prefs.is_weekend(at) {
            u -= 0.15;
        }
        let mut u = u.clamp(0.05, 0.95);

        if let Some(cat) = task.category.as_ref().and_then(|c| prefs.categories.get(c)) {
            u *= cat.factor_at(hour);
        }

        if prefs.deadline_pressure_days > 0 {
            let window_days = prefs.deadline_pressure_days as f64;
            let days_left = (task.latest_end - at).num_seconds() as f64 / 86_400.0;
            let pressure = ((window_days - days_left) / window_days).clamp(0.0, 1.0);
            u += PRESSURE_BOOST * pressure;
        }
        u
    }
}

impl ScoringFunction for PreferenceScorer {
    fn score(
        &self,
        task: &Task,
        slot: &TimeSlot,
        preferences: &Preferences,
    ) -> Result<f64, ScoreError> {
        let mut total = 0.0;
        let mut samples = 0u32;
        let mut at = slot.start;
        while at < slot.end {
            total += self.sample(task, at, preferences);
            samples += 1;
            at += Duration::minutes(SAMPLE_MINUTES);
        }
        if samples == 0 {
            return Ok(0.0);
        }
        Ok((total / samples as f64).clamp(0.0, 1.0))
    }
}
