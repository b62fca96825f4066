//! Per-solve scoring adapter.
//!
//! Wraps a [`ScoringFunction`] for the duration of a single solve. Scores are
//! memoized by (task id, slot). Oracle failures degrade to the configured
//! default score. A cache is built per solve and dropped with it.

use std::collections::HashMap;

use super::ScoringFunction;
use crate::model::{Preferences, Task, TimeSlot};

pub struct ScoreCache<'a> {
    scorer: &'a dyn ScoringFunction,
    preferences: &'a Preferences,
    default_score: f64,
    scores: HashMap<(String, TimeSlot), f64>,
    fallbacks: usize,
    oracle_calls: usize,
}

impl<'a> ScoreCache<'a> {
    pub fn new(
        scorer: &'a dyn ScoringFunction,
        preferences: &'a Preferences,
        default_score: f64,
    ) -> Self {
        Self {
            scorer,
            preferences,
            default_score,
            scores: HashMap::new(),
            fallbacks: 0,
            oracle_calls: 0,
        }
    }

    /// Utility of running `task` in `slot`.
    ///
    /// Slots outside the task window score negative infinity. When the
    /// oracle is unavailable or answers NaN, the default score is used.
    pub fn score(&mut self, task: &Task, slot: &TimeSlot) -> f64 {
        if !task.window_contains(slot) {
            return f64::NEG_INFINITY;
        }

        let key = (task.id.clone(), *slot);
        if let Some(score) = self.scores.get(&key) {
            return *score;
        }

        self.oracle_calls += 1;
        let score = match self.scorer.score(task, slot, self.preferences) {
            Ok(value) if !value.is_nan() => value,
            Ok(_) => {
                tracing::debug!(task_id = %task.id, start = %slot.start, "oracle returned NaN");
                self.fallbacks += 1;
                self.default_score
            }
            Err(err) => {
                tracing::debug!(task_id = %task.id, start = %slot.start, error = %err, "oracle failed");
                self.fallbacks += 1;
                self.default_score
            }
        };
        self.scores.insert(key, score);
        score
    }

    /// Number of pairs scored with the default.
    pub fn fallbacks(&self) -> usize {
        self.fallbacks
    }

    /// Number of distinct pairs sent to the oracle.
    pub fn oracle_calls(&self) -> usize {
        self.oracle_calls
    }
}
