//! Re-entry and relaxation policies.
//!
//! # Usage
//! ```rust,ignore
//! use slotplan_core::rescheduler::{Rescheduler, SplitIntoChunks};
//!
//! let rescheduler = Rescheduler::new(&config)?.with_relaxation(SplitIntoChunks::new(30));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{Granularity, Task};

/// How a missed task comes back into the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReentryPolicy {
    /// Multiplier applied to the priority weight on each re-entry
    #[serde(default = "default_boost")]
    pub priority_boost: f64,
    /// Keep a missed task away from the interval it was missed in
    #[serde(default = "default_true")]
    pub avoid_missed_intervals: bool,
    /// Give up on a task after this many misses
    #[serde(default)]
    pub max_reentries: Option<u32>,
}

fn default_boost() -> f64 {
    1.25
}
fn default_true() -> bool {
    true
}

impl Default for ReentryPolicy {
    fn default() -> Self {
        Self {
            priority_boost: default_boost(),
            avoid_missed_intervals: true,
            max_reentries: None,
        }
    }
}

impl ReentryPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.priority_boost.is_finite() || self.priority_boost <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "reentry.priority_boost".into(),
                message: format!("{} must be finite and positive", self.priority_boost),
            });
        }
        Ok(())
    }

    /// Whether a task missed `missed_count` times may come back.
    pub fn allows_reentry(&self, missed_count: u32) -> bool {
        self.max_reentries.map_or(true, |max| missed_count <= max)
    }
}

/// Strategy for tasks a solve could not place.
pub trait RelaxationPolicy: Send + Sync {
    /// Replacement tasks for `task`, or `None` to leave it unscheduled.
    fn relax(&self, task: &Task, granularity: Granularity) -> Option<Vec<Task>>;
}

/// Leave unplaceable tasks as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRelaxation;

impl RelaxationPolicy for NoRelaxation {
    fn relax(&self, _: &Task, _: Granularity) -> Option<Vec<Task>> {
        None
    }
}

/// Split an unplaceable task into ordered chunks of at most `chunk_minutes`.
///
/// Chunks share the parent's window, priority and category. They are named
/// `<parent>#<n>` starting at 1. A chunk is never split again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitIntoChunks {
    pub chunk_minutes: u32,
}

impl SplitIntoChunks {
    pub fn new(chunk_minutes: u32) -> Self {
        Self { chunk_minutes }
    }
}

impl RelaxationPolicy for SplitIntoChunks {
    fn relax(&self, task: &Task, granularity: Granularity) -> Option<Vec<Task>> {
        if task.parent_id.is_some()
            || self.chunk_minutes == 0
            || self.chunk_minutes % granularity.minutes() != 0
            || self.chunk_minutes >= task.duration_minutes
        {
            return None;
        }

        let total = task.duration_minutes.div_ceil(self.chunk_minutes);
        let mut chunks = Vec::with_capacity(total as usize);
        let mut remaining = task.duration_minutes;
        for segment in 1..=total {
            let minutes = remaining.min(self.chunk_minutes);
            chunks.push(task.chunk(
                format!("{}#{}", task.id, segment),
                format!("{} ({}/{})", task.label, segment, total),
                minutes,
                segment,
            ));
            remaining -= minutes;
        }
        Some(chunks)
    }
}
