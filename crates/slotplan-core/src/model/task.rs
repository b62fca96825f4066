//! Movable tasks and their status lifecycle.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::slot::{Granularity, TimeSlot};
use crate::error::ValidationError;

/// Task status.
///
/// ```text
///   PENDING ──solve──> SCHEDULED ──time passes──> COMPLETED
///     │  ^                 │
///     │  └──re-entry── MISSED <──flagged not done──┘
///     └──window elapsed──> MISSED
/// ```
///
/// Valid transitions:
/// - PENDING → SCHEDULED (placed by a solve)
/// - PENDING → PENDING (left unscheduled by a solve)
/// - PENDING → MISSED (window elapsed)
/// - SCHEDULED → SCHEDULED (moved by a re-solve)
/// - SCHEDULED → PENDING (dropped by a re-solve)
/// - SCHEDULED → COMPLETED (done or assumed done)
/// - SCHEDULED → MISSED (flagged not done)
/// - MISSED → PENDING (re-entry with a narrowed window)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Scheduled,
    Missed,
    Completed,
}

impl TaskStatus {
    /// Check if a transition is valid.
    pub fn can_transition_to(&self, to: &TaskStatus) -> bool {
        match self {
            TaskStatus::Pending => matches!(
                to,
                TaskStatus::Pending | TaskStatus::Scheduled | TaskStatus::Missed
            ),
            TaskStatus::Scheduled => true,
            TaskStatus::Missed => matches!(to, TaskStatus::Pending | TaskStatus::Missed),
            TaskStatus::Completed => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Missed => "missed",
            TaskStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Error returned when an invalid status transition is attempted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskTransitionError {
    pub task_id: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

impl fmt::Display for TaskTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid status transition for '{}': {} → {}",
            self.task_id, self.from, self.to
        )
    }
}

impl std::error::Error for TaskTransitionError {}

/// A movable unit of work.
///
/// Defining attributes are public. Status and the assigned slot change only
/// through the transition methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: String,
    /// Human label
    pub label: String,
    /// Required duration in minutes
    pub duration_minutes: u32,
    /// Earliest allowed start
    pub earliest_start: DateTime<Utc>,
    /// Latest allowed end
    pub latest_end: DateTime<Utc>,
    /// Objective multiplier, strictly positive
    #[serde(default = "default_priority")]
    pub priority_weight: f64,
    /// Category used for time-of-day preferences
    #[serde(default)]
    pub category: Option<String>,
    /// Parent task id when this task is a chunk of a split task
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Order of this chunk under its parent
    #[serde(default)]
    pub segment: Option<u32>,
    #[serde(default)]
    status: TaskStatus,
    #[serde(default)]
    assigned: Option<TimeSlot>,
    #[serde(default)]
    missed_count: u32,
}

fn default_priority() -> f64 {
    1.0
}

impl Task {
    /// Create a pending task, rejecting durations that do not fit the window.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        duration_minutes: u32,
        earliest_start: DateTime<Utc>,
        latest_end: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let task = Task {
            id: id.into(),
            label: label.into(),
            duration_minutes,
            earliest_start,
            latest_end,
            priority_weight: default_priority(),
            category: None,
            parent_id: None,
            segment: None,
            status: TaskStatus::Pending,
            assigned: None,
            missed_count: 0,
        };
        task.validate()?;
        Ok(task)
    }

    pub fn with_priority(mut self, weight: f64) -> Self {
        self.priority_weight = weight;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// A fresh pending piece of this task carrying `segment` under it.
    ///
    /// The piece inherits the window, priority and category.
    pub fn chunk(
        &self,
        id: impl Into<String>,
        label: impl Into<String>,
        duration_minutes: u32,
        segment: u32,
    ) -> Task {
        Task {
            id: id.into(),
            label: label.into(),
            duration_minutes,
            earliest_start: self.earliest_start,
            latest_end: self.latest_end,
            priority_weight: self.priority_weight,
            category: self.category.clone(),
            parent_id: Some(self.id.clone()),
            segment: Some(segment),
            status: TaskStatus::Pending,
            assigned: None,
            missed_count: 0,
        }
    }

    /// Check the construction invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "task.id".into(),
                message: "must be non-empty".into(),
            });
        }
        if self.duration_minutes == 0 {
            return Err(ValidationError::InvalidValue {
                field: format!("task[{}].duration_minutes", self.id),
                message: "must be positive".into(),
            });
        }
        if !self.priority_weight.is_finite() || self.priority_weight <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: format!("task[{}].priority_weight", self.id),
                message: format!("{} must be finite and positive", self.priority_weight),
            });
        }
        if self.earliest_start >= self.latest_end {
            return Err(ValidationError::InvalidTimeRange {
                start: self.earliest_start,
                end: self.latest_end,
            });
        }
        let window = self.window_minutes();
        if self.duration_minutes as i64 > window {
            return Err(ValidationError::DurationExceedsWindow {
                task_id: self.id.clone(),
                duration_minutes: self.duration_minutes as i64,
                window_minutes: window,
            });
        }
        Ok(())
    }

    /// Check that the duration is a whole number of quanta.
    pub fn validate_granularity(&self, granularity: Granularity) -> Result<(), ValidationError> {
        if !granularity.divides(self.duration()) {
            return Err(ValidationError::InvalidValue {
                field: format!("task[{}].duration_minutes", self.id),
                message: format!(
                    "{} is not a multiple of the {}-minute granularity",
                    self.duration_minutes,
                    granularity.minutes()
                ),
            });
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.duration_minutes as i64)
    }

    pub fn window_minutes(&self) -> i64 {
        (self.latest_end - self.earliest_start).num_minutes()
    }

    /// Whether `slot` lies within `[earliest_start, latest_end)`.
    pub fn window_contains(&self, slot: &TimeSlot) -> bool {
        self.earliest_start <= slot.start && slot.end <= self.latest_end
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn assigned(&self) -> Option<&TimeSlot> {
        self.assigned.as_ref()
    }

    /// How many times this task has been missed.
    pub fn missed_count(&self) -> u32 {
        self.missed_count
    }

    fn transition_to(&mut self, to: TaskStatus) -> Result<(), TaskTransitionError> {
        if !self.status.can_transition_to(&to) {
            return Err(TaskTransitionError {
                task_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Record a placement from a solve.
    pub fn mark_scheduled(&mut self, slot: TimeSlot) -> Result<(), TaskTransitionError> {
        self.transition_to(TaskStatus::Scheduled)?;
        self.assigned = Some(slot);
        Ok(())
    }

    /// Record that a solve left this task without a slot.
    pub fn mark_unscheduled(&mut self) -> Result<(), TaskTransitionError> {
        self.transition_to(TaskStatus::Pending)?;
        self.assigned = None;
        Ok(())
    }

    /// Mark done. Only a scheduled task can complete; the slot is kept as history.
    pub fn mark_completed(&mut self) -> Result<(), TaskTransitionError> {
        if self.status != TaskStatus::Scheduled {
            return Err(TaskTransitionError {
                task_id: self.id.clone(),
                from: self.status,
                to: TaskStatus::Completed,
            });
        }
        self.transition_to(TaskStatus::Completed)
    }

    /// Mark missed. Returns the slot the task had been assigned, if any.
    pub fn mark_missed(&mut self) -> Result<Option<TimeSlot>, TaskTransitionError> {
        self.transition_to(TaskStatus::Missed)?;
        self.missed_count += 1;
        Ok(self.assigned.take())
    }

    /// Put a missed task back in the pool with its window narrowed to
    /// `[earliest, latest_end)` and its priority multiplied by `boost`.
    pub fn reenter(
        &mut self,
        earliest: DateTime<Utc>,
        boost: f64,
    ) -> Result<(), TaskTransitionError> {
        if self.status != TaskStatus::Missed {
            return Err(TaskTransitionError {
                task_id: self.id.clone(),
                from: self.status,
                to: TaskStatus::Pending,
            });
        }
        self.transition_to(TaskStatus::Pending)?;
        self.earliest_start = self.earliest_start.max(earliest);
        self.priority_weight *= boost;
        Ok(())
    }

    /// Whether a task narrowed to start at `from` could still fit.
    pub fn fits_after(&self, from: DateTime<Utc>) -> bool {
        let start = self.earliest_start.max(from);
        start + self.duration() <= self.latest_end
    }
}
