//! Task pool: the rescheduler's view of one planning horizon.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CoreError, Result, ValidationError};
use crate::model::{Schedule, Task, TaskStatus, TimeRange, TimeSlot};

/// Tasks of one horizon plus what the rescheduler remembers about them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPool {
    horizon: TimeRange,
    tasks: BTreeMap<String, Task>,
    #[serde(default)]
    last_schedule: Option<Schedule>,
    /// Intervals each task was missed in
    #[serde(default)]
    missed_intervals: BTreeMap<String, Vec<TimeSlot>>,
    /// Missed tasks that will not be resubmitted
    #[serde(default)]
    unschedulable: BTreeSet<String>,
}

impl TaskPool {
    /// Create a pool, rejecting invalid tasks and duplicate ids.
    ///
    /// Tasks may arrive in any status; a scheduled task must carry its slot.
    pub fn new(horizon: TimeRange, tasks: Vec<Task>) -> Result<Self> {
        if horizon.start >= horizon.end {
            return Err(ValidationError::InvalidTimeRange {
                start: horizon.start,
                end: horizon.end,
            }
            .into());
        }
        let mut pool = Self {
            horizon,
            tasks: BTreeMap::new(),
            last_schedule: None,
            missed_intervals: BTreeMap::new(),
            unschedulable: BTreeSet::new(),
        };
        for task in tasks {
            pool.insert(task)?;
        }
        Ok(pool)
    }

    /// Add a task to the pool.
    pub fn insert(&mut self, task: Task) -> Result<()> {
        task.validate()?;
        if task.status() == TaskStatus::Scheduled && task.assigned().is_none() {
            return Err(ValidationError::InvalidValue {
                field: format!("task[{}].assigned", task.id),
                message: "a scheduled task needs a slot".into(),
            }
            .into());
        }
        if self.tasks.contains_key(&task.id) {
            return Err(ValidationError::DuplicateId(task.id).into());
        }
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn horizon(&self) -> TimeRange {
        self.horizon
    }

    /// Tasks in id order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn last_schedule(&self) -> Option<&Schedule> {
        self.last_schedule.as_ref()
    }

    pub fn unschedulable(&self) -> &BTreeSet<String> {
        &self.unschedulable
    }

    /// Intervals `id` was missed in, oldest first.
    pub fn missed_intervals(&self, id: &str) -> &[TimeSlot] {
        self.missed_intervals
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether any task currently holds a slot.
    pub fn has_assignments(&self) -> bool {
        self.tasks.values().any(|t| t.assigned().is_some())
    }

    /// Flag a task as not done. Its slot, if any, is remembered.
    pub fn mark_missed(&mut self, id: &str) -> Result<()> {
        let task = self.get_mut(id)?;
        let slot = task.mark_missed()?;
        tracing::info!(task_id = id, "task flagged missed");
        if let Some(slot) = slot {
            self.missed_intervals
                .entry(id.to_string())
                .or_default()
                .push(slot);
        }
        Ok(())
    }

    /// Confirm a scheduled task as done.
    pub fn mark_completed(&mut self, id: &str) -> Result<()> {
        self.get_mut(id)?.mark_completed()?;
        tracing::info!(task_id = id, "task confirmed completed");
        Ok(())
    }

    pub(crate) fn all_missed_intervals(&self) -> &BTreeMap<String, Vec<TimeSlot>> {
        &self.missed_intervals
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Result<&mut Task> {
        self.tasks
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownTask(id.to_string()))
    }

    pub(crate) fn tasks_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.tasks.values_mut()
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Task> {
        self.tasks.remove(id)
    }

    pub(crate) fn mark_unschedulable(&mut self, id: &str) {
        self.unschedulable.insert(id.to_string());
    }

    pub(crate) fn set_last_schedule(&mut self, schedule: Schedule) {
        self.last_schedule = Some(schedule);
    }
}
