//! Adaptive rescheduler.
//!
//! Keeps a [`TaskPool`] consistent with the passage of time and re-plans the
//! residual horizon when reality diverges from the plan. Time-based
//! transitions are evaluated lazily against a caller-supplied `now`:
//!
//! - a scheduled task whose slot has ended is assumed completed
//! - a pending task whose window has elapsed is missed
//! - a missed task re-enters with its window narrowed to start at `now`
//!   and its priority boosted, or is given up on when it no longer fits
//!
//! Tasks already running at `now` keep their slot. Elapsed time, completed
//! work and fixed events are never revised.

mod policy;
mod pool;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::Config;
use crate::error::{CoreError, Result, ScoreError};
use crate::model::{
    Assignment, FixedEvent, Preferences, Schedule, Task, TaskStatus, TimeRange, TimeSlot,
};
use crate::scoring::ScoringFunction;
use crate::solver::Solver;

pub use policy::{NoRelaxation, ReentryPolicy, RelaxationPolicy, SplitIntoChunks};
pub use pool::TaskPool;

/// Transitions applied while bringing a pool up to `now`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Scheduled tasks whose slot ended, assumed done
    pub completed: Vec<String>,
    /// Pending tasks whose window elapsed
    pub missed: Vec<String>,
    /// Missed tasks put back with a narrowed window
    pub reentered: Vec<String>,
    /// Missed tasks given up on
    pub unschedulable: Vec<String>,
    /// Tasks replaced by chunks, with the chunk ids
    #[serde(default)]
    pub split: BTreeMap<String, Vec<String>>,
}

impl StatusReport {
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
            && self.missed.is_empty()
            && self.reentered.is_empty()
            && self.unschedulable.is_empty()
            && self.split.is_empty()
    }
}

/// Result of a successful reschedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduleOutcome {
    pub schedule: Schedule,
    pub report: StatusReport,
}

/// Drives a [`TaskPool`] through time and re-solves it.
pub struct Rescheduler {
    solver: Solver,
    policy: ReentryPolicy,
    relaxation: Box<dyn RelaxationPolicy>,
}

impl Rescheduler {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            solver: Solver::new(config.solver.clone())?,
            policy: config.reentry.clone(),
            relaxation: Box::new(NoRelaxation),
        })
    }

    /// Use `relaxation` for tasks a solve cannot place.
    pub fn with_relaxation(mut self, relaxation: impl RelaxationPolicy + 'static) -> Self {
        self.relaxation = Box::new(relaxation);
        self
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn policy(&self) -> &ReentryPolicy {
        &self.policy
    }

    /// Apply the time-based transitions due at `now`. Does not solve.
    pub fn status(&self, pool: &mut TaskPool, now: DateTime<Utc>) -> StatusReport {
        let mut report = StatusReport::default();
        let resume_at = self.solver.granularity().ceil(now);
        let given_up = pool.unschedulable().clone();
        let mut newly_given_up = Vec::new();

        for task in pool.tasks_mut() {
            match task.status() {
                TaskStatus::Scheduled => {
                    let ended = task.assigned().is_some_and(|slot| slot.end <= now);
                    if ended && task.mark_completed().is_ok() {
                        tracing::info!(task_id = %task.id, "slot elapsed, task assumed completed");
                        report.completed.push(task.id.clone());
                    }
                }
                TaskStatus::Pending if task.latest_end <= now => {
                    if task.mark_missed().is_ok() {
                        tracing::info!(task_id = %task.id, "window elapsed, task missed");
                        report.missed.push(task.id.clone());
                    }
                }
                _ => {}
            }

            if task.status() != TaskStatus::Missed || given_up.contains(&task.id) {
                continue;
            }
            let allowed = self.policy.allows_reentry(task.missed_count());
            if allowed
                && task.fits_after(resume_at)
                && task.reenter(resume_at, self.policy.priority_boost).is_ok()
            {
                tracing::info!(
                    task_id = %task.id,
                    earliest_start = %task.earliest_start,
                    priority = task.priority_weight,
                    "missed task re-entered"
                );
                report.reentered.push(task.id.clone());
            } else {
                tracing::info!(
                    task_id = %task.id,
                    missed_count = task.missed_count(),
                    "missed task no longer schedulable"
                );
                newly_given_up.push(task.id.clone());
            }
        }

        for id in &newly_given_up {
            pool.mark_unschedulable(id);
        }
        report.unschedulable = newly_given_up;
        report
    }

    /// Bring `pool` up to `now` and re-plan the residual horizon.
    ///
    /// Works on a copy of the pool; `pool` is replaced only when the whole
    /// operation succeeds.
    pub fn reschedule(
        &self,
        pool: &mut TaskPool,
        fixed_events: &[FixedEvent],
        preferences: &Preferences,
        now: DateTime<Utc>,
        scorer: &dyn ScoringFunction,
    ) -> Result<RescheduleOutcome> {
        let mut work = pool.clone();
        let mut report = self.status(&mut work, now);

        let mut locked = Vec::new();
        let mut movable = Vec::new();
        for task in work.tasks() {
            match (task.status(), task.assigned()) {
                (TaskStatus::Scheduled, Some(slot)) if slot.start <= now => {
                    locked.push(self.locked_assignment(&work, task, *slot));
                }
                (TaskStatus::Scheduled, _) | (TaskStatus::Pending, _) => {
                    movable.push(task.clone())
                }
                _ => {}
            }
        }

        let running: Vec<TimeSlot> = locked.iter().map(|a| a.slot).collect();

        let avoid = AvoidMissed {
            inner: scorer,
            intervals: if self.policy.avoid_missed_intervals {
                work.all_missed_intervals().clone()
            } else {
                BTreeMap::new()
            },
        };

        // Elapsed events are history and take no part in the re-plan.
        let upcoming: Vec<FixedEvent> = fixed_events
            .iter()
            .filter(|e| !e.has_elapsed(now))
            .cloned()
            .collect();

        let horizon = work.horizon();
        let residual = horizon.residual(now, self.solver.granularity());
        let solve = |tasks: &[Task]| {
            self.solve_residual(tasks, &running, &upcoming, preferences, horizon, residual, &avoid)
        };

        let first = match solve(&movable) {
            Ok(schedule) => Ok(schedule),
            Err(CoreError::Infeasible { task_ids }) => Err(task_ids),
            Err(err) => return Err(err),
        };
        let unplaced: Vec<String> = match &first {
            Ok(schedule) => schedule.unscheduled.iter().cloned().collect(),
            Err(task_ids) => task_ids.clone(),
        };

        let mut replacements: BTreeMap<String, Vec<Task>> = BTreeMap::new();
        for id in &unplaced {
            let Some(task) = movable.iter().find(|t| &t.id == id) else {
                continue;
            };
            if let Some(chunks) = self.relaxation.relax(task, self.solver.granularity()) {
                replacements.insert(id.clone(), chunks);
            }
        }

        let mut schedule = if replacements.is_empty() {
            first.map_err(|task_ids| CoreError::Infeasible { task_ids })?
        } else {
            movable.retain(|t| !replacements.contains_key(&t.id));
            for (parent, chunks) in replacements {
                work.remove(&parent);
                let ids = chunks.iter().map(|c| c.id.clone()).collect();
                for chunk in chunks {
                    work.insert(chunk.clone())?;
                    movable.push(chunk);
                }
                tracing::info!(task_id = %parent, "unplaceable task split into chunks");
                report.split.insert(parent, ids);
            }
            movable.sort_by(|a, b| a.id.cmp(&b.id));
            solve(&movable)?
        };

        for task in &movable {
            let entry = work.get_mut(&task.id)?;
            match schedule.slot_of(&task.id) {
                Some(slot) => entry.mark_scheduled(*slot)?,
                None => entry.mark_unscheduled()?,
            }
        }

        for assignment in locked {
            schedule.total_utility += assignment.score;
            schedule.objective += assignment.weighted_score;
            schedule
                .assignments
                .insert(assignment.task_id.clone(), assignment);
        }

        tracing::info!(
            now = %now,
            scheduled = schedule.scheduled_count(),
            unscheduled = schedule.unscheduled.len(),
            completed = report.completed.len(),
            reentered = report.reentered.len(),
            "reschedule finished"
        );

        work.set_last_schedule(schedule.clone());
        *pool = work;
        Ok(RescheduleOutcome { schedule, report })
    }

    fn solve_residual(
        &self,
        tasks: &[Task],
        running: &[TimeSlot],
        fixed_events: &[FixedEvent],
        preferences: &Preferences,
        horizon: TimeRange,
        residual: Option<TimeRange>,
        scorer: &dyn ScoringFunction,
    ) -> Result<Schedule> {
        if let Some(residual) = residual {
            return self.solver.solve_around(
                tasks,
                running,
                fixed_events,
                preferences,
                residual,
                scorer,
            );
        }

        // Nothing left of the horizon: every movable task stays unplaced.
        let in_horizon = fixed_events
            .iter()
            .filter(|e| horizon.overlaps(&e.slot))
            .cloned()
            .collect();
        let mut schedule = Schedule::empty(horizon, in_horizon);
        schedule.unscheduled = tasks.iter().map(|t| t.id.clone()).collect();
        if !self.solver.config().allow_partial_schedules && !schedule.unscheduled.is_empty() {
            return Err(CoreError::Infeasible {
                task_ids: schedule.unscheduled.into_iter().collect(),
            });
        }
        Ok(schedule)
    }

    /// Placement carried over for a task already running at `now`.
    fn locked_assignment(&self, pool: &TaskPool, task: &Task, slot: TimeSlot) -> Assignment {
        let previous = pool
            .last_schedule()
            .and_then(|s| s.assignments.get(&task.id))
            .filter(|a| a.slot == slot);
        let score = previous.map_or(self.solver.config().default_score, |a| a.score);
        Assignment {
            task_id: task.id.clone(),
            label: task.label.clone(),
            slot,
            score,
            weighted_score: score * task.priority_weight,
            locked: true,
        }
    }
}

/// Scorer that rules out the intervals a task (or its parent) was missed in.
struct AvoidMissed<'a> {
    inner: &'a dyn ScoringFunction,
    intervals: BTreeMap<String, Vec<TimeSlot>>,
}

impl ScoringFunction for AvoidMissed<'_> {
    fn score(
        &self,
        task: &Task,
        slot: &TimeSlot,
        preferences: &Preferences,
    ) -> Result<f64, ScoreError> {
        let owners = std::iter::once(task.id.as_str()).chain(task.parent_id.as_deref());
        for owner in owners {
            if let Some(missed) = self.intervals.get(owner) {
                if missed.iter().any(|m| m.overlaps(slot)) {
                    return Ok(f64::NEG_INFINITY);
                }
            }
        }
        self.inner.score(task, slot, preferences)
    }
}
