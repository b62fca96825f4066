//! Constraint solver.
//!
//! Places movable tasks on a discrete grid around fixed events so that the
//! sum of priority-weighted utilities is maximal:
//! - Candidate starts come from the task window, fixed events and preferences
//! - Utilities come from a [`ScoringFunction`], memoized per solve
//! - An exact branch-and-bound picks the assignment, optionally under a budget
//!
//! The same inputs always produce the same Schedule unless a wall-clock
//! budget cuts the search short.

mod grid;
mod search;

use std::collections::BTreeSet;
use std::time::Instant;

use crate::config::SolverConfig;
use crate::error::{CoreError, Result, ValidationError};
use crate::model::{
    validate_fixed_events, Assignment, FixedEvent, Granularity, Preferences, Schedule,
    SolveOptimality, Task, TimeRange, TimeSlot,
};
use crate::scoring::{ConstantScorer, ScoreCache, ScoringFunction};

use grid::Grid;
use search::{Candidate, DailyCap, SearchLimits, SearchTask};

/// Longest horizon a single solve accepts.
pub const MAX_HORIZON_DAYS: i64 = 366;

/// Allocation solver.
#[derive(Debug, Clone)]
pub struct Solver {
    config: SolverConfig,
    granularity: Granularity,
}

impl Solver {
    /// Create a solver, rejecting an invalid configuration.
    pub fn new(config: SolverConfig) -> Result<Self> {
        config.validate()?;
        let granularity = config.granularity()?;
        Ok(Self {
            config,
            granularity,
        })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Solve with every placement worth the configured default score.
    pub fn solve_uniform(
        &self,
        tasks: &[Task],
        fixed_events: &[FixedEvent],
        preferences: &Preferences,
        horizon: TimeRange,
    ) -> Result<Schedule> {
        let scorer = ConstantScorer(self.config.default_score);
        self.solve(tasks, fixed_events, preferences, horizon, &scorer)
    }

    /// Compute a conflict-free schedule of `tasks` within `horizon`.
    ///
    /// Every task passed in is a candidate regardless of its status. Tasks
    /// that cannot be placed are listed in `Schedule::unscheduled`, or fail
    /// the solve with [`CoreError::Infeasible`] when partial schedules are
    /// disabled.
    pub fn solve(
        &self,
        tasks: &[Task],
        fixed_events: &[FixedEvent],
        preferences: &Preferences,
        horizon: TimeRange,
        scorer: &dyn ScoringFunction,
    ) -> Result<Schedule> {
        self.solve_around(tasks, &[], fixed_events, preferences, horizon, scorer)
    }

    /// Like [`Solver::solve`], next to task time already taken outside
    /// this solve (a task that is running, for instance).
    ///
    /// `occupied` intervals keep the minimum gap to every placed task and
    /// count toward the daily cap of the local day they fall on. They are
    /// not part of the returned Schedule.
    pub fn solve_around(
        &self,
        tasks: &[Task],
        occupied: &[TimeSlot],
        fixed_events: &[FixedEvent],
        preferences: &Preferences,
        horizon: TimeRange,
        scorer: &dyn ScoringFunction,
    ) -> Result<Schedule> {
        let started = Instant::now();
        self.validate_inputs(tasks, fixed_events, preferences, &horizon)?;

        let in_horizon: Vec<FixedEvent> = fixed_events
            .iter()
            .filter(|e| horizon.overlaps(&e.slot))
            .cloned()
            .collect();

        let mut order: Vec<&Task> = tasks.iter().collect();
        order.sort_by(|a, b| a.id.cmp(&b.id));

        let Some(grid_range) = horizon.aligned_to(self.granularity) else {
            let mut schedule = Schedule::empty(horizon, in_horizon);
            schedule.unscheduled = order.iter().map(|t| t.id.clone()).collect();
            return self.finish(schedule);
        };

        let grid = Grid::build(&grid_range, self.granularity, &in_horizon, preferences);
        let mut cache = ScoreCache::new(scorer, preferences, self.config.default_score);

        let gap_minutes = self
            .config
            .min_gap_between_tasks_minutes
            .max(preferences.min_gap_minutes);
        let gap = gap_minutes.div_ceil(self.granularity.minutes()) as usize;

        let taken: Vec<(i64, i64)> = occupied.iter().map(|slot| grid.span_of(slot)).collect();
        let clashes_with_taken = |start: usize, quanta: usize| {
            let (lo, hi) = (start as i64, (start + quanta) as i64);
            let gap = gap as i64;
            taken
                .iter()
                .any(|&(first, end)| lo < end + gap && hi + gap > first)
        };

        let search_tasks: Vec<SearchTask> = order
            .iter()
            .map(|task| {
                let quanta = self.granularity.quanta(task.duration());
                let candidates = grid
                    .feasible_starts(task, quanta)
                    .into_iter()
                    .filter(|&start| !clashes_with_taken(start, quanta))
                    .filter_map(|start| {
                        let score = cache.score(task, &grid.slot(start, quanta));
                        // -inf marks an infeasible placement
                        if !score.is_finite() {
                            return None;
                        }
                        let score = score.max(0.0);
                        Some(Candidate {
                            start,
                            score,
                            weighted: score * task.priority_weight,
                        })
                    })
                    .collect();
                SearchTask::new(quanta, task.priority_weight, candidates)
            })
            .collect();

        let mut already_used = vec![0; grid.days()];
        for slot in occupied {
            let mut at = slot.start;
            while at < slot.end {
                if let Some(day) = grid.day_index(preferences.local_date(at)) {
                    already_used[day] += 1;
                }
                at += self.granularity.duration();
            }
        }
        let cap = preferences.max_task_minutes_per_day.map(|max| DailyCap {
            day_of: grid.day_of(),
            days: grid.days(),
            limit: (max / self.granularity.minutes()) as usize,
            already_used: &already_used,
        });

        let limits = SearchLimits {
            deadline: self.config.time_budget().map(|b| started + b),
            max_nodes: self.config.max_search_nodes,
        };

        let outcome = search::search(&search_tasks, grid.len(), gap, cap, limits);

        let mut schedule = Schedule::empty(horizon, in_horizon);
        for ((task, st), choice) in order.iter().zip(&search_tasks).zip(&outcome.choice) {
            match choice {
                Some(index) => {
                    let cand = st.candidates[*index];
                    schedule.total_utility += cand.score;
                    schedule.assignments.insert(
                        task.id.clone(),
                        Assignment {
                            task_id: task.id.clone(),
                            label: task.label.clone(),
                            slot: grid.slot(cand.start, st.quanta),
                            score: cand.score,
                            weighted_score: cand.weighted,
                            locked: false,
                        },
                    );
                }
                None => {
                    schedule.unscheduled.insert(task.id.clone());
                }
            }
        }
        schedule.objective = outcome.objective;
        schedule.fallback_scores = cache.fallbacks();
        if outcome.exhausted {
            schedule.optimality = SolveOptimality::BudgetExhausted;
        }

        tracing::debug!(
            tasks = tasks.len(),
            scheduled = schedule.scheduled_count(),
            unscheduled = schedule.unscheduled.len(),
            objective = schedule.objective,
            nodes = outcome.nodes,
            oracle_calls = cache.oracle_calls(),
            optimal = !outcome.exhausted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "solve finished"
        );

        self.finish(schedule)
    }

    fn finish(&self, schedule: Schedule) -> Result<Schedule> {
        if schedule.fallback_scores > 0 {
            tracing::warn!(
                fallbacks = schedule.fallback_scores,
                default_score = self.config.default_score,
                "scoring oracle unavailable, used default score"
            );
        }
        if !self.config.allow_partial_schedules && !schedule.unscheduled.is_empty() {
            return Err(CoreError::Infeasible {
                task_ids: schedule.unscheduled.iter().cloned().collect(),
            });
        }
        Ok(schedule)
    }

    fn validate_inputs(
        &self,
        tasks: &[Task],
        fixed_events: &[FixedEvent],
        preferences: &Preferences,
        horizon: &TimeRange,
    ) -> Result<(), ValidationError> {
        if horizon.start >= horizon.end {
            return Err(ValidationError::InvalidTimeRange {
                start: horizon.start,
                end: horizon.end,
            });
        }
        if horizon.duration() > chrono::Duration::days(MAX_HORIZON_DAYS) {
            return Err(ValidationError::InvalidValue {
                field: "horizon".into(),
                message: format!("longer than {MAX_HORIZON_DAYS} days"),
            });
        }
        preferences.validate()?;
        validate_fixed_events(fixed_events)?;

        let mut seen = BTreeSet::new();
        for task in tasks {
            task.validate()?;
            task.validate_granularity(self.granularity)?;
            if !seen.insert(task.id.as_str()) {
                return Err(ValidationError::DuplicateId(task.id.clone()));
            }
        }
        Ok(())
    }
}
