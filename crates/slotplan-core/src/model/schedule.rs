//! Solve output.
//!
//! A Schedule is a value: every solve builds a new one and callers replace
//! the previous one wholesale.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::event::FixedEvent;
use super::slot::{TimeRange, TimeSlot};

/// Whether the search proved its result optimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveOptimality {
    /// Search space exhausted
    Optimal,
    /// Time or node budget ran out; best assignment found so far
    BudgetExhausted,
}

/// One task placed on the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub task_id: String,
    pub label: String,
    pub slot: TimeSlot,
    /// Utility reported for this placement
    pub score: f64,
    /// Utility multiplied by the task's priority weight
    pub weighted_score: f64,
    /// Carried over from a previous schedule because it was already running
    #[serde(default)]
    pub locked: bool,
}

/// Conflict-free assignment of tasks for one horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub horizon: TimeRange,
    /// Task id to placement
    pub assignments: BTreeMap<String, Assignment>,
    /// Fixed events inside the horizon, untouched
    pub fixed_events: Vec<FixedEvent>,
    /// Sum of placement utilities
    pub total_utility: f64,
    /// Sum of priority-weighted utilities (the maximized quantity)
    pub objective: f64,
    /// Tasks with no feasible slot
    pub unscheduled: BTreeSet<String>,
    pub optimality: SolveOptimality,
    /// (task, slot) pairs scored with the default because the oracle failed
    #[serde(default)]
    pub fallback_scores: usize,
}

impl Schedule {
    /// An empty schedule over `horizon`.
    pub fn empty(horizon: TimeRange, fixed_events: Vec<FixedEvent>) -> Self {
        Self {
            horizon,
            assignments: BTreeMap::new(),
            fixed_events,
            total_utility: 0.0,
            objective: 0.0,
            unscheduled: BTreeSet::new(),
            optimality: SolveOptimality::Optimal,
            fallback_scores: 0,
        }
    }

    pub fn slot_of(&self, task_id: &str) -> Option<&TimeSlot> {
        self.assignments.get(task_id).map(|a| &a.slot)
    }

    pub fn is_scheduled(&self, task_id: &str) -> bool {
        self.assignments.contains_key(task_id)
    }

    pub fn scheduled_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_optimal(&self) -> bool {
        self.optimality == SolveOptimality::Optimal
    }

    /// Whether some utilities came from the default score.
    pub fn is_degraded(&self) -> bool {
        self.fallback_scores > 0
    }

    /// Assignments in calendar order.
    pub fn ordered(&self) -> Vec<&Assignment> {
        let mut list: Vec<&Assignment> = self.assignments.values().collect();
        list.sort_by(|a, b| a.slot.start.cmp(&b.slot.start).then_with(|| a.task_id.cmp(&b.task_id)));
        list
    }

    /// Pairs of ids whose intervals overlap. Empty for any solver output.
    pub fn conflicts(&self) -> Vec<(String, String)> {
        let mut items: Vec<(&str, &TimeSlot)> = self
            .assignments
            .values()
            .map(|a| (a.task_id.as_str(), &a.slot))
            .chain(self.fixed_events.iter().map(|e| (e.id.as_str(), &e.slot)))
            .collect();
        items.sort_by_key(|(_, slot)| slot.start);

        let mut found = Vec::new();
        for (i, (id_a, a)) in items.iter().enumerate() {
            for (id_b, b) in &items[i + 1..] {
                if b.start >= a.end {
                    break;
                }
                if a.overlaps(b) {
                    found.push((id_a.to_string(), id_b.to_string()));
                }
            }
        }
        found
    }
}
