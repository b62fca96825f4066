pub mod config;
pub mod reschedule;
pub mod solve;

use serde::{Deserialize, Serialize};
use slotplan_core::{
    ConstantScorer, FixedEvent, PreferenceScorer, Preferences, Schedule, ScoringFunction, Task,
    TimeRange,
};
use std::fmt::Write as _;
use std::path::Path;

/// Everything one solve needs, read from a `.toml` or `.json` file.
///
/// Timestamps are RFC 3339 strings (quoted in TOML).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub horizon: TimeRange,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub fixed_events: Vec<FixedEvent>,
    #[serde(default = "Preferences::default")]
    pub preferences: Preferences,
}

impl Problem {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let problem = if is_json {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        Ok(problem)
    }
}

/// Built-in preference prior, or the default score everywhere.
pub fn scorer(uniform: bool, default_score: f64) -> Box<dyn ScoringFunction> {
    if uniform {
        Box::new(ConstantScorer(default_score))
    } else {
        Box::new(PreferenceScorer)
    }
}

/// Human-readable schedule: tasks and fixed events in calendar order.
pub fn render_schedule(schedule: &Schedule) -> String {
    let mut out = String::new();
    let status = if schedule.is_optimal() {
        "optimal"
    } else {
        "budget exhausted"
    };
    let _ = writeln!(
        out,
        "Schedule {} - {} ({status})",
        schedule.horizon.start.format("%Y-%m-%d %H:%M"),
        schedule.horizon.end.format("%Y-%m-%d %H:%M"),
    );

    let mut rows: Vec<(chrono::DateTime<chrono::Utc>, String)> = Vec::new();
    for a in schedule.ordered() {
        let lock = if a.locked { " (running)" } else { "" };
        rows.push((
            a.slot.start,
            format!(
                "  {}-{}  task   {:<16} {}  score {:.2}{lock}",
                a.slot.start.format("%a %H:%M"),
                a.slot.end.format("%H:%M"),
                a.task_id,
                a.label,
                a.score,
            ),
        ));
    }
    for e in &schedule.fixed_events {
        rows.push((
            e.slot.start,
            format!(
                "  {}-{}  fixed  {:<16} {}",
                e.slot.start.format("%a %H:%M"),
                e.slot.end.format("%H:%M"),
                e.id,
                e.label,
            ),
        ));
    }
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    for (_, row) in rows {
        let _ = writeln!(out, "{row}");
    }

    if !schedule.unscheduled.is_empty() {
        let ids: Vec<&str> = schedule.unscheduled.iter().map(String::as_str).collect();
        let _ = writeln!(out, "Unscheduled: {}", ids.join(", "));
    }
    let _ = writeln!(
        out,
        "Total utility: {:.2} (objective {:.2})",
        schedule.total_utility, schedule.objective
    );
    if schedule.is_degraded() {
        let _ = writeln!(
            out,
            "warning: {} placements scored with the default score",
            schedule.fallback_scores
        );
    }
    out
}
