use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use slotplan_core::{RescheduleOutcome, Rescheduler, SplitIntoChunks, Task, TaskPool};
use std::path::{Path, PathBuf};

use super::{config, render_schedule, scorer, Problem};

#[derive(Args)]
pub struct RescheduleArgs {
    /// Problem file (.toml or .json); tasks may carry status and slot
    #[arg(long, short)]
    input: PathBuf,
    /// Current time (RFC 3339)
    #[arg(long)]
    now: DateTime<Utc>,
    /// Task that was not done (repeatable)
    #[arg(long = "missed")]
    missed: Vec<String>,
    /// Task confirmed done (repeatable)
    #[arg(long = "done")]
    done: Vec<String>,
    /// Split tasks that cannot be placed into chunks of this many minutes
    #[arg(long)]
    split_minutes: Option<u32>,
    /// Score every placement with the configured default score
    #[arg(long)]
    uniform: bool,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Output<'a> {
    #[serde(flatten)]
    outcome: &'a RescheduleOutcome,
    tasks: Vec<&'a Task>,
}

pub fn run(
    args: RescheduleArgs,
    config_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load(config_path)?;
    let problem = Problem::load(&args.input)?;
    let scorer = scorer(args.uniform, config.solver.default_score);

    let rescheduler = Rescheduler::new(&config)?;
    let rescheduler = match args.split_minutes {
        Some(minutes) => rescheduler.with_relaxation(SplitIntoChunks::new(minutes)),
        None => rescheduler,
    };

    let mut pool = TaskPool::new(problem.horizon, problem.tasks)?;
    if !pool.has_assignments() {
        let start = pool.horizon().start;
        tracing::info!(at = %start, "no prior plan in input, planning from horizon start");
        rescheduler.reschedule(
            &mut pool,
            &problem.fixed_events,
            &problem.preferences,
            start,
            scorer.as_ref(),
        )?;
    }

    for id in &args.done {
        pool.mark_completed(id)?;
    }
    for id in &args.missed {
        pool.mark_missed(id)?;
    }

    let outcome = rescheduler.reschedule(
        &mut pool,
        &problem.fixed_events,
        &problem.preferences,
        args.now,
        scorer.as_ref(),
    )?;

    if args.json {
        let output = Output {
            outcome: &outcome,
            tasks: pool.tasks().collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let report = &outcome.report;
    for (label, ids) in [
        ("Completed", &report.completed),
        ("Missed", &report.missed),
        ("Re-entered", &report.reentered),
        ("Given up", &report.unschedulable),
    ] {
        if !ids.is_empty() {
            println!("{label}: {}", ids.join(", "));
        }
    }
    for (parent, chunks) in &report.split {
        println!("Split {parent} into {}", chunks.join(", "));
    }
    print!("{}", render_schedule(&outcome.schedule));
    Ok(())
}
