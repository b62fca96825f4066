use clap::Args;
use slotplan_core::Solver;
use std::path::{Path, PathBuf};

use super::{config, render_schedule, scorer, Problem};

#[derive(Args)]
pub struct SolveArgs {
    /// Problem file (.toml or .json)
    #[arg(long, short)]
    input: PathBuf,
    /// Score every placement with the configured default score
    #[arg(long)]
    uniform: bool,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: SolveArgs, config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load(config_path)?;
    let problem = Problem::load(&args.input)?;
    let solver = Solver::new(config.solver.clone())?;
    let scorer = scorer(args.uniform, config.solver.default_score);

    let schedule = solver.solve(
        &problem.tasks,
        &problem.fixed_events,
        &problem.preferences,
        problem.horizon,
        scorer.as_ref(),
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&schedule)?);
    } else {
        print!("{}", render_schedule(&schedule));
    }
    Ok(())
}
