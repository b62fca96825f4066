use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "slotplan", version, about = "Task allocation solver and adaptive rescheduler")]
struct Cli {
    /// Use this config file instead of ~/.config/slotplan/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. "info", "slotplan_core=debug")
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a schedule for a problem file
    Solve(commands::solve::SolveArgs),
    /// Apply what happened and re-plan the rest of the horizon
    Reschedule(commands::reschedule::RescheduleArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Solve(args) => commands::solve::run(args, config_path),
        Commands::Reschedule(args) => commands::reschedule::run(args, config_path),
        Commands::Config { action } => commands::config::run(action, config_path),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
