use clap::Subcommand;
use slotplan_core::{Config, CoreError};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Dot-separated key (e.g. "solver.granularity_minutes")
        key: String,
    },
    /// Set a config value
    Set {
        /// Dot-separated key
        key: String,
        /// New value ("none" clears an optional value)
        value: String,
    },
    /// Show the whole config as TOML
    Show,
    /// Reset config to defaults
    Reset,
}

/// Load from `path` when given (defaults if it does not exist yet), else
/// from the default location.
pub fn load(path: Option<&Path>) -> Result<Config, CoreError> {
    match path {
        Some(p) if p.exists() => Config::load_from(p),
        Some(_) => Ok(Config::default()),
        None => Config::load(),
    }
}

fn save(config: &Config, path: Option<&Path>) -> Result<(), CoreError> {
    match path {
        Some(p) => config.save_to(p),
        None => config.save(),
    }
}

pub fn run(action: ConfigAction, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = load(path)?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = load(path)?;
            config.set(&key, &value)?;
            save(&config, path)?;
            println!("ok");
        }
        ConfigAction::Show => {
            let config = load(path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Reset => {
            save(&Config::default(), path)?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
