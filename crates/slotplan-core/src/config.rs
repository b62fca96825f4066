//! Solver and rescheduler configuration.
//!
//! Stored as TOML at `~/.config/slotplan/config.toml`
//! (`SLOTPLAN_ENV=dev` selects `~/.config/slotplan-dev/`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, CoreError, Result};
use crate::model::Granularity;
use crate::rescheduler::ReentryPolicy;

/// Options recognized by the constraint solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Grid quantum in minutes
    #[serde(default = "default_granularity")]
    pub granularity_minutes: u32,
    /// Utility used when the scoring oracle is unavailable
    #[serde(default = "default_score")]
    pub default_score: f64,
    /// Minimum gap between consecutive tasks, combined with the preference gap
    #[serde(default)]
    pub min_gap_between_tasks_minutes: u32,
    /// Wall-clock budget for one solve; 0 disables it
    #[serde(default = "default_time_budget")]
    pub solve_time_budget_ms: u64,
    /// Search node budget for one solve
    #[serde(default)]
    pub max_search_nodes: Option<u64>,
    /// Return partial schedules instead of failing on an unplaceable task
    #[serde(default = "default_true")]
    pub allow_partial_schedules: bool,
}

fn default_granularity() -> u32 {
    15
}
fn default_score() -> f64 {
    0.5
}
fn default_time_budget() -> u64 {
    10_000
}
fn default_true() -> bool {
    true
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            granularity_minutes: default_granularity(),
            default_score: default_score(),
            min_gap_between_tasks_minutes: 0,
            solve_time_budget_ms: default_time_budget(),
            max_search_nodes: None,
            allow_partial_schedules: true,
        }
    }
}

impl SolverConfig {
    /// Check every option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let granularity = self.granularity()?;
        if !self.default_score.is_finite() || self.default_score < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "solver.default_score".into(),
                message: format!("{} must be finite and non-negative", self.default_score),
            });
        }
        if self.min_gap_between_tasks_minutes % granularity.minutes() != 0 {
            return Err(ConfigError::InvalidValue {
                key: "solver.min_gap_between_tasks_minutes".into(),
                message: format!(
                    "{} is not a multiple of the {}-minute granularity",
                    self.min_gap_between_tasks_minutes,
                    granularity.minutes()
                ),
            });
        }
        if self.max_search_nodes == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "solver.max_search_nodes".into(),
                message: "must be positive when set".into(),
            });
        }
        Ok(())
    }

    pub fn granularity(&self) -> Result<Granularity, ConfigError> {
        Granularity::new(self.granularity_minutes).map_err(|e| ConfigError::InvalidValue {
            key: "solver.granularity_minutes".into(),
            message: e.to_string(),
        })
    }

    pub fn time_budget(&self) -> Option<std::time::Duration> {
        (self.solve_time_budget_ms > 0)
            .then(|| std::time::Duration::from_millis(self.solve_time_budget_ms))
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub reentry: ReentryPolicy,
}

/// Returns `~/.config/slotplan[-dev]/`, creating it if needed.
pub fn config_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("SLOTPLAN_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("slotplan-dev")
    } else {
        base_dir.join("slotplan")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.solver.validate()?;
        self.reentry.validate()
    }

    fn path() -> Result<PathBuf> {
        Ok(config_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if no file exists.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            Ok(cfg)
        }
    }

    /// Load and validate a TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let cfg: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving. The result is validated.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json)?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

fn get_json_value_by_path<'a>(
    root: &'a serde_json::Value,
    key: &str,
) -> Option<&'a serde_json::Value> {
    if key.is_empty() {
        return None;
    }

    let mut current = root;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

fn set_json_value_by_path(root: &mut serde_json::Value, key: &str, value: &str) -> Result<()> {
    let unknown = || CoreError::Config(ConfigError::UnknownKey(key.to_string()));
    let invalid = |message: String| {
        CoreError::Config(ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        })
    };

    let mut parts = key.split('.').peekable();
    let mut current = root;
    while let Some(part) = parts.next() {
        if parts.peek().is_some() {
            current = current.get_mut(part).ok_or_else(unknown)?;
            continue;
        }

        let obj = current.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(part).ok_or_else(unknown)?;
        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
            ),
            // Optional fields serialize as null; accept numbers or "none".
            serde_json::Value::Null | serde_json::Value::Number(_) => {
                if value.eq_ignore_ascii_case("none") {
                    serde_json::Value::Null
                } else if let Ok(n) = value.parse::<u64>() {
                    serde_json::Value::Number(n.into())
                } else if let Ok(n) = value.parse::<f64>() {
                    serde_json::Number::from_f64(n)
                        .map(serde_json::Value::Number)
                        .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                } else {
                    return Err(invalid(format!("cannot parse '{value}' as number")));
                }
            }
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                serde_json::from_str(value)?
            }
            serde_json::Value::String(_) => serde_json::Value::String(value.into()),
        };
        obj.insert(part.to_string(), new_value);
        return Ok(());
    }

    Err(unknown())
}
