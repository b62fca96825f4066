//! Core error types for slotplan-core.
//!
//! Input problems are surfaced immediately and never repaired. Oracle
//! failures are recovered inside a solve and never reach this type;
//! budget expiry is reported on the Schedule instead of as an error.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::TaskTransitionError;

/// Core error type for slotplan-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed task, fixed event, horizon or preference input
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// Some tasks could not be placed and partial schedules are disabled
    #[error("Infeasible: no slot available for tasks {task_ids:?}")]
    Infeasible { task_ids: Vec<String> },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Task id not present in the pool
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    /// Illegal task status change
    #[error("{0}")]
    Transition(#[from] TaskTransitionError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors raised while ingesting domain values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be greater than start ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Timestamp not on the granularity grid
    #[error("{field} ({at}) is not aligned to a {granularity_minutes}-minute grid")]
    Misaligned {
        field: String,
        at: chrono::DateTime<chrono::Utc>,
        granularity_minutes: u32,
    },

    /// Same identifier used twice
    #[error("Duplicate identifier: {0}")]
    DuplicateId(String),

    /// Two fixed events share time
    #[error("Fixed events '{first}' and '{second}' overlap")]
    OverlappingFixedEvents { first: String, second: String },

    /// Task cannot fit inside its own window
    #[error("Task '{task_id}' needs {duration_minutes} minutes but its window is only {window_minutes} minutes")]
    DurationExceedsWindow {
        task_id: String,
        duration_minutes: i64,
        window_minutes: i64,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Failure reported by a scoring collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoreError {
    /// The oracle could not produce a score for this pair
    #[error("Scoring oracle unavailable: {reason}")]
    OracleUnavailable { reason: String },
}

impl ScoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        ScoreError::OracleUnavailable {
            reason: reason.into(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
