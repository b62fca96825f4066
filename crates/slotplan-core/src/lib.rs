//! # slotplan core library
//!
//! Places movable tasks into time slots around fixed events so that the
//! total utility is maximal, and re-plans when the plan and reality diverge.
//! All logic lives here; the `slotplan` CLI is a thin layer over it.
//!
//! ## Architecture
//!
//! - **Model**: tasks, fixed events, preferences, slots and schedules
//! - **Scoring**: the `ScoringFunction` boundary to a utility oracle, with a
//!   constant scorer and a preference-based prior
//! - **Solver**: exact, deterministic branch-and-bound on a discrete grid
//! - **Rescheduler**: lazy time-based task transitions and residual re-solves
//! - **Config**: TOML-backed solver and re-entry settings
//!
//! The core holds no timers and never reads the system clock for planning;
//! every time-dependent call takes a caller-supplied `now`.

pub mod config;
pub mod error;
pub mod model;
pub mod rescheduler;
pub mod scoring;
pub mod solver;

pub use config::{Config, SolverConfig};
pub use error::{ConfigError, CoreError, Result, ScoreError, ValidationError};
pub use model::{
    Assignment, CategoryPreference, FixedEvent, Granularity, Preferences, Schedule,
    SolveOptimality, Task, TaskStatus, TimeRange, TimeSlot,
};
pub use rescheduler::{
    NoRelaxation, ReentryPolicy, RelaxationPolicy, RescheduleOutcome, Rescheduler,
    SplitIntoChunks, StatusReport, TaskPool,
};
pub use scoring::{ConstantScorer, PreferenceScorer, ScoringFunction};
pub use solver::Solver;
