//! Domain model: slots, tasks, fixed events, preferences and schedules.

pub mod event;
pub mod preference;
pub mod schedule;
pub mod slot;
pub mod task;

pub use event::{validate_fixed_events, FixedEvent};
pub use preference::{CategoryPreference, Preferences};
pub use schedule::{Assignment, Schedule, SolveOptimality};
pub use slot::{Granularity, TimeRange, TimeSlot};
pub use task::{Task, TaskStatus, TaskTransitionError};
