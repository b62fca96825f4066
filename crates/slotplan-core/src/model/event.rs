//! Immovable commitments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::slot::TimeSlot;
use crate::error::ValidationError;

/// A commitment the solver must schedule around. Never moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedEvent {
    pub id: String,
    pub label: String,
    pub slot: TimeSlot,
}

impl FixedEvent {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id: id.into(),
            label: label.into(),
            slot: TimeSlot::new(start, end)?,
        })
    }

    /// Whether the event is over at `now`. Elapsed events are history.
    pub fn has_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.slot.end <= now
    }
}

/// Reject duplicate ids, empty slots and overlapping events.
pub fn validate_fixed_events(events: &[FixedEvent]) -> Result<(), ValidationError> {
    let mut sorted: Vec<&FixedEvent> = events.iter().collect();
    sorted.sort_by(|a, b| a.slot.start.cmp(&b.slot.start).then_with(|| a.id.cmp(&b.id)));

    let mut seen = std::collections::HashSet::new();
    for event in &sorted {
        if !seen.insert(event.id.as_str()) {
            return Err(ValidationError::DuplicateId(event.id.clone()));
        }
        if event.slot.start >= event.slot.end {
            return Err(ValidationError::InvalidTimeRange {
                start: event.slot.start,
                end: event.slot.end,
            });
        }
    }

    for pair in sorted.windows(2) {
        if pair[0].slot.overlaps(&pair[1].slot) {
            return Err(ValidationError::OverlappingFixedEvents {
                first: pair[0].id.clone(),
                second: pair[1].id.clone(),
            });
        }
    }
    Ok(())
}
