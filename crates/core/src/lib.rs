//! Routine tracker core data models.
//!
//! This crate defines the data structures the recurrence and completion
//! engine works on, together with the calendar helpers that map timestamps
//! onto local days.

#![warn(missing_docs)]

// Core identities
mod id;
mod error;

// Routines and grouping
mod routine;
mod group;
mod schedule;
mod completion;

// Calendar arithmetic
pub mod calendar;

// Re-exports
pub use id::*;
pub use error::{Error, Result};

pub use routine::{Routine, Priority, RoutinePatch};
pub use group::Group;
pub use schedule::{WeekdaySchedule, RepetitionSchedule, RecurrenceRule};
pub use completion::Completion;
pub use calendar::{DateRange, LocalCalendar};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
