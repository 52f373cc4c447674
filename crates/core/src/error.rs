//! Error type shared by the recurrence and completion engine.

use chrono::NaiveDate;
use crate::id::RoutineId;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the core.
///
/// Dangling group references and routines without any schedule are not
/// errors; they fall back to "ungrouped" and "never due".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A recurrence configuration is unusable (e.g. an interval of zero days)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A completion already exists for this routine on this calendar day
    #[error("Routine {routine_id} is already completed on {date}")]
    DuplicateCompletion {
        /// Routine that was completed
        routine_id: RoutineId,
        /// Local calendar day of the existing completion
        date: NaiveDate,
    },

    /// A completion or routine referenced by the caller does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}
