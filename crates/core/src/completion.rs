//! Completion records.

use serde::{Deserialize, Serialize};
use crate::id::{RoutineId, UserId};
use crate::Time;

/// A record that a routine was performed.
///
/// Which calendar day it counts for is decided by the configured
/// [`crate::LocalCalendar`], not by the UTC date of `completed_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Routine that was performed
    pub routine_id: RoutineId,

    /// User who performed it
    pub user_id: UserId,

    /// When it was marked done
    pub completed_at: Time,
}

impl Completion {
    /// Create a completion record.
    pub fn new(routine_id: RoutineId, user_id: UserId, completed_at: Time) -> Self {
        Self {
            routine_id,
            user_id,
            completed_at,
        }
    }
}
