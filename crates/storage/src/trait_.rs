//! Storage trait abstraction.

use async_trait::async_trait;
use routine_core::{
    Completion, Group, GroupId, RepetitionSchedule, Routine, RoutineId, Time, UserId,
    WeekdaySchedule,
};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Repository of routines, their schedules, groups and completions.
///
/// The recurrence engine never talks to storage itself; callers fetch what
/// they need through this trait and hand the values over.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Routine operations ===

    /// Save a routine (create or update).
    async fn save_routine(&mut self, routine: &Routine) -> Result<()>;

    /// Load a routine by ID.
    async fn load_routine(&self, id: RoutineId) -> Result<Option<Routine>>;

    /// All routines owned by a user.
    async fn get_routines_by_user(&self, user_id: UserId) -> Result<Vec<Routine>>;

    /// Delete a routine together with its schedules and completions.
    async fn delete_routine(&mut self, id: RoutineId) -> Result<()>;

    // === Schedule operations ===

    /// Weekday schedule of a routine, if it has one.
    async fn get_weekday_schedule(&self, routine_id: RoutineId) -> Result<Option<WeekdaySchedule>>;

    /// Save (replace) a routine's weekday schedule.
    async fn save_weekday_schedule(&mut self, schedule: &WeekdaySchedule) -> Result<()>;

    /// Repetition schedule of a routine, if it has one.
    async fn get_repetition_schedule(
        &self,
        routine_id: RoutineId,
    ) -> Result<Option<RepetitionSchedule>>;

    /// Save (replace) a routine's repetition schedule.
    async fn save_repetition_schedule(&mut self, schedule: &RepetitionSchedule) -> Result<()>;

    // === Group operations ===

    /// Save a group (create or update).
    async fn save_group(&mut self, group: &Group) -> Result<()>;

    /// All groups owned by a user.
    async fn list_groups(&self, user_id: UserId) -> Result<Vec<Group>>;

    /// Delete a group. Routines referencing it are left untouched.
    async fn delete_group(&mut self, id: GroupId) -> Result<()>;

    // === Completion operations ===

    /// Completions of a user with `from <= completed_at < to`.
    async fn get_completions(&self, user_id: UserId, from: Time, to: Time) -> Result<Vec<Completion>>;

    /// Persist a completion.
    async fn save_completion(&mut self, completion: &Completion) -> Result<()>;

    /// Remove a completion. Fails with `NotFound` if it is not stored.
    async fn delete_completion(&mut self, completion: &Completion) -> Result<()>;
}
