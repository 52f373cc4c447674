//! Routine model - a recurring task a user tracks.

use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use crate::id::{GroupId, RoutineId, UserId};
use crate::{Error, Time};

/// A routine the user wants to perform on a recurring basis.
///
/// When the routine is due is decided by its schedules, which are stored
/// separately (see [`crate::WeekdaySchedule`] and [`crate::RepetitionSchedule`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    /// Unique identifier
    pub id: RoutineId,

    /// Owning user
    pub owner_id: UserId,

    /// Display name
    pub name: String,

    /// Priority
    pub priority: Priority,

    /// Group this routine is shown under.
    ///
    /// A weak reference: the group may have been deleted, in which case the
    /// routine is treated as ungrouped.
    pub group_id: Option<GroupId>,

    /// Time of day the routine is expected to be done
    pub expected_time: NaiveTime,

    /// Opaque icon tag used by the presentation layer
    pub icon: String,

    /// Creation timestamp
    pub created_at: Time,

    /// Last update timestamp
    pub updated_at: Time,
}

impl Routine {
    /// Create a new ungrouped routine.
    pub fn new(
        owner_id: UserId,
        name: impl Into<String>,
        priority: Priority,
        expected_time: NaiveTime,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RoutineId::new(),
            owner_id,
            name: name.into(),
            priority,
            group_id: None,
            expected_time,
            icon: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Place the routine in a group.
    pub fn with_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// Set the icon tag.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    /// Apply a partial edit. Only fields present in the patch change.
    pub fn apply(&mut self, patch: RoutinePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(group_id) = patch.group_id {
            self.group_id = group_id;
        }
        if let Some(expected_time) = patch.expected_time {
            self.expected_time = expected_time;
        }
        if let Some(icon) = patch.icon {
            self.icon = icon;
        }
        self.updated_at = Utc::now();
    }
}

/// Routine priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Nice to have
    Low,
    /// Default
    #[default]
    Medium,
    /// Must do
    High,
}

impl Priority {
    /// All priorities, highest first (display order).
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(Error::InvalidConfiguration(format!("unknown priority `{}`", other))),
        }
    }
}

/// A partial edit of a routine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutinePatch {
    /// New name
    pub name: Option<String>,

    /// New priority
    pub priority: Option<Priority>,

    /// `Some(None)` clears the group, `Some(Some(id))` moves the routine
    pub group_id: Option<Option<GroupId>>,

    /// New expected time
    pub expected_time: Option<NaiveTime>,

    /// New icon tag
    pub icon: Option<String>,
}

impl RoutinePatch {
    /// True when the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.priority.is_none()
            && self.group_id.is_none()
            && self.expected_time.is_none()
            && self.icon.is_none()
    }
}
