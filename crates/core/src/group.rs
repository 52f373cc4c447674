//! Group model - display buckets for routines.

use serde::{Deserialize, Serialize};
use crate::id::{GroupId, UserId};

/// A named group routines can be filed under.
///
/// Deleting a group never deletes its routines; they simply become ungrouped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier
    pub id: GroupId,

    /// Owning user
    pub owner_id: UserId,

    /// Display name
    pub name: String,

    /// Display order, lower first. Unordered groups sort after ordered ones.
    pub order: Option<i32>,
}

impl Group {
    /// Create a new group without an explicit order.
    pub fn new(owner_id: UserId, name: impl Into<String>) -> Self {
        Self {
            id: GroupId::new(),
            owner_id,
            name: name.into(),
            order: None,
        }
    }

    /// Set the display order.
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// Key groups are displayed by: order, then name, then id.
    pub fn display_key(&self) -> (i32, &str, GroupId) {
        (self.order.unwrap_or(i32::MAX), self.name.as_str(), self.id)
    }
}
