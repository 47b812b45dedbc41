use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a persisted entity.
///
/// Entities have no identifier until their first write; the store hands out
/// positive integers in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    /// Creates an entity ID from a stored integer.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw identifier value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<EntityId> for i64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// The identity performing an operation.
///
/// Only `id` is written into audit stamps; `display_name` is carried for
/// logging and responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub display_name: String,
}

impl Actor {
    /// Creates an actor with a display name.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// Actor used by processes acting on their own behalf.
    pub fn system() -> Self {
        Self::new("system", "System")
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
