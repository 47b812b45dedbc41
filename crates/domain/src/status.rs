//! Entity lifecycle status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The lifecycle state of an entity.
///
/// Default transitions:
/// ```text
/// Draft ──► Active ◄──► Locked
///   │         │
///   └────┬────┘
///        ▼
///     Deleted ──► Draft (restore)
/// ```
/// Resources can override the table through
/// [`Resource::can_transition`](crate::Resource::can_transition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Being prepared; freely editable.
    #[default]
    Draft,

    /// Published and in use.
    Active,

    /// Protected from mutation and deletion until unlocked.
    Locked,

    /// Soft deleted; the row is retained and can be restored.
    Deleted,
}

impl Status {
    /// Returns true if the status forbids destructive mutation.
    pub fn is_locked(&self) -> bool {
        matches!(self, Status::Locked)
    }

    /// Returns true for the soft-deleted status.
    pub fn is_deleted(&self) -> bool {
        matches!(self, Status::Deleted)
    }

    /// Default transition table.
    pub fn can_transition_to(&self, next: Status) -> bool {
        matches!(
            (*self, next),
            (Status::Draft, Status::Active)
                | (Status::Active, Status::Locked)
                | (Status::Locked, Status::Active)
                | (Status::Draft | Status::Active, Status::Deleted)
                | (Status::Deleted, Status::Draft)
        )
    }

    /// Returns true for the transition that lifts a lock.
    pub fn is_unlock(&self, next: Status) -> bool {
        matches!((*self, next), (Status::Locked, Status::Active))
    }

    /// Returns the stored status code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::Active => "active",
            Status::Locked => "locked",
            Status::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status code that names no known status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Status::Draft),
            "active" => Ok(Status::Active),
            "locked" => Ok(Status::Locked),
            "deleted" => Ok(Status::Deleted),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
