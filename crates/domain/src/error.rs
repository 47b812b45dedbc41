//! Domain error types.

use common::EntityId;
use entity_store::{InvalidValueError, StoreError, VersionStamp};
use thiserror::Error;

use crate::status::UnknownStatus;

/// Errors that can occur during lifecycle operations.
///
/// Every guard failure maps to exactly one of the first five variants; the
/// remaining ones are infrastructure failures.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The entity does not exist (or is soft deleted).
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: EntityId },

    /// A uniqueness violation or a mutation the entity's status forbids.
    #[error("Conflict on {resource}: {message}")]
    Conflict { resource: String, message: String },

    /// The caller's expected version is not the stored one.
    #[error(
        "Optimistic lock failed for {resource} {id}: expected version {expected}, found {actual}"
    )]
    OptimisticLock {
        resource: String,
        id: EntityId,
        expected: VersionStamp,
        actual: VersionStamp,
    },

    /// The request cannot be applied as given.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The caller lacks a permission.
    #[error("Forbidden: missing permission {permission}")]
    Forbidden {
        permission: String,
        resource: String,
        id: Option<EntityId>,
    },

    /// A value could not be turned into its domain type.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// An error occurred in the entity store.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub(crate) fn conflict(resource: &str, message: impl Into<String>) -> Self {
        DomainError::Conflict {
            resource: resource.to_string(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConcurrencyConflict {
                resource,
                id,
                expected,
                actual,
            } => DomainError::OptimisticLock {
                resource,
                id,
                expected,
                actual,
            },
            StoreError::NotFound { resource, id } => DomainError::NotFound { resource, id },
            StoreError::UniqueViolation {
                resource,
                field,
                value,
            } => DomainError::Conflict {
                resource,
                message: format!("{field} '{value}' is already taken"),
            },
            StoreError::InvalidVersion(e) => e.into(),
            StoreError::Serialization(e) => DomainError::Serialization(e),
            other => DomainError::Store(other),
        }
    }
}

impl From<InvalidValueError> for DomainError {
    fn from(e: InvalidValueError) -> Self {
        DomainError::InvalidValue(e.to_string())
    }
}

impl From<UnknownStatus> for DomainError {
    fn from(e: UnknownStatus) -> Self {
        DomainError::InvalidValue(e.to_string())
    }
}
