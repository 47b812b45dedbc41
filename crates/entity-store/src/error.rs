use thiserror::Error;

use crate::{EntityId, InvalidValueError, VersionStamp};

/// Errors that can occur when interacting with the entity store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional write found a different version than expected.
    #[error(
        "Concurrency conflict for {resource} {id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        resource: String,
        id: EntityId,
        expected: VersionStamp,
        actual: VersionStamp,
    },

    /// The row targeted by a write does not exist.
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: EntityId },

    /// A write would duplicate a unique column.
    #[error("{resource} with {field} {value} already exists")]
    UniqueViolation {
        resource: String,
        field: String,
        value: String,
    },

    /// The record handed to the store is malformed.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A stored version could not be decoded.
    #[error(transparent)]
    InvalidVersion(#[from] InvalidValueError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for entity store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
