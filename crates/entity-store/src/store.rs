use async_trait::async_trait;
use serde_json::Value;

use crate::{
    EntityId, EntityRecord, ListCriteria, LookupField, Page, Result, StoreError, VersionStamp,
};

/// Core trait for entity store implementations.
///
/// A store persists entity rows and is the only writer of identifiers and
/// persisted versions. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Inserts a new row.
    ///
    /// The record must not carry an identifier and must be at the initial
    /// version. Returns the row as stored, with its assigned identifier.
    async fn insert(&self, record: EntityRecord) -> Result<EntityRecord>;

    /// Replaces an existing row if its stored version equals `expected`.
    ///
    /// The record's own version must be `expected.increment()`. Fails with
    /// `ConcurrencyConflict` if another writer advanced the row first, in
    /// which case nothing is written.
    async fn update(&self, record: EntityRecord, expected: VersionStamp) -> Result<EntityRecord>;

    /// Loads one row by identifier.
    ///
    /// Soft-deleted rows are only returned when `include_deleted` is set.
    async fn find_by_id(
        &self,
        resource: &str,
        id: EntityId,
        include_deleted: bool,
    ) -> Result<Option<EntityRecord>>;

    /// Finds a row whose field equals `value`, soft-deleted rows included.
    async fn find_by_field(
        &self,
        resource: &str,
        field: LookupField,
        value: &Value,
    ) -> Result<Option<EntityRecord>>;

    /// Lists rows of a resource in identifier order.
    async fn list(&self, resource: &str, criteria: &ListCriteria) -> Result<Page<EntityRecord>>;
}

/// Validates a record before an insert.
pub fn validate_record_for_insert(record: &EntityRecord) -> Result<()> {
    validate_record_shape(record)?;
    if record.id.is_some() {
        return Err(StoreError::InvalidRecord(
            "Cannot insert a record that already has an id".to_string(),
        ));
    }
    if !record.version.equals(&VersionStamp::initial()) {
        return Err(StoreError::InvalidRecord(format!(
            "New records must be at version {}, got {}",
            VersionStamp::initial(),
            record.version
        )));
    }
    Ok(())
}

/// Validates a record before a conditional update and returns its id.
pub fn validate_record_for_update(
    record: &EntityRecord,
    expected: VersionStamp,
) -> Result<EntityId> {
    validate_record_shape(record)?;
    let id = record.id.ok_or_else(|| {
        StoreError::InvalidRecord("Cannot update a record without an id".to_string())
    })?;
    let next = expected.increment()?;
    if !record.version.equals(&next) {
        return Err(StoreError::InvalidRecord(format!(
            "Updated records must advance the version by one. Expected {}, got {}",
            next, record.version
        )));
    }
    Ok(id)
}

fn validate_record_shape(record: &EntityRecord) -> Result<()> {
    if record.resource.trim().is_empty() {
        return Err(StoreError::InvalidRecord("resource is required".to_string()));
    }
    if record.name.trim().is_empty() {
        return Err(StoreError::InvalidRecord("name must not be empty".to_string()));
    }
    if !record.detail_info.is_object() {
        return Err(StoreError::InvalidRecord(
            "detail_info must be an object".to_string(),
        ));
    }
    Ok(())
}
