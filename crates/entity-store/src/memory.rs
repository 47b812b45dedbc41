use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    EntityId, EntityRecord, ListCriteria, LookupField, Page, Result, StoreError, VersionStamp,
    store::{EntityStore, validate_record_for_insert, validate_record_for_update},
};

#[derive(Default)]
struct Tables {
    last_id: i64,
    rows: BTreeMap<EntityId, EntityRecord>,
}

impl Tables {
    fn name_taken(&self, record: &EntityRecord) -> bool {
        self.rows.values().any(|row| {
            row.resource == record.resource && row.name == record.name && row.id != record.id
        })
    }
}

/// In-memory entity store implementation for testing.
///
/// Provides the same interface and the same conditional-write semantics as
/// the PostgreSQL implementation. Identifiers are shared across resources,
/// like a single sequence.
#[derive(Clone, Default)]
pub struct InMemoryEntityStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryEntityStore {
    /// Creates a new empty in-memory entity store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of rows stored, soft-deleted included.
    pub async fn row_count(&self) -> usize {
        self.tables.read().await.rows.len()
    }

    /// Clears all rows. Identifiers keep counting up.
    pub async fn clear(&self) {
        self.tables.write().await.rows.clear();
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn insert(&self, mut record: EntityRecord) -> Result<EntityRecord> {
        validate_record_for_insert(&record)?;

        let mut tables = self.tables.write().await;
        if tables.name_taken(&record) {
            return Err(StoreError::UniqueViolation {
                resource: record.resource,
                field: LookupField::Name.to_string(),
                value: record.name,
            });
        }

        tables.last_id += 1;
        let id = EntityId::new(tables.last_id);
        record.id = Some(id);
        tables.rows.insert(id, record.clone());

        Ok(record)
    }

    async fn update(&self, record: EntityRecord, expected: VersionStamp) -> Result<EntityRecord> {
        let id = validate_record_for_update(&record, expected)?;

        let mut tables = self.tables.write().await;

        let actual = match tables.rows.get(&id) {
            Some(row) if row.resource == record.resource => row.version,
            _ => {
                return Err(StoreError::NotFound {
                    resource: record.resource,
                    id,
                });
            }
        };

        if !actual.equals(&expected) {
            tracing::debug!(
                resource = %record.resource,
                %id,
                %expected,
                %actual,
                "conditional update lost"
            );
            return Err(StoreError::ConcurrencyConflict {
                resource: record.resource,
                id,
                expected,
                actual,
            });
        }

        if tables.name_taken(&record) {
            return Err(StoreError::UniqueViolation {
                resource: record.resource,
                field: LookupField::Name.to_string(),
                value: record.name,
            });
        }

        tables.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_id(
        &self,
        resource: &str,
        id: EntityId,
        include_deleted: bool,
    ) -> Result<Option<EntityRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rows
            .get(&id)
            .filter(|row| row.resource == resource && (include_deleted || !row.deleted))
            .cloned())
    }

    async fn find_by_field(
        &self,
        resource: &str,
        field: LookupField,
        value: &Value,
    ) -> Result<Option<EntityRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rows
            .values()
            .find(|row| row.resource == resource && row.field(&field).as_ref() == Some(value))
            .cloned())
    }

    async fn list(&self, resource: &str, criteria: &ListCriteria) -> Result<Page<EntityRecord>> {
        let tables = self.tables.read().await;
        let matching: Vec<_> = tables
            .rows
            .values()
            .filter(|row| {
                row.resource == resource && criteria.matches(&row.name, &row.status, row.deleted)
            })
            .collect();

        let limit = criteria.effective_limit();
        let offset = criteria.effective_offset();

        Ok(Page {
            total: matching.len() as u64,
            items: matching
                .into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
            limit,
            offset,
        })
    }
}
