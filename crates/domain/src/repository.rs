//! Persistence port for entities and its implementation over an entity store.

use std::marker::PhantomData;

use async_trait::async_trait;
use common::EntityId;
use entity_store::{EntityRecord, EntityStore, ListCriteria, LookupField, Page, StoreError};
use serde_json::Value;

use crate::audit::DetailInfo;
use crate::entity::Entity;
use crate::error::DomainError;
use crate::resource::Resource;
use crate::status::Status;

/// Loads and stores entities of one resource.
///
/// Writes of an already saved entity are conditioned on the version it was
/// loaded at and fail with [`DomainError::OptimisticLock`] on a lost race.
#[async_trait]
pub trait Repository<R: Resource>: Send + Sync {
    /// Finds a live entity.
    async fn find_by_id(&self, id: EntityId) -> Result<Option<Entity<R>>, DomainError>;

    /// Finds an entity, soft-deleted or not.
    async fn find_including_deleted(&self, id: EntityId)
    -> Result<Option<Entity<R>>, DomainError>;

    /// Finds an entity whose field equals `value`, soft-deleted rows included.
    async fn find_by_field(
        &self,
        field: LookupField,
        value: &Value,
    ) -> Result<Option<Entity<R>>, DomainError>;

    /// Inserts a new entity or writes a loaded one.
    async fn save(&self, entity: Entity<R>) -> Result<Entity<R>, DomainError>;

    /// Writes an entity that was just marked deleted.
    async fn soft_delete(&self, entity: Entity<R>) -> Result<Entity<R>, DomainError>;

    /// Writes an entity that was just restored.
    async fn restore(&self, entity: Entity<R>) -> Result<Entity<R>, DomainError>;

    async fn list(&self, criteria: &ListCriteria) -> Result<Page<Entity<R>>, DomainError>;
}

/// [`Repository`] over any [`EntityStore`].
pub struct StoreRepository<S, R> {
    store: S,
    _resource: PhantomData<fn() -> R>,
}

impl<S: EntityStore, R: Resource> StoreRepository<S, R> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            _resource: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn to_record(entity: &Entity<R>) -> Result<EntityRecord, DomainError> {
        let mut builder = EntityRecord::builder()
            .resource(R::NAME)
            .name(entity.name())
            .status(entity.status().as_str())
            .version(entity.version())
            .deleted(entity.is_deleted())
            .detail_info(entity.detail_info())?
            .attributes(entity.fields())?;
        if let Some(id) = entity.id() {
            builder = builder.id(id);
        }
        Ok(builder.build()?)
    }

    fn from_record(record: EntityRecord) -> Result<Entity<R>, DomainError> {
        let id = record.id.ok_or_else(|| {
            StoreError::InvalidRecord(format!("stored {} row has no id", R::NAME))
        })?;
        let status: Status = record.status.parse()?;
        let detail_info: DetailInfo = serde_json::from_value(record.detail_info)?;
        let fields: R::Fields = serde_json::from_value(Value::Object(record.attributes))?;
        Ok(Entity::hydrate(
            id,
            record.name,
            status,
            detail_info,
            record.version,
            fields,
        ))
    }

    async fn write(&self, entity: Entity<R>) -> Result<Entity<R>, DomainError> {
        let record = Self::to_record(&entity)?;
        let stored = match entity.loaded_version() {
            None => self.store.insert(record).await?,
            Some(expected) => self.store.update(record, expected).await?,
        };
        Self::from_record(stored)
    }
}

#[async_trait]
impl<S: EntityStore, R: Resource> Repository<R> for StoreRepository<S, R> {
    async fn find_by_id(&self, id: EntityId) -> Result<Option<Entity<R>>, DomainError> {
        self.store
            .find_by_id(R::NAME, id, false)
            .await?
            .map(Self::from_record)
            .transpose()
    }

    async fn find_including_deleted(
        &self,
        id: EntityId,
    ) -> Result<Option<Entity<R>>, DomainError> {
        self.store
            .find_by_id(R::NAME, id, true)
            .await?
            .map(Self::from_record)
            .transpose()
    }

    async fn find_by_field(
        &self,
        field: LookupField,
        value: &Value,
    ) -> Result<Option<Entity<R>>, DomainError> {
        self.store
            .find_by_field(R::NAME, field, value)
            .await?
            .map(Self::from_record)
            .transpose()
    }

    async fn save(&self, entity: Entity<R>) -> Result<Entity<R>, DomainError> {
        self.write(entity).await
    }

    async fn soft_delete(&self, entity: Entity<R>) -> Result<Entity<R>, DomainError> {
        if !entity.is_deleted() || entity.loaded_version().is_none() {
            return Err(DomainError::BadRequest(format!(
                "{} '{}' was not marked deleted",
                R::NAME,
                entity.name()
            )));
        }
        self.write(entity).await
    }

    async fn restore(&self, entity: Entity<R>) -> Result<Entity<R>, DomainError> {
        if entity.is_deleted() || entity.loaded_version().is_none() {
            return Err(DomainError::BadRequest(format!(
                "{} '{}' was not restored",
                R::NAME,
                entity.name()
            )));
        }
        self.write(entity).await
    }

    async fn list(&self, criteria: &ListCriteria) -> Result<Page<Entity<R>>, DomainError> {
        self.store
            .list(R::NAME, criteria)
            .await?
            .try_map(Self::from_record)
    }
}
