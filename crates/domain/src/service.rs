//! Application service running the lifecycle of one resource.

use std::marker::PhantomData;
use std::sync::Arc;

use common::EntityId;
use entity_store::{ListCriteria, LookupField, Page, VersionStamp};
use serde_json::Value;

use crate::audit::AuditTrailFactory;
use crate::capability::{Clock, RequestContext};
use crate::command::{CreateCommand, UpdateCommand};
use crate::entity::Entity;
use crate::error::DomainError;
use crate::repository::Repository;
use crate::resource::Resource;
use crate::response::EntityResponse;
use crate::validator::{
    guard_permission, validate_can_be_deleted, validate_exists, validate_unique_value,
};

/// Counter of successful mutations, labelled by resource and operation.
pub const MUTATIONS_TOTAL: &str = "entity_mutations_total";

/// Counter of writes rejected with a stale version, labelled by resource.
pub const LOCK_CONFLICTS_TOTAL: &str = "entity_lock_conflicts_total";

/// Create, view, update, delete, restore and list entities of resource `R`.
///
/// Every mutating call checks the permission `<resource>.<operation>`,
/// bumps the version exactly once and issues exactly one repository write.
/// Nothing is written when any check fails.
pub struct LifecycleService<R: Resource, Repo: Repository<R>> {
    repository: Repo,
    clock: Arc<dyn Clock>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource, Repo: Repository<R>> LifecycleService<R, Repo> {
    pub fn new(repository: Repo, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            _resource: PhantomData,
        }
    }

    pub fn repository(&self) -> &Repo {
        &self.repository
    }

    /// Creates an entity at version 1.
    #[tracing::instrument(skip(self, ctx, command), fields(resource = R::NAME, actor = %ctx.actor()))]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        command: CreateCommand<R>,
    ) -> Result<EntityResponse<R::Fields>, DomainError> {
        observe::<R, _>("create", async {
            guard_permission(ctx.authorizer(), &R::permission("create"), R::NAME, None)?;

            let factory = AuditTrailFactory::new(self.clock.as_ref(), ctx);
            let entity = Entity::<R>::create(command, &factory)?;
            self.ensure_name_free(entity.name(), None).await?;

            let saved = self.repository.save(entity).await?;
            tracing::info!(id = ?saved.id(), name = saved.name(), "entity created");
            EntityResponse::from_entity(&saved)
        })
        .await
    }

    /// Returns a live entity.
    #[tracing::instrument(skip(self), fields(resource = R::NAME))]
    pub async fn view(&self, id: EntityId) -> Result<EntityResponse<R::Fields>, DomainError> {
        let entity = validate_exists(self.repository.find_by_id(id).await?, R::NAME, id)?;
        EntityResponse::from_entity(&entity)
    }

    /// Applies an update if `lock_version` is still the current version.
    #[tracing::instrument(skip(self, ctx, command), fields(resource = R::NAME, actor = %ctx.actor()))]
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: EntityId,
        command: UpdateCommand<R>,
    ) -> Result<EntityResponse<R::Fields>, DomainError> {
        observe::<R, _>("update", async {
            let found = self.repository.find_by_id(id).await?;
            let mut entity = validate_exists(found, R::NAME, id)?;
            guard_permission(ctx.authorizer(), &R::permission("update"), R::NAME, Some(id))?;

            entity.check_version(VersionStamp::from_int(command.lock_version)?)?;
            let diff = entity.diff(command.into_changes()?)?;
            let guard = entity.guard_mutation(diff.has_field_changes(), diff.status())?;
            if let Some(name) = diff.name() {
                self.ensure_name_free(name, Some(id)).await?;
            }

            let factory = AuditTrailFactory::new(self.clock.as_ref(), ctx);
            entity.apply_update(diff, guard, &factory)?;

            let saved = self.repository.save(entity).await?;
            tracing::info!(%id, version = %saved.version(), "entity updated");
            EntityResponse::from_entity(&saved)
        })
        .await
    }

    /// Soft deletes an entity; locked entities are refused.
    #[tracing::instrument(skip(self, ctx), fields(resource = R::NAME, actor = %ctx.actor()))]
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        id: EntityId,
    ) -> Result<EntityResponse<R::Fields>, DomainError> {
        observe::<R, _>("delete", async {
            let found = validate_exists(self.repository.find_by_id(id).await?, R::NAME, id)?;
            guard_permission(ctx.authorizer(), &R::permission("delete"), R::NAME, Some(id))?;
            let mut entity = validate_can_be_deleted(Some(found), id)?;

            let factory = AuditTrailFactory::new(self.clock.as_ref(), ctx);
            entity.mark_deleted(&factory)?;

            let deleted = self.repository.soft_delete(entity).await?;
            tracing::info!(%id, version = %deleted.version(), "entity deleted");
            EntityResponse::from_entity(&deleted)
        })
        .await
    }

    /// Brings a soft-deleted entity back as a draft.
    #[tracing::instrument(skip(self, ctx), fields(resource = R::NAME, actor = %ctx.actor()))]
    pub async fn restore(
        &self,
        ctx: &RequestContext,
        id: EntityId,
    ) -> Result<EntityResponse<R::Fields>, DomainError> {
        observe::<R, _>("restore", async {
            let found = self.repository.find_including_deleted(id).await?;
            let mut entity = validate_exists(found, R::NAME, id)?;
            guard_permission(ctx.authorizer(), &R::permission("restore"), R::NAME, Some(id))?;

            let factory = AuditTrailFactory::new(self.clock.as_ref(), ctx);
            entity.mark_restored(&factory)?;

            let restored = self.repository.restore(entity).await?;
            tracing::info!(%id, version = %restored.version(), "entity restored");
            EntityResponse::from_entity(&restored)
        })
        .await
    }

    #[tracing::instrument(skip(self), fields(resource = R::NAME))]
    pub async fn list(
        &self,
        criteria: &ListCriteria,
    ) -> Result<Page<EntityResponse<R::Fields>>, DomainError> {
        self.repository
            .list(criteria)
            .await?
            .try_map(|entity| EntityResponse::from_entity(&entity))
    }

    async fn ensure_name_free(
        &self,
        name: &str,
        exclude_id: Option<EntityId>,
    ) -> Result<(), DomainError> {
        let value = Value::String(name.to_string());
        validate_unique_value::<R, _>(
            &self.repository,
            LookupField::Name,
            &value,
            R::NAME,
            exclude_id,
        )
        .await
    }
}

/// Records the outcome of a mutating operation.
async fn observe<R, T>(
    operation: &'static str,
    fut: impl std::future::Future<Output = Result<T, DomainError>>,
) -> Result<T, DomainError>
where
    R: Resource,
{
    let result = fut.await;
    match &result {
        Ok(_) => {
            metrics::counter!(
                MUTATIONS_TOTAL,
                "resource" => R::NAME,
                "operation" => operation
            )
            .increment(1);
        }
        Err(e @ DomainError::OptimisticLock { .. }) => {
            metrics::counter!(LOCK_CONFLICTS_TOTAL, "resource" => R::NAME).increment(1);
            tracing::warn!(operation, error = %e, "optimistic lock conflict");
        }
        Err(e) => {
            tracing::warn!(operation, error = %e, "operation rejected");
        }
    }
    result
}
