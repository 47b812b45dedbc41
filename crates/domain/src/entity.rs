//! The generic entity and its status guard.

use std::collections::BTreeMap;

use common::EntityId;
use entity_store::VersionStamp;
use serde_json::{Map, Value};

use crate::audit::{AuditTrail, AuditTrailFactory, DetailInfo};
use crate::command::{CreateCommand, EntityChanges, normalize_name};
use crate::error::DomainError;
use crate::resource::Resource;
use crate::status::Status;

/// Proof that a mutation passed [`Entity::guard_mutation`].
///
/// Only the guard creates one, so an update cannot be applied unchecked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardedMutation {
    status_change: Option<Status>,
}

impl GuardedMutation {
    /// The new status, if the mutation changes it.
    pub fn status_change(&self) -> Option<Status> {
        self.status_change
    }
}

/// The effective changes of an update, computed by [`Entity::diff`].
pub struct EntityDiff<R: Resource> {
    name: Option<String>,
    status: Option<Status>,
    extra: Option<Map<String, Value>>,
    fields: Option<R::Fields>,
    previous: BTreeMap<String, Value>,
}

impl<R: Resource> EntityDiff<R> {
    /// Returns true if anything other than the status differs.
    pub fn has_field_changes(&self) -> bool {
        self.name.is_some() || self.extra.is_some() || self.fields.is_some()
    }

    /// The requested status, which may equal the current one.
    pub fn status(&self) -> Option<Status> {
        self.status
    }

    /// The new name, if it differs from the current one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Previous values of everything that differs, status excluded.
    pub fn previous(&self) -> &BTreeMap<String, Value> {
        &self.previous
    }
}

/// An entity of resource `R` with its lifecycle state.
pub struct Entity<R: Resource> {
    id: Option<EntityId>,
    name: String,
    status: Status,
    detail_info: DetailInfo,
    version: VersionStamp,
    fields: R::Fields,
    /// Version read from storage; the next write is conditioned on it.
    loaded_version: Option<VersionStamp>,
}

impl<R: Resource> Entity<R> {
    /// Builds a new, unsaved entity at the initial version.
    pub fn create(
        command: CreateCommand<R>,
        factory: &AuditTrailFactory<'_>,
    ) -> Result<Self, DomainError> {
        let name = normalize_name(&command.name)?;
        let status = command.status.unwrap_or_default();
        if status.is_deleted() {
            return Err(DomainError::BadRequest(
                "entities cannot be created deleted".to_string(),
            ));
        }
        let fields = R::normalize(command.fields);
        R::validate(&fields)?;

        Ok(Self {
            id: None,
            name,
            status,
            detail_info: factory.stamp_created(command.detail_info),
            version: VersionStamp::initial(),
            fields,
            loaded_version: None,
        })
    }

    /// Rebuilds an entity read from storage.
    pub(crate) fn hydrate(
        id: EntityId,
        name: String,
        status: Status,
        detail_info: DetailInfo,
        version: VersionStamp,
        fields: R::Fields,
    ) -> Self {
        Self {
            id: Some(id),
            name,
            status,
            detail_info,
            version,
            fields,
            loaded_version: Some(version),
        }
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn detail_info(&self) -> &DetailInfo {
        &self.detail_info
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.detail_info.audit
    }

    pub fn version(&self) -> VersionStamp {
        self.version
    }

    pub fn loaded_version(&self) -> Option<VersionStamp> {
        self.loaded_version
    }

    pub fn fields(&self) -> &R::Fields {
        &self.fields
    }

    pub fn is_deleted(&self) -> bool {
        self.status.is_deleted()
    }

    /// Fails unless `expected` is the current version.
    pub fn check_version(&self, expected: VersionStamp) -> Result<(), DomainError> {
        if self.version.equals(&expected) {
            return Ok(());
        }
        let id = self
            .id
            .ok_or_else(|| DomainError::BadRequest("entity has not been saved".to_string()))?;
        Err(DomainError::OptimisticLock {
            resource: R::NAME.to_string(),
            id,
            expected,
            actual: self.version,
        })
    }

    /// Works out what an update would actually change.
    ///
    /// Values equal to the current ones drop out, so a request that only
    /// repeats the stored state yields an empty diff.
    pub fn diff(&self, changes: EntityChanges<R>) -> Result<EntityDiff<R>, DomainError> {
        let mut previous = BTreeMap::new();

        let fields = if R::patch_has_changes(&changes.fields) {
            let (fields, changed) = R::apply_patch(&self.fields, &changes.fields)?;
            previous.extend(changed);
            Some(fields).filter(|fields| *fields != self.fields)
        } else {
            None
        };

        let name = changes.name.filter(|name| *name != self.name);
        if name.is_some() {
            previous.insert("name".to_string(), Value::String(self.name.clone()));
        }

        let mut merged = self.detail_info.clone();
        merged.merge_extra(changes.detail_info);
        let extra = Some(merged.extra).filter(|extra| *extra != self.detail_info.extra);
        if extra.is_some() {
            previous.insert(
                "detail_info".to_string(),
                Value::Object(self.detail_info.extra.clone()),
            );
        }

        Ok(EntityDiff {
            name,
            status: changes.status,
            extra,
            fields,
            previous,
        })
    }

    /// Decides whether an update may proceed.
    ///
    /// Requesting the current status is not a status change. A locked entity
    /// accepts nothing but a bare unlock, and soft deletion is not an update.
    pub fn guard_mutation(
        &self,
        has_field_changes: bool,
        new_status: Option<Status>,
    ) -> Result<GuardedMutation, DomainError> {
        let status_change = new_status.filter(|next| *next != self.status);
        if status_change.is_none() && !has_field_changes {
            return Err(DomainError::BadRequest("nothing to change".to_string()));
        }

        let guard = self.guard_transition(has_field_changes, status_change)?;

        if status_change.is_some_and(|next| next.is_deleted()) {
            return Err(DomainError::BadRequest(
                "entities are deleted through delete, not update".to_string(),
            ));
        }
        Ok(guard)
    }

    fn guard_transition(
        &self,
        has_field_changes: bool,
        status_change: Option<Status>,
    ) -> Result<GuardedMutation, DomainError> {
        if self.status.is_locked() {
            let unlocking = status_change.is_some_and(|next| R::is_unlock(self.status, next));
            if !unlocking || has_field_changes {
                return Err(DomainError::conflict(
                    R::NAME,
                    format!("'{}' is locked; unlock it before changing it", self.name),
                ));
            }
        }

        if let Some(next) = status_change {
            if !R::can_transition(self.status, next) {
                return Err(DomainError::conflict(
                    R::NAME,
                    format!("cannot move '{}' from {} to {}", self.name, self.status, next),
                ));
            }
        }

        Ok(GuardedMutation { status_change })
    }

    /// Applies a guarded update and bumps the version.
    ///
    /// Nothing changes if the resource rejects the patched fields.
    pub fn apply_update(
        &mut self,
        diff: EntityDiff<R>,
        guard: GuardedMutation,
        factory: &AuditTrailFactory<'_>,
    ) -> Result<(), DomainError> {
        let fields = diff.fields.unwrap_or_else(|| self.fields.clone());
        R::validate(&fields)?;
        let version = self.version.increment()?;

        let mut previous = diff.previous;
        if guard.status_change.is_some() {
            previous.insert("status".to_string(), status_value(self.status));
        }
        let extra = diff.extra.unwrap_or_else(|| self.detail_info.extra.clone());
        let detail_info = factory.stamp_updated(&self.detail_info, extra, previous);

        self.fields = fields;
        if let Some(name) = diff.name {
            self.name = name;
        }
        if let Some(status) = guard.status_change {
            self.status = status;
        }
        self.detail_info = detail_info;
        self.version = version;
        Ok(())
    }

    /// Soft deletes the entity.
    pub fn mark_deleted(&mut self, factory: &AuditTrailFactory<'_>) -> Result<(), DomainError> {
        self.guard_transition(false, Some(Status::Deleted))?;
        let version = self.version.increment()?;

        let previous = BTreeMap::from([("status".to_string(), status_value(self.status))]);
        self.detail_info = factory.stamp_deleted(&self.detail_info, previous);
        self.status = Status::Deleted;
        self.version = version;
        Ok(())
    }

    /// Brings a soft-deleted entity back as a draft.
    pub fn mark_restored(&mut self, factory: &AuditTrailFactory<'_>) -> Result<(), DomainError> {
        if !self.is_deleted() {
            return Err(DomainError::conflict(
                R::NAME,
                format!("'{}' is not deleted", self.name),
            ));
        }
        self.guard_transition(false, Some(Status::Draft))?;
        let version = self.version.increment()?;

        let previous = BTreeMap::from([("status".to_string(), status_value(self.status))]);
        self.detail_info = factory.stamp_restored(&self.detail_info, previous);
        self.status = Status::Draft;
        self.version = version;
        Ok(())
    }
}

fn status_value(status: Status) -> Value {
    Value::String(status.as_str().to_string())
}

impl<R: Resource> Clone for Entity<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            detail_info: self.detail_info.clone(),
            version: self.version,
            fields: self.fields.clone(),
            loaded_version: self.loaded_version,
        }
    }
}

impl<R: Resource> std::fmt::Debug for Entity<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("resource", &R::NAME)
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("version", &self.version)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}
