//! Outward representation of an entity.

use common::EntityId;
use entity_store::VersionStamp;
use serde::{Deserialize, Serialize};

use crate::audit::DetailInfo;
use crate::entity::Entity;
use crate::error::DomainError;
use crate::resource::Resource;
use crate::status::Status;

/// A saved entity as returned to callers, with resource fields inlined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityResponse<F> {
    pub id: EntityId,
    pub name: String,
    pub status: Status,
    pub detail_info: DetailInfo,
    pub version: VersionStamp,
    #[serde(flatten)]
    pub fields: F,
}

impl<F: Clone> EntityResponse<F> {
    pub fn from_entity<R>(entity: &Entity<R>) -> Result<Self, DomainError>
    where
        R: Resource<Fields = F>,
    {
        let id = entity.id().ok_or_else(|| {
            DomainError::BadRequest(format!("{} '{}' has not been saved", R::NAME, entity.name()))
        })?;
        Ok(Self {
            id,
            name: entity.name().to_string(),
            status: entity.status(),
            detail_info: entity.detail_info().clone(),
            version: entity.version(),
            fields: entity.fields().clone(),
        })
    }
}
