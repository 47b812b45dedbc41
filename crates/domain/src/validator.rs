//! Guards shared by every lifecycle operation.

use common::EntityId;
use entity_store::LookupField;
use serde_json::Value;

use crate::capability::Authorizer;
use crate::entity::Entity;
use crate::error::DomainError;
use crate::repository::Repository;
use crate::resource::Resource;

/// Fails with `Forbidden` unless the caller holds `permission`.
pub fn guard_permission(
    authorizer: &dyn Authorizer,
    permission: &str,
    resource: &str,
    id: Option<EntityId>,
) -> Result<(), DomainError> {
    if authorizer.can(permission) {
        return Ok(());
    }
    tracing::warn!(permission, resource, ?id, "permission denied");
    Err(DomainError::Forbidden {
        permission: permission.to_string(),
        resource: resource.to_string(),
        id,
    })
}

/// Unwraps a lookup result, failing with `NotFound`.
pub fn validate_exists<R: Resource>(
    entity: Option<Entity<R>>,
    resource: &str,
    id: EntityId,
) -> Result<Entity<R>, DomainError> {
    entity.ok_or_else(|| DomainError::NotFound {
        resource: resource.to_string(),
        id,
    })
}

/// Fails with `Conflict` if another entity already holds `value`.
///
/// `exclude_id` is the entity being updated, which may keep its own value.
/// Soft-deleted entities keep their values reserved.
pub async fn validate_unique_value<R, Repo>(
    repository: &Repo,
    field: LookupField,
    value: &Value,
    resource: &str,
    exclude_id: Option<EntityId>,
) -> Result<(), DomainError>
where
    R: Resource,
    Repo: Repository<R> + ?Sized,
{
    let existing = repository.find_by_field(field, value).await?;
    match existing {
        Some(other) if exclude_id.is_none() || other.id() != exclude_id => {
            let shown = value.as_str().map_or_else(|| value.to_string(), str::to_string);
            Err(DomainError::conflict(
                resource,
                format!("{field} '{shown}' is already taken"),
            ))
        }
        _ => Ok(()),
    }
}

/// Unwraps a lookup result for deletion, rejecting locked entities.
pub fn validate_can_be_deleted<R: Resource>(
    entity: Option<Entity<R>>,
    id: EntityId,
) -> Result<Entity<R>, DomainError> {
    let entity = validate_exists(entity, R::NAME, id)?;
    if entity.status().is_locked() {
        return Err(DomainError::conflict(
            R::NAME,
            format!("'{}' is locked and cannot be deleted", entity.name()),
        ));
    }
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditTrailFactory;
    use crate::capability::{StaticAuthorizer, SystemClock};
    use crate::command::CreateCommand;
    use crate::repository::StoreRepository;
    use crate::resources::{Brand, BrandFields};
    use crate::status::Status;
    use common::Actor;
    use entity_store::InMemoryEntityStore;
    use serde_json::json;

    async fn repo_with(
        names: &[&str],
    ) -> (StoreRepository<InMemoryEntityStore, Brand>, Vec<EntityId>) {
        let repo = StoreRepository::new(InMemoryEntityStore::new());
        let clock = SystemClock;
        let actor = Actor::system();
        let factory = AuditTrailFactory::new(&clock, &actor);
        let mut ids = Vec::new();
        for name in names {
            let website = format!("https://{}.test", name.to_lowercase());
            let fields = BrandFields::new(false, Some(website));
            let entity = Entity::create(CreateCommand::new(*name, fields), &factory).unwrap();
            ids.push(repo.save(entity).await.unwrap().id().unwrap());
        }
        (repo, ids)
    }

    #[test]
    fn guard_permission_reports_missing_permission() {
        let auth = StaticAuthorizer::new(["brand.view"]);
        assert!(guard_permission(&auth, "brand.view", "brand", None).is_ok());

        match guard_permission(&auth, "brand.delete", "brand", Some(EntityId::new(3))) {
            Err(DomainError::Forbidden { permission, id, .. }) => {
                assert_eq!(permission, "brand.delete");
                assert_eq!(id, Some(EntityId::new(3)));
            }
            other => panic!("expected forbidden, got {other:?}"),
        }
    }

    #[test]
    fn validate_exists_maps_none_to_not_found() {
        let result = validate_exists::<Brand>(None, "brand", EntityId::new(9));
        assert!(matches!(result, Err(DomainError::NotFound { id, .. }) if id == EntityId::new(9)));
    }

    #[tokio::test]
    async fn unique_value_excludes_own_id() {
        let (repo, ids) = repo_with(&["Acme"]).await;
        let value = json!("Acme");

        let taken =
            validate_unique_value::<Brand, _>(&repo, LookupField::Name, &value, "brand", None)
                .await;
        assert!(matches!(taken, Err(DomainError::Conflict { .. })));

        let own = validate_unique_value::<Brand, _>(
            &repo,
            LookupField::Name,
            &value,
            "brand",
            Some(ids[0]),
        )
        .await;
        assert!(own.is_ok());

        let free = validate_unique_value::<Brand, _>(
            &repo,
            LookupField::Name,
            &json!("Other"),
            "brand",
            None,
        )
        .await;
        assert!(free.is_ok());
    }

    #[tokio::test]
    async fn unique_value_checks_attributes_too() {
        let (repo, ids) = repo_with(&["Acme", "Globex"]).await;
        let website = json!("https://acme.test");
        let field = LookupField::Attribute("website");

        let result =
            validate_unique_value::<Brand, _>(&repo, field, &website, "brand", Some(ids[1])).await;
        match result {
            Err(DomainError::Conflict { message, .. }) => {
                assert_eq!(message, "website 'https://acme.test' is already taken");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn locked_entities_cannot_be_deleted() {
        let (repo, ids) = repo_with(&["Acme"]).await;
        let entity = repo.find_by_id(ids[0]).await.unwrap().unwrap();
        let locked = Entity::<Brand>::hydrate(
            ids[0],
            entity.name().to_string(),
            Status::Locked,
            entity.detail_info().clone(),
            entity.version(),
            entity.fields().clone(),
        );

        assert!(validate_can_be_deleted(Some(entity), ids[0]).is_ok());
        assert!(matches!(
            validate_can_be_deleted(Some(locked), ids[0]),
            Err(DomainError::Conflict { .. })
        ));
        assert!(matches!(
            validate_can_be_deleted::<Brand>(None, ids[0]),
            Err(DomainError::NotFound { .. })
        ));
    }
}
