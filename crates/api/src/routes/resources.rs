//! Lifecycle endpoints shared by every resource.
//!
//! Each resource gets the same six routes under its collection path. The
//! calling actor is read from the `x-actor-id` and `x-actor-name` headers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use common::{Actor, EntityId};
use domain::{
    Authorizer, CreateCommand, EntityResponse, LifecycleService, Repository, RequestContext,
    Resource, Status, UpdateCommand,
};
use entity_store::{ListCriteria, Page};
use serde::Deserialize;

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_NAME_HEADER: &str = "x-actor-name";

const ANONYMOUS: &str = "anonymous";

/// State shared by the handlers of one resource.
pub struct ResourceState<R: Resource, Repo: Repository<R>> {
    pub service: LifecycleService<R, Repo>,
    pub authorizer: Arc<dyn Authorizer>,
    pub page_limit: usize,
}

type Shared<R, Repo> = State<Arc<ResourceState<R, Repo>>>;
type ApiResult<T> = Result<T, ApiError>;

/// Builds the router for one resource mounted at `/{collection}`.
pub fn router<R, Repo>(collection: &str, state: Arc<ResourceState<R, Repo>>) -> Router
where
    R: Resource,
    Repo: Repository<R> + 'static,
{
    let base = format!("/{collection}");
    let item = format!("/{collection}/{{id}}");
    let restore_path = format!("/{collection}/{{id}}/restore");

    Router::new()
        .route(&base, post(create::<R, Repo>).get(list::<R, Repo>))
        .route(
            &item,
            get(view::<R, Repo>)
                .patch(update::<R, Repo>)
                .delete(delete::<R, Repo>),
        )
        .route(&restore_path, post(restore::<R, Repo>))
        .with_state(state)
}

/// Query string of `GET /{collection}`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub name: Option<String>,
    /// Comma-separated status codes.
    pub status: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListParams {
    fn into_criteria(self, default_limit: usize) -> ApiResult<ListCriteria> {
        let mut criteria = ListCriteria::new()
            .limit(self.limit.unwrap_or(default_limit))
            .offset(self.offset.unwrap_or(0));
        if let Some(name) = self.name.filter(|n| !n.trim().is_empty()) {
            criteria = criteria.name_contains(name.trim());
        }
        if self.include_deleted {
            criteria = criteria.include_deleted();
        }
        if let Some(raw) = self.status {
            let statuses = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<Status>()
                        .map(|status| status.as_str().to_string())
                        .map_err(|e| ApiError::BadRequest(e.to_string()))
                })
                .collect::<ApiResult<Vec<_>>>()?;
            if !statuses.is_empty() {
                criteria.statuses = Some(statuses);
            }
        }
        Ok(criteria)
    }
}

/// Builds the request context from the actor headers.
pub fn request_context(headers: &HeaderMap, authorizer: Arc<dyn Authorizer>) -> RequestContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let id = header(ACTOR_ID_HEADER).unwrap_or_else(|| ANONYMOUS.to_string());
    let display_name = header(ACTOR_NAME_HEADER).unwrap_or_else(|| id.clone());
    RequestContext::new(Actor::new(id, display_name), authorizer)
}

/// POST /{collection}: create an entity.
#[tracing::instrument(skip_all, fields(resource = R::NAME))]
pub async fn create<R: Resource, Repo: Repository<R>>(
    State(state): Shared<R, Repo>,
    headers: HeaderMap,
    Json(command): Json<CreateCommand<R>>,
) -> ApiResult<(StatusCode, Json<EntityResponse<R::Fields>>)> {
    let ctx = request_context(&headers, state.authorizer.clone());
    let created = state.service.create(&ctx, command).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /{collection}: list entities.
#[tracing::instrument(skip_all, fields(resource = R::NAME))]
pub async fn list<R: Resource, Repo: Repository<R>>(
    State(state): Shared<R, Repo>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<EntityResponse<R::Fields>>>> {
    let criteria = params.into_criteria(state.page_limit)?;
    Ok(Json(state.service.list(&criteria).await?))
}

/// GET /{collection}/{id}: view one entity.
#[tracing::instrument(skip(state), fields(resource = R::NAME))]
pub async fn view<R: Resource, Repo: Repository<R>>(
    State(state): Shared<R, Repo>,
    Path(id): Path<i64>,
) -> ApiResult<Json<EntityResponse<R::Fields>>> {
    Ok(Json(state.service.view(EntityId::new(id)).await?))
}

/// PATCH /{collection}/{id}: update an entity at a known version.
#[tracing::instrument(skip(state, headers, command), fields(resource = R::NAME))]
pub async fn update<R: Resource, Repo: Repository<R>>(
    State(state): Shared<R, Repo>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(command): Json<UpdateCommand<R>>,
) -> ApiResult<Json<EntityResponse<R::Fields>>> {
    let ctx = request_context(&headers, state.authorizer.clone());
    Ok(Json(
        state.service.update(&ctx, EntityId::new(id), command).await?,
    ))
}

/// DELETE /{collection}/{id}: soft delete an entity.
#[tracing::instrument(skip(state, headers), fields(resource = R::NAME))]
pub async fn delete<R: Resource, Repo: Repository<R>>(
    State(state): Shared<R, Repo>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<EntityResponse<R::Fields>>> {
    let ctx = request_context(&headers, state.authorizer.clone());
    Ok(Json(state.service.delete(&ctx, EntityId::new(id)).await?))
}

/// POST /{collection}/{id}/restore: restore a soft-deleted entity.
#[tracing::instrument(skip(state, headers), fields(resource = R::NAME))]
pub async fn restore<R: Resource, Repo: Repository<R>>(
    State(state): Shared<R, Repo>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<EntityResponse<R::Fields>>> {
    let ctx = request_context(&headers, state.authorizer.clone());
    Ok(Json(state.service.restore(&ctx, EntityId::new(id)).await?))
}
