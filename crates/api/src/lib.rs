//! HTTP API server with observability for the entity lifecycle core.
//!
//! Provides REST endpoints for every managed resource, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use domain::{
    Authorizer, Brand, Clock, LifecycleService, Placeholder, StoreRepository, SystemClock,
};
use entity_store::EntityStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::resources::ResourceState;

/// Shared application state: one lifecycle service per resource.
pub struct AppState<S: EntityStore> {
    pub brands: Arc<ResourceState<Brand, StoreRepository<S, Brand>>>,
    pub placeholders: Arc<ResourceState<Placeholder, StoreRepository<S, Placeholder>>>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EntityStore + 'static>(
    state: AppState<S>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .merge(routes::resources::router("brands", state.brands))
        .merge(routes::resources::router("placeholders", state.placeholders))
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over one shared store.
pub fn create_default_state<S: EntityStore + Clone + 'static>(
    store: S,
    authorizer: Arc<dyn Authorizer>,
    page_limit: usize,
) -> AppState<S> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let brands = ResourceState {
        service: LifecycleService::new(StoreRepository::new(store.clone()), clock.clone()),
        authorizer: authorizer.clone(),
        page_limit,
    };
    let placeholders = ResourceState {
        service: LifecycleService::new(StoreRepository::new(store), clock),
        authorizer,
        page_limit,
    };

    AppState {
        brands: Arc::new(brands),
        placeholders: Arc::new(placeholders),
    }
}
