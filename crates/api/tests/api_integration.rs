//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::StaticAuthorizer;
use entity_store::InMemoryEntityStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");
            api::routes::metrics::describe();
            handle
        })
        .clone()
}

fn setup() -> axum::Router {
    setup_with_permissions(["*"])
}

fn setup_with_permissions<const N: usize>(permissions: [&str; N]) -> axum::Router {
    let state = api::create_default_state(
        InMemoryEntityStore::new(),
        Arc::new(StaticAuthorizer::new(permissions)),
        20,
    );
    api::create_app(state, get_metrics_handle())
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-actor-id", "u-alice")
        .header("x-actor-name", "Alice");
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "entity-lifecycle");
}

#[tokio::test]
async fn test_create_and_get_brand() {
    let app = setup();

    let (status, created) = send(
        &app,
        "POST",
        "/brands",
        Some(json!({
            "name": "  Acme  ",
            "is_synced": true,
            "website": "https://acme.test",
            "detail_info": {"region": "eu"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Acme");
    assert_eq!(created["status"], "draft");
    assert_eq!(created["version"], 1);
    assert_eq!(created["is_synced"], true);
    assert_eq!(created["detail_info"]["region"], "eu");
    assert_eq!(created["detail_info"]["audit"]["created_by"], "u-alice");

    let id = created["id"].as_i64().unwrap();
    let (status, fetched) = send(&app, "GET", &format!("/brands/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_brand_round_trip() {
    let app = setup();
    let (_, created) = send(&app, "POST", "/brands", Some(json!({"name": "Acme"}))).await;
    let id = created["id"].as_i64().unwrap();
    let item = format!("/brands/{id}");

    let (status, updated) = send(
        &app,
        "PATCH",
        &item,
        Some(json!({"lock_version": 1, "status": "active", "website": "https://acme.test"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["version"], 2);
    assert_eq!(updated["status"], "active");
    assert_eq!(updated["website"], "https://acme.test");

    // Stale version
    let (status, body) = send(
        &app,
        "PATCH",
        &item,
        Some(json!({"lock_version": 1, "name": "Acme Corp"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Optimistic lock"));

    // Clearing the website
    let (status, cleared) = send(
        &app,
        "PATCH",
        &item,
        Some(json!({"lock_version": 2, "website": null})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cleared.get("website").is_none());

    let (status, deleted) = send(&app, "DELETE", &item, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["status"], "deleted");
    assert_eq!(deleted["version"], 4);

    let (status, _) = send(&app, "GET", &item, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, restored) = send(&app, "POST", &format!("{item}/restore"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["status"], "draft");
    assert_eq!(restored["version"], 5);
    assert!(restored["detail_info"]["audit"].get("deleted_at").is_none());
    assert_eq!(restored["detail_info"]["audit"]["restored_by"], "u-alice");
}

#[tokio::test]
async fn test_guard_errors_map_to_statuses() {
    let app = setup();
    let (_, created) = send(&app, "POST", "/brands", Some(json!({"name": "Acme"}))).await;
    let item = format!("/brands/{}", created["id"]);

    let (status, _) = send(&app, "PATCH", &item, Some(json!({"lock_version": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/brands", Some(json!({"name": "Acme"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "PATCH",
        &item,
        Some(json!({"lock_version": 1, "status": "locked"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "GET", "/brands/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_permission_is_forbidden() {
    let app = setup_with_permissions(["brand.create", "brand.update"]);
    let (status, created) = send(&app, "POST", "/brands", Some(json!({"name": "Acme"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let item = format!("/brands/{}", created["id"]);
    let (status, body) = send(&app, "DELETE", &item, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("brand.delete"));

    let (status, _) = send(
        &app,
        "POST",
        "/placeholders",
        Some(json!({"name": "Draft copy"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_brands() {
    let app = setup();
    for name in ["Acme", "Acme West", "Globex"] {
        let (status, _) = send(&app, "POST", "/brands", Some(json!({"name": name}))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = send(&app, "GET", "/brands?name=acme&limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["limit"], 1);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["items"][0]["name"], "Acme");

    let (status, _) = send(&app, "GET", "/brands?status=archived", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_placeholders_share_the_lifecycle() {
    let app = setup();
    let (status, created) = send(
        &app,
        "POST",
        "/placeholders",
        Some(json!({"name": "Draft copy", "description": "tbd"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["description"], "tbd");

    let item = format!("/placeholders/{}", created["id"]);
    let (status, updated) = send(
        &app,
        "PATCH",
        &item,
        Some(json!({"lock_version": 1, "description": "final"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["description"], "final");
    assert_eq!(updated["version"], 2);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    send(&app, "POST", "/brands", Some(json!({"name": "Acme"}))).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("entity_mutations_total"));
    assert!(text.contains("# HELP entity_mutations_total"));
}
