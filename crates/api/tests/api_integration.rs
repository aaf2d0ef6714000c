//! Integration tests for the API server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use record_store::{Store, Transport, TransportError};
use todos::{NewTodo, Todo, TodoActions, TodoError, TodoPatch, selectors};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    setup_with_state().0
}

fn setup_with_state() -> (axum::Router, Arc<api::routes::todos::AppState>) {
    let metrics_handle = get_metrics_handle();
    let state = api::create_default_state();
    let app = api::create_app(state.clone(), metrics_handle);
    (app, state)
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Routes record-store requests straight into the router.
#[derive(Clone)]
struct RouterTransport {
    app: axum::Router,
}

#[async_trait]
impl Transport for RouterTransport {
    async fn send(&self, request: record_store::Request) -> record_store::Result<record_store::Response> {
        let (status, body) = send(
            &self.app,
            request.method.as_str(),
            &request.path,
            request.body,
        )
        .await;
        Ok(record_store::Response::new(status.as_u16(), body))
    }
}

fn client() -> (TodoActions<RouterTransport>, Arc<api::routes::todos::AppState>) {
    let (app, state) = setup_with_state();
    (TodoActions::new(Store::new(), RouterTransport { app }), state)
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["todos"], 0);
}

#[tokio::test]
async fn test_create_and_get_todo() {
    let app = setup();

    let (status, created) = send(
        &app,
        "POST",
        "/todos",
        Some(serde_json::json!({ "title": "  buy milk  " })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["title"], "buy milk");
    assert_eq!(created["completed"], false);
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let (status, fetched) = send(&app, "GET", &format!("/todos/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_create_keeps_client_id() {
    let (app, state) = setup_with_state();

    let (status, created) = send(
        &app,
        "POST",
        "/todos",
        Some(serde_json::json!({ "id": "abc", "title": "chosen id", "completed": true })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["id"], "abc");
    assert_eq!(state.store.get("abc").map(|t| t.completed), Some(true));
}

#[tokio::test]
async fn test_create_duplicate_id_conflicts() {
    let app = setup();
    let body = serde_json::json!({ "id": "dup", "title": "first" });
    send(&app, "POST", "/todos", Some(body)).await;

    let (status, json) = send(
        &app,
        "POST",
        "/todos",
        Some(serde_json::json!({ "id": "dup", "title": "second" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("dup"));
    let (_, fetched) = send(&app, "GET", "/todos/dup", None).await;
    assert_eq!(fetched["title"], "first");
}

#[tokio::test]
async fn test_create_blank_title_is_rejected() {
    let (app, state) = setup_with_state();

    let (status, json) = send(
        &app,
        "POST",
        "/todos",
        Some(serde_json::json!({ "title": "   " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
    assert!(state.store.is_empty());
}

#[tokio::test]
async fn test_get_nonexistent_todo() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/todos/missing", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_list_filters_todos() {
    let (app, state) = setup_with_state();
    state.store.insert("a", Todo::new("a", "open"));
    state.store.insert("b", Todo::new("b", "done").toggled());

    let (status, all) = send(&app, "GET", "/todos", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, active) = send(&app, "GET", "/todos?filter=active", None).await;
    let active = active.as_array().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], "a");

    let (_, completed) = send(&app, "GET", "/todos?filter=completed", None).await;
    assert_eq!(completed[0]["id"], "b");

    let (status, json) = send(&app, "GET", "/todos?filter=someday", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("someday"));
}

#[tokio::test]
async fn test_patch_updates_existing_todo() {
    let (app, state) = setup_with_state();
    let original = Todo::new("1", "buy milk");
    state.store.insert("1", original.clone());

    let (status, json) = send(
        &app,
        "PATCH",
        "/todos/1",
        Some(serde_json::json!({ "completed": true })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["completed"], true);
    assert_eq!(json["title"], "buy milk");
    let stored = state.store.get("1").unwrap();
    assert_eq!(stored.created_at, original.created_at);
}

#[tokio::test]
async fn test_patch_unknown_id_creates_todo() {
    let (app, state) = setup_with_state();

    let (status, json) = send(
        &app,
        "PATCH",
        "/todos/42",
        Some(serde_json::json!({ "title": "answer" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], "42");
    assert_eq!(state.store.get("42").map(|t| t.title), Some("answer".to_string()));
}

#[tokio::test]
async fn test_patch_unknown_id_without_title_is_rejected() {
    let (app, state) = setup_with_state();

    let (status, json) = send(
        &app,
        "PATCH",
        "/todos/77",
        Some(serde_json::json!({ "completed": true })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
    assert!(state.store.is_empty());
}

#[tokio::test]
async fn test_patch_blank_title_is_rejected() {
    let (app, state) = setup_with_state();
    state.store.insert("1", Todo::new("1", "keep me"));

    let (status, _) = send(
        &app,
        "PATCH",
        "/todos/1",
        Some(serde_json::json!({ "title": "" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.store.get("1").unwrap().title, "keep me");
}

#[tokio::test]
async fn test_delete_todo() {
    let (app, state) = setup_with_state();
    state.store.insert("1", Todo::new("1", "short lived"));

    let (status, body) = send(&app, "DELETE", "/todos/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, serde_json::Value::Null);
    assert!(state.store.is_empty());

    let (status, _) = send(&app, "DELETE", "/todos/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats() {
    let (app, state) = setup_with_state();
    state.store.insert("a", Todo::new("a", "open"));
    state.store.insert("b", Todo::new("b", "done").toggled());
    state.store.insert("c", Todo::new("c", "also done").toggled());

    let (status, json) = send(&app, "GET", "/stats", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 3);
    assert_eq!(json["completed"], 2);
    assert_eq!(json["remaining"], 1);
    let percentage = json["completion_percentage"].as_f64().unwrap();
    assert!((percentage - 66.67).abs() < 0.01);
}

#[tokio::test]
async fn test_metrics_endpoint_reports_store_updates() {
    let app = setup();
    send(
        &app,
        "POST",
        "/todos",
        Some(serde_json::json!({ "title": "counted" })),
    )
    .await;

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
    assert!(text.contains("record_store_updates_total"));
}

#[tokio::test]
async fn test_client_add_is_confirmed_by_server() {
    let (actions, state) = client();

    let todo = actions.add(NewTodo::new("write tests")).await.unwrap();

    assert_eq!(state.store.get(todo.id.as_str()), Some(todo.clone()));
    assert_eq!(actions.store().get(todo.id.as_str()), Some(todo));
}

#[tokio::test]
async fn test_client_toggle_twice_fires_twice() {
    let (actions, _) = client();
    let todo = actions.add(NewTodo::new("buy milk")).await.unwrap();
    let id = todo.id.to_string();

    let firings = Arc::new(AtomicUsize::new(0));
    let f = Arc::clone(&firings);
    let handle = actions.store().subscribe(selectors::completed(&id), move |_| {
        f.fetch_add(1, Ordering::SeqCst);
    });

    actions.toggle(&id).await.unwrap();
    actions.toggle(&id).await.unwrap();

    assert_eq!(firings.load(Ordering::SeqCst), 2);
    assert_eq!(actions.store().get(&id).map(|t| t.completed), Some(false));
    handle.release();
}

#[tokio::test]
async fn test_client_update_unknown_id_is_stored_under_that_id() {
    let (actions, state) = client();

    let todo = actions
        .update("42", TodoPatch::title("answer"))
        .await
        .unwrap();

    assert_eq!(todo.id.as_str(), "42");
    assert_eq!(actions.store().get("42"), Some(todo.clone()));
    assert_eq!(state.store.get("42"), Some(todo));
}

#[tokio::test]
async fn test_client_remove_rejected_by_server_rolls_back() {
    let (actions, state) = client();
    let local_only = Todo::new("ghost", "never confirmed");
    actions.store().insert("ghost", local_only.clone());

    let result = actions.remove("ghost").await;

    assert!(matches!(result, Err(TodoError::Rejected(TransportError::Status { status: 404, .. }))));
    assert_eq!(actions.store().get("ghost"), Some(local_only));
    assert!(state.store.is_empty());
}

#[tokio::test]
async fn test_client_load_matches_server() {
    let (actions, state) = client();
    state.store.insert("a", Todo::new("a", "server one"));
    state.store.insert("b", Todo::new("b", "server two"));

    let count = actions.load().await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(actions.store().read(), state.store.read());
}
