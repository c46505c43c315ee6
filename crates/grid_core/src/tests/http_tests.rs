use super::*;
use crate::ComponentStore;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response as AxumResponse},
    routing::get,
    Json, Router,
};
use serde_json::json;
use shared::{
    domain::{ApiDescriptor, ComponentId, ParameterDescriptor},
    protocol::ComponentDescriptor,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicUsize, Ordering},
};
use tokio::net::TcpListener;

#[derive(Default)]
struct Hits {
    documents: AtomicUsize,
}

fn api_document() -> Value {
    let rows = json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "id": { "type": "integer" },
                "name": { "type": "string" },
                "sort": { "type": "string" }
            }
        }
    });
    json!({
        "info": { "title": "test admin", "version": "1" },
        "paths": {
            "/users": {
                "get": {
                    "parameters": [{ "name": "name", "in": "query", "type": "string" }],
                    "responses": { "200": { "description": "rows", "schema": rows } }
                },
                "delete": {
                    "operationId": "deleteUsersByRole",
                    "parameters": [{ "name": "role", "in": "query", "type": "string" }]
                }
            },
            "/users/{id}": {
                "put": { "operationId": "updateUser" }
            },
            "/secret": {
                "get": { "responses": { "200": { "description": "rows", "schema": rows } } }
            }
        }
    })
}

async fn swagger(State(hits): State<Arc<Hits>>) -> Json<Value> {
    hits.documents.fetch_add(1, Ordering::SeqCst);
    Json(api_document())
}

async fn list_users(Query(query): Query<HashMap<String, String>>) -> AxumResponse {
    let sort = query.get("sort").cloned().unwrap_or_default();
    (
        [
            ("x-pagination-limit", "2"),
            ("x-pagination-current-page", "1"),
            ("x-pagination-total-pages", "3"),
        ],
        Json(json!([
            { "id": 1, "name": "alice", "sort": sort },
            { "id": 2, "name": "bob", "sort": sort },
        ])),
    )
        .into_response()
}

async fn delete_by_role(Query(query): Query<HashMap<String, String>>) -> StatusCode {
    if query.get("role").map(String::as_str) == Some("viewer") {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::BAD_REQUEST
    }
}

async fn update_user(Path(id): Path<i64>, Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "id": id, "body": body }))
}

async fn profile(Path(id): Path<i64>) -> Json<String> {
    Json(format!("http://admin.test/profiles/{id}"))
}

async fn secret() -> AxumResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "code": "unauthorized", "message": "token expired" })),
    )
        .into_response()
}

async fn dashboard() -> Json<Value> {
    Json(json!({
        "name": "admin",
        "pages": [{
            "id": "people",
            "name": "People",
            "components": [{
                "name": "users",
                "api": { "method": "get", "path": "/users" },
                "pagination": true
            }]
        }]
    }))
}

async fn spawn_server() -> (String, Arc<Hits>) {
    let hits = Arc::new(Hits::default());
    let app = Router::new()
        .route("/swagger.json", get(swagger))
        .route("/dashboard", get(dashboard))
        .route("/users", get(list_users).delete(delete_by_role))
        .route("/users/:id", axum::routing::put(update_user))
        .route("/users/:id/profile", get(profile))
        .route("/secret", get(secret))
        .with_state(Arc::clone(&hits));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{addr}"), hits)
}

fn source(base_url: &str) -> HttpDataSource {
    HttpDataSource::new(
        base_url,
        Arc::new(MemoryStore::new(true)),
        Duration::from_secs(5),
    )
    .expect("data source")
}

fn request(path: &str, pagination: bool, query: &[(&str, &str)]) -> FetchRequest {
    FetchRequest {
        component: ComponentId::new("users"),
        descriptor: ComponentDescriptor {
            name: "users".to_string(),
            api: ApiDescriptor {
                method: Method::Get,
                path: path.to_string(),
            },
            pagination,
            primary: Some("id".to_string()),
            auto_refresh_sec: Some(15),
            table_labels: Vec::new(),
        },
        query: query
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<BTreeMap<_, _>>(),
        generation: 1,
    }
}

#[tokio::test]
async fn fetch_commits_rows_metadata_and_pagination() {
    let (base_url, _) = spawn_server().await;
    let source = source(&base_url);

    source
        .fetch(request(
            "/users",
            true,
            &[("limit", "2"), ("offset", "0"), ("sort", "name:asc")],
        ))
        .await
        .expect("fetch");

    let snapshot = source
        .store()
        .component(&ComponentId::new("users"))
        .expect("committed slice");
    let rows = snapshot.response.expect("rows");
    assert_eq!(rows[1]["name"], "bob");
    assert_eq!(rows[0]["sort"], "name:asc");
    assert_eq!(
        snapshot.pagination,
        Some(PaginationInfo {
            size: 2,
            current: 1,
            max: 3
        })
    );
    let keys: Vec<&str> = snapshot.columns.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(keys, vec!["id", "name", "sort"]);
    assert_eq!(snapshot.table_operations.len(), 1);
    assert_eq!(snapshot.row_operations.len(), 1);
    assert_eq!(snapshot.search_parameters.len(), 1);
    assert_eq!(snapshot.primary.as_deref(), Some("id"));
    assert_eq!(snapshot.auto_refresh_sec, Some(15));
}

#[tokio::test]
async fn unpaginated_component_ignores_pagination_headers() {
    let (base_url, _) = spawn_server().await;
    let source = source(&base_url);

    source
        .fetch(request("/users", false, &[("sort", "")]))
        .await
        .expect("fetch");

    let snapshot = source
        .store()
        .component(&ComponentId::new("users"))
        .expect("committed slice");
    assert_eq!(snapshot.pagination, None);
}

#[tokio::test]
async fn api_document_is_fetched_once() {
    let (base_url, hits) = spawn_server().await;
    let source = source(&base_url);

    source
        .fetch(request("/users", true, &[]))
        .await
        .expect("first fetch");
    source
        .fetch(request("/users", true, &[]))
        .await
        .expect("second fetch");

    assert_eq!(hits.documents.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn error_status_carries_server_message() {
    let (base_url, _) = spawn_server().await;
    let source = source(&base_url);

    let err = source
        .fetch(request("/secret", false, &[]))
        .await
        .expect_err("unauthorized");
    assert!(err.is_unauthorized());
    assert_eq!(err.message, "token expired");
    assert!(source
        .store()
        .component(&ComponentId::new("users"))
        .is_none());
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let source = source(&format!("http://{addr}"));
    let err = source
        .fetch(request("/users", false, &[]))
        .await
        .expect_err("connection refused");
    assert_eq!(err.status, None);
}

#[tokio::test]
async fn operate_fills_path_and_sends_body() {
    let (base_url, _) = spawn_server().await;
    let source = source(&base_url);

    let mut operation = OperationDescriptor::new(Method::Put, "/users/{id}");
    operation.parameters = vec![
        ParameterDescriptor::path("id"),
        ParameterDescriptor::body("payload", shared::domain::Schema::default()),
    ];
    let params = json!({ "id": 7, "payload": { "name": "carol" } });

    let response = source
        .operate(&operation, params.as_object().expect("params"))
        .await
        .expect("operate");
    assert_eq!(response.body, json!({ "id": 7, "body": { "name": "carol" } }));
}

#[tokio::test]
async fn operate_sends_query_parameters_and_accepts_empty_body() {
    let (base_url, _) = spawn_server().await;
    let source = source(&base_url);

    let mut operation = OperationDescriptor::new(Method::Delete, "/users");
    operation.parameters = vec![ParameterDescriptor::query("role", "string")];
    let params = json!({ "role": "viewer" });

    let response = source
        .operate(&operation, params.as_object().expect("params"))
        .await
        .expect("operate");
    assert_eq!(response.body, Value::Null);

    let err = source
        .operate(&operation, &Map::new())
        .await
        .expect_err("missing role");
    assert_eq!(err.status, Some(400));
}

#[tokio::test]
async fn preview_operation_returns_link() {
    let (base_url, _) = spawn_server().await;
    let source = source(&base_url);

    let mut operation = OperationDescriptor::new(Method::Get, "/users/{id}/profile");
    operation.parameters = vec![ParameterDescriptor::path("id")];
    operation.is_preview = true;
    let params = json!({ "id": 3 });

    let response = source
        .operate(&operation, params.as_object().expect("params"))
        .await
        .expect("operate");
    assert_eq!(response.body, json!("http://admin.test/profiles/3"));
}

#[tokio::test]
async fn missing_path_parameter_fails_before_sending() {
    let source = source("http://127.0.0.1:9");
    let mut operation = OperationDescriptor::new(Method::Put, "/users/{id}");
    operation.parameters = vec![ParameterDescriptor::path("id")];

    let err = source
        .operate(&operation, &Map::new())
        .await
        .expect_err("missing id");
    assert!(err.message.contains("missing path parameter `id`"));
}

#[tokio::test]
async fn dashboard_is_loaded_from_server() {
    let (base_url, _) = spawn_server().await;
    let source = source(&base_url);

    let dashboard = source.load_dashboard().await.expect("dashboard");
    let (page, component) = dashboard.find_component("users").expect("component");
    assert_eq!(page.id, "people");
    assert!(component.pagination);
}

#[test]
fn pagination_requires_all_three_headers() {
    let mut headers = HeaderMap::new();
    headers.insert(PAGINATION_LIMIT_HEADER, "20".parse().expect("header"));
    headers.insert(PAGINATION_CURRENT_PAGE_HEADER, "2".parse().expect("header"));
    assert_eq!(read_pagination(&headers), None);

    headers.insert(PAGINATION_TOTAL_PAGES_HEADER, "4".parse().expect("header"));
    assert_eq!(
        read_pagination(&headers),
        Some(PaginationInfo {
            size: 20,
            current: 2,
            max: 4
        })
    );
}
