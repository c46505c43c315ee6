use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use server_api::{
    api_document, create_user, dashboard, delete_user, delete_users_by_role, list_users,
    update_user, user_profile_url, ApiContext, DeleteByRoleQuery, ListUsersQuery,
};
use shared::{
    domain::RecordId,
    error::ApiError,
    openapi::ApiDocument,
    protocol::{
        Dashboard, UserInput, UserRecord, PAGINATION_CURRENT_PAGE_HEADER, PAGINATION_LIMIT_HEADER,
        PAGINATION_TOTAL_PAGES_HEADER,
    },
};
use storage::Storage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, prepare_database_url};

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

type HttpError = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        public_url: settings.public_url(),
        default_page_size: settings.default_page_size,
    };

    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "admin api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/dashboard", get(http_dashboard))
        .route("/swagger.json", get(http_api_document))
        .route(
            "/users",
            get(http_list_users)
                .post(http_create_user)
                .delete(http_delete_users_by_role),
        )
        .route("/users/:id", put(http_update_user).delete(http_delete_user))
        .route("/users/:id/profile", get(http_user_profile))
        .with_state(state)
}

fn http_error(err: ApiError) -> HttpError {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(message = %err.message, "admin api request failed");
    }
    (status, Json(err))
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state
        .api
        .storage
        .health_check()
        .await
        .map_err(|e| http_error(ApiError::internal(e.to_string())))?;
    Ok("ok")
}

async fn http_dashboard() -> Json<Dashboard> {
    Json(dashboard())
}

async fn http_api_document() -> Json<ApiDocument> {
    Json(api_document())
}

async fn http_list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let listed = list_users(&state.api, query).await.map_err(http_error)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        PAGINATION_LIMIT_HEADER,
        HeaderValue::from(listed.pagination.size),
    );
    headers.insert(
        PAGINATION_CURRENT_PAGE_HEADER,
        HeaderValue::from(listed.pagination.current),
    );
    headers.insert(
        PAGINATION_TOTAL_PAGES_HEADER,
        HeaderValue::from(listed.pagination.max),
    );
    Ok((headers, Json(listed.rows)))
}

async fn http_create_user(
    State(state): State<Arc<AppState>>,
    Json(input): Json<UserInput>,
) -> Result<Json<UserRecord>, HttpError> {
    let user = create_user(&state.api, input).await.map_err(http_error)?;
    info!(user_id = user.id.0, "user created");
    Ok(Json(user))
}

async fn http_update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(input): Json<UserInput>,
) -> Result<Json<UserRecord>, HttpError> {
    let user = update_user(&state.api, RecordId(id), input)
        .await
        .map_err(http_error)?;
    Ok(Json(user))
}

async fn http_delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, HttpError> {
    delete_user(&state.api, RecordId(id))
        .await
        .map_err(http_error)?;
    info!(user_id = id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn http_delete_users_by_role(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeleteByRoleQuery>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let deleted = delete_users_by_role(&state.api, query)
        .await
        .map_err(http_error)?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

async fn http_user_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<String>, HttpError> {
    let url = user_profile_url(&state.api, RecordId(id))
        .await
        .map_err(http_error)?;
    Ok(Json(url))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
