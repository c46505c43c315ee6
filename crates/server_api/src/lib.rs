use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use shared::{
    domain::{ApiDescriptor, Method, PaginationInfo, ParameterDescriptor, RecordId, Schema},
    error::ApiError,
    openapi::{ApiDocument, OperationObject, ResponseObject},
    protocol::{ComponentDescriptor, Dashboard, DashboardPage, UserInput, UserRecord, UserRole},
};
use storage::{Storage, UserColumn, UserFilter, UserSort};
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 200;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    /// Base URL used when handing out profile links.
    pub public_url: String,
    pub default_page_size: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteByRoleQuery {
    pub role: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListedUsers {
    pub rows: Vec<UserRecord>,
    pub pagination: PaginationInfo,
}

/// Parses `key:asc,key:desc` into sort keys; an empty string means unsorted.
pub fn parse_sort(raw: &str) -> Result<Vec<UserSort>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (key, direction) = entry
                .split_once(':')
                .ok_or_else(|| ApiError::validation(format!("malformed sort entry '{entry}'")))?;
            let column = UserColumn::parse(key)
                .ok_or_else(|| ApiError::validation(format!("column '{key}' is not sortable")))?;
            let descending = match direction {
                "asc" => false,
                "desc" => true,
                other => {
                    return Err(ApiError::validation(format!(
                        "sort direction '{other}' must be asc or desc"
                    )))
                }
            };
            Ok(UserSort { column, descending })
        })
        .collect()
}

fn parse_role(raw: Option<&str>) -> Result<Option<UserRole>, ApiError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(None),
        Some(raw) => UserRole::parse(raw)
            .map(Some)
            .ok_or_else(|| ApiError::validation(format!("unknown role '{raw}'"))),
    }
}

pub async fn list_users(ctx: &ApiContext, query: ListUsersQuery) -> Result<ListedUsers, ApiError> {
    let limit = query
        .limit
        .unwrap_or(ctx.default_page_size)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);
    let filter = UserFilter {
        name: query.name,
        role: parse_role(query.role.as_deref())?,
        sort: parse_sort(query.sort.as_deref().unwrap_or_default())?,
        limit,
        offset,
    };
    let page = ctx.storage.list_users(&filter).await.map_err(internal)?;
    let max = page.total.div_ceil(u64::from(limit)).max(1);
    debug!(limit, offset, total = page.total, "listed users");
    Ok(ListedUsers {
        rows: page.rows,
        pagination: PaginationInfo {
            size: limit,
            current: offset / limit + 1,
            max: u32::try_from(max).unwrap_or(u32::MAX),
        },
    })
}

fn validate_input(input: &UserInput) -> Result<(), ApiError> {
    if input.name.trim().is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }
    if !input.email.contains('@') {
        return Err(ApiError::validation("email must contain '@'"));
    }
    Ok(())
}

pub async fn create_user(ctx: &ApiContext, input: UserInput) -> Result<UserRecord, ApiError> {
    validate_input(&input)?;
    ctx.storage.create_user(&input).await.map_err(storage_write)
}

pub async fn update_user(
    ctx: &ApiContext,
    id: RecordId,
    input: UserInput,
) -> Result<UserRecord, ApiError> {
    validate_input(&input)?;
    ctx.storage
        .update_user(id, &input)
        .await
        .map_err(storage_write)?
        .ok_or_else(|| ApiError::not_found(format!("user {} not found", id.0)))
}

pub async fn delete_user(ctx: &ApiContext, id: RecordId) -> Result<(), ApiError> {
    if ctx.storage.delete_user(id).await.map_err(internal)? {
        Ok(())
    } else {
        Err(ApiError::not_found(format!("user {} not found", id.0)))
    }
}

pub async fn delete_users_by_role(
    ctx: &ApiContext,
    query: DeleteByRoleQuery,
) -> Result<u64, ApiError> {
    let role = parse_role(query.role.as_deref())?
        .ok_or_else(|| ApiError::validation("role is required"))?;
    ctx.storage
        .delete_users_by_role(role)
        .await
        .map_err(internal)
}

/// Link to a user's public profile page; the grid opens it as a preview.
pub async fn user_profile_url(ctx: &ApiContext, id: RecordId) -> Result<String, ApiError> {
    let user = ctx
        .storage
        .get_user(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("user {} not found", id.0)))?;
    Ok(format!(
        "{}/profiles/{}",
        ctx.public_url.trim_end_matches('/'),
        user.id.0
    ))
}

pub fn dashboard() -> Dashboard {
    Dashboard {
        name: "Sample admin".to_string(),
        pages: vec![DashboardPage {
            id: "users".to_string(),
            name: "Users".to_string(),
            components: vec![
                ComponentDescriptor {
                    name: "users".to_string(),
                    api: ApiDescriptor {
                        method: Method::Get,
                        path: "/users".to_string(),
                    },
                    pagination: true,
                    primary: Some("id".to_string()),
                    auto_refresh_sec: None,
                    table_labels: vec!["name".to_string(), "email".to_string()],
                },
                ComponentDescriptor {
                    name: "users_live".to_string(),
                    api: ApiDescriptor {
                        method: Method::Get,
                        path: "/users".to_string(),
                    },
                    pagination: false,
                    primary: Some("id".to_string()),
                    auto_refresh_sec: Some(30),
                    table_labels: Vec::new(),
                },
            ],
        }],
    }
}

fn property(kind: &str, description: &str) -> Value {
    json!({ "type": kind, "description": description })
}

fn user_properties(with_id: bool) -> Map<String, Value> {
    let mut properties = Map::new();
    if with_id {
        properties.insert("id".into(), property("integer", "ID"));
    }
    properties.insert("name".into(), property("string", "Name"));
    properties.insert("email".into(), property("string", "E-mail"));
    properties.insert(
        "role".into(),
        json!({ "type": "string", "description": "Role", "enum": ["admin", "editor", "viewer"] }),
    );
    if with_id {
        properties.insert(
            "created_at".into(),
            json!({ "type": "string", "format": "date-time", "description": "Created" }),
        );
    }
    properties
}

fn ok_response(schema: Option<Schema>) -> BTreeMap<String, ResponseObject> {
    [(
        "200".to_string(),
        ResponseObject {
            description: "success".to_string(),
            schema,
        },
    )]
    .into_iter()
    .collect()
}

/// OpenAPI description of the admin endpoints served by this crate.
pub fn api_document() -> ApiDocument {
    let mut doc = ApiDocument::new("Sample admin API", env!("CARGO_PKG_VERSION"));
    let user_body = || ParameterDescriptor::body("payload", Schema::object(user_properties(false)));

    doc.insert(
        Method::Get,
        "/users",
        OperationObject {
            operation_id: Some("listUsers".into()),
            summary: Some("List users".into()),
            parameters: vec![
                ParameterDescriptor::query("limit", "integer"),
                ParameterDescriptor::query("offset", "integer"),
                ParameterDescriptor::query("sort", "string"),
                ParameterDescriptor::query("name", "string").with_description("Name contains"),
                ParameterDescriptor::query("role", "string").with_description("Role"),
            ],
            responses: ok_response(Some(Schema::array_of(Schema::object(user_properties(true))))),
            ..OperationObject::default()
        },
    );
    doc.insert(
        Method::Post,
        "/users",
        OperationObject {
            operation_id: Some("createUser".into()),
            summary: Some("Create user".into()),
            parameters: vec![user_body()],
            responses: ok_response(None),
            ..OperationObject::default()
        },
    );
    doc.insert(
        Method::Delete,
        "/users",
        OperationObject {
            operation_id: Some("deleteUsersByRole".into()),
            summary: Some("Delete users by role".into()),
            parameters: vec![ParameterDescriptor::query("role", "string")],
            responses: ok_response(None),
            ..OperationObject::default()
        },
    );
    doc.insert(
        Method::Put,
        "/users/{id}",
        OperationObject {
            operation_id: Some("updateUser".into()),
            summary: Some("Edit user".into()),
            parameters: vec![ParameterDescriptor::path("id"), user_body()],
            responses: ok_response(None),
            ..OperationObject::default()
        },
    );
    doc.insert(
        Method::Delete,
        "/users/{id}",
        OperationObject {
            operation_id: Some("deleteUser".into()),
            summary: Some("Delete user".into()),
            parameters: vec![ParameterDescriptor::path("id")],
            responses: ok_response(None),
            ..OperationObject::default()
        },
    );
    doc.insert(
        Method::Get,
        "/users/{id}/profile",
        OperationObject {
            operation_id: Some("userProfile".into()),
            summary: Some("Open profile".into()),
            parameters: vec![ParameterDescriptor::path("id")],
            responses: ok_response(Some(Schema {
                kind: Some("string".into()),
                ..Schema::default()
            })),
            preview: true,
            target: Some("_blank".into()),
        },
    );
    doc
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::internal(format!("{err:#}"))
}

fn storage_write(err: anyhow::Error) -> ApiError {
    let message = format!("{err:#}");
    if message.contains("UNIQUE") {
        ApiError::validation("email is already registered")
    } else {
        ApiError::internal(message)
    }
}
