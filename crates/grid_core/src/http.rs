use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, Response};
use serde_json::{Map, Value};
use shared::{
    domain::{Method, OperationDescriptor, PaginationInfo, ParameterLocation},
    openapi::ApiDocument,
    protocol::{
        Dashboard, PAGINATION_CURRENT_PAGE_HEADER, PAGINATION_LIMIT_HEADER,
        PAGINATION_TOTAL_PAGES_HEADER,
    },
};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::{
    schema::derive_metadata, store::MemoryStore, ComponentSnapshot, DataSource, DataSourceError,
    FetchRequest, OperationResponse,
};

/// [`DataSource`] backed by an admin API that serves `/swagger.json`.
pub struct HttpDataSource {
    http: Client,
    base_url: Url,
    store: Arc<MemoryStore>,
    document: RwLock<Option<Arc<ApiDocument>>>,
}

impl HttpDataSource {
    pub fn new(server_url: &str, store: Arc<MemoryStore>, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(server_url).with_context(|| format!("invalid server url: {server_url}"))?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url,
            store,
            document: RwLock::new(None),
        })
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    fn endpoint(&self, path: &str) -> Result<Url, DataSourceError> {
        self.base_url
            .join(path)
            .map_err(|err| DataSourceError::transport(format!("invalid endpoint {path}: {err}")))
    }

    pub async fn load_dashboard(&self) -> Result<Dashboard> {
        let url = self.endpoint("/dashboard")?;
        let dashboard = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("failed to decode dashboard")?;
        Ok(dashboard)
    }

    /// Fetches `/swagger.json` once and keeps it for later calls.
    pub async fn document(&self) -> Result<Arc<ApiDocument>, DataSourceError> {
        if let Some(document) = self.document.read().await.as_ref() {
            return Ok(Arc::clone(document));
        }
        let mut cached = self.document.write().await;
        if let Some(document) = cached.as_ref() {
            return Ok(Arc::clone(document));
        }
        let response = self
            .http
            .get(self.endpoint("/swagger.json")?)
            .send()
            .await
            .map_err(request_error)?;
        let document: ApiDocument = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(request_error)?;
        info!(title = %document.info.title, "loaded api document");
        let document = Arc::new(document);
        *cached = Some(Arc::clone(&document));
        Ok(document)
    }

    /// Substitutes `{name}` path segments from `params`.
    fn resolve_path(
        operation: &OperationDescriptor,
        params: &Map<String, Value>,
    ) -> Result<String, DataSourceError> {
        let mut path = operation.path.clone();
        for parameter in &operation.parameters {
            if parameter.location != ParameterLocation::Path {
                continue;
            }
            let value = params.get(&parameter.name).ok_or_else(|| {
                DataSourceError::transport(format!(
                    "missing path parameter `{}` for {}",
                    parameter.name,
                    operation.label()
                ))
            })?;
            path = path.replace(&format!("{{{}}}", parameter.name), &scalar(value));
        }
        Ok(path)
    }
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

fn request_error(err: reqwest::Error) -> DataSourceError {
    DataSourceError {
        status: err.status().map(|status| status.as_u16()),
        message: err.to_string(),
    }
}

async fn ensure_success(response: Response) -> Result<Response, DataSourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("request failed with status {status}"));
    Err(DataSourceError::status(status.as_u16(), message))
}

fn header_u32(headers: &HeaderMap, name: &str) -> Option<u32> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Pagination as announced by the `x-pagination-*` response headers.
pub fn read_pagination(headers: &HeaderMap) -> Option<PaginationInfo> {
    Some(PaginationInfo {
        size: header_u32(headers, PAGINATION_LIMIT_HEADER)?,
        current: header_u32(headers, PAGINATION_CURRENT_PAGE_HEADER)?,
        max: header_u32(headers, PAGINATION_TOTAL_PAGES_HEADER)?,
    })
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn fetch(&self, request: FetchRequest) -> Result<(), DataSourceError> {
        let document = self.document().await?;
        let api = &request.descriptor.api;
        let metadata = derive_metadata(&document, api)
            .map_err(|err| DataSourceError::transport(err.to_string()))?;

        let response = self
            .http
            .request(http_method(api.method), self.endpoint(&api.path)?)
            .query(&request.query)
            .send()
            .await
            .map_err(request_error)?;
        let response = ensure_success(response).await?;
        let pagination = if request.descriptor.pagination {
            read_pagination(response.headers())
        } else {
            None
        };
        let body: Value = response.json().await.map_err(request_error)?;
        debug!(
            component = %request.component,
            generation = request.generation,
            rows = body.as_array().map(Vec::len),
            "fetched component rows"
        );

        self.store.commit(
            &request.component,
            request.generation,
            ComponentSnapshot {
                response: Some(body),
                columns: metadata.columns,
                table_operations: metadata.table_operations,
                row_operations: metadata.row_operations,
                post_operation: metadata.post_operation,
                search_parameters: metadata.search_parameters,
                primary: request.descriptor.primary.clone(),
                pagination,
                auto_refresh_sec: request.descriptor.auto_refresh_sec,
            },
        );
        Ok(())
    }

    async fn operate(
        &self,
        operation: &OperationDescriptor,
        params: &Map<String, Value>,
    ) -> Result<OperationResponse, DataSourceError> {
        let path = Self::resolve_path(operation, params)?;
        let query: Vec<(String, String)> = operation
            .parameters
            .iter()
            .filter(|parameter| parameter.location == ParameterLocation::Query)
            .filter_map(|parameter| {
                params
                    .get(&parameter.name)
                    .filter(|value| !value.is_null())
                    .map(|value| (parameter.name.clone(), scalar(value)))
            })
            .collect();
        let body = operation.parameters.iter().find_map(|parameter| {
            matches!(parameter.location, ParameterLocation::Body { .. })
                .then(|| params.get(&parameter.name))
                .flatten()
        });

        let mut builder = self
            .http
            .request(http_method(operation.method), self.endpoint(&path)?)
            .query(&query);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await.map_err(request_error)?;
        let response = ensure_success(response).await?;
        let text = response.text().await.map_err(request_error)?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        info!(operation = %operation.label(), path = %path, "operation completed");
        Ok(OperationResponse { body })
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
