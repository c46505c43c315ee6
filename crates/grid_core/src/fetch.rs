use std::{collections::BTreeMap, time::Duration};

use serde::Deserialize;
use serde_json::Value;
use shared::domain::ApiDescriptor;
use thiserror::Error;

use crate::{query_state::SortEntry, DataSourceError};

/// Minimum time the loading state stays visible for a single fetch.
pub const ANTI_FLICKER_FLOOR: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: u32,
    pub offset: u32,
}

impl PageWindow {
    /// `page` is 1-based.
    pub fn for_page(size: u32, page: u32) -> Self {
        Self {
            limit: size,
            offset: page.saturating_sub(1).saturating_mul(size),
        }
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

/// Search queries first, then the page window, then `sort`; later keys win.
/// `sort` is always present, empty when unsorted.
pub fn build_query_params(
    search_queries: &BTreeMap<String, Value>,
    window: Option<PageWindow>,
    sort: &[SortEntry],
) -> BTreeMap<String, String> {
    let mut params: BTreeMap<String, String> = search_queries
        .iter()
        .map(|(key, value)| (key.clone(), query_value(value)))
        .collect();
    if let Some(window) = window {
        params.insert("limit".to_string(), window.limit.to_string());
        params.insert("offset".to_string(), window.offset.to_string());
    }
    let sort = sort
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    params.insert("sort".to_string(), sort);
    params
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("response is not an array")]
    NotArray,
    #[error("response is empty")]
    Empty,
    #[error("first row is not an object")]
    NotObject,
}

/// Minimal shape check on a list response.
pub fn validate(data: Option<&Value>) -> Result<(), ValidationError> {
    let Some(Value::Array(rows)) = data else {
        return Err(ValidationError::NotArray);
    };
    match rows.first() {
        None => Err(ValidationError::Empty),
        Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(ValidationError::NotObject),
    }
}

/// User-facing strings for grid errors. Missing keys keep the English default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub unauthorized: String,
    pub network: String,
    pub not_array: String,
    pub empty: String,
    pub not_object: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            unauthorized: "You are not authorized to view this data.".to_string(),
            network: "Failed to load data. Please check your connection.".to_string(),
            not_array: "The response is not a list.".to_string(),
            empty: "No data.".to_string(),
            not_object: "The response rows are not objects.".to_string(),
        }
    }
}

impl Messages {
    pub fn validation(&self, error: ValidationError) -> String {
        match error {
            ValidationError::NotArray => self.not_array.clone(),
            ValidationError::Empty => self.empty.clone(),
            ValidationError::NotObject => self.not_object.clone(),
        }
    }

    pub fn fetch_failure(&self, api: &ApiDescriptor, error: &DataSourceError) -> String {
        if error.is_unauthorized() {
            self.unauthorized.clone()
        } else {
            format!("[{} {}] {}", api.method, api.path, self.network)
        }
    }
}

#[cfg(test)]
#[path = "tests/fetch_tests.rs"]
mod tests;
