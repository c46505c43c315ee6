use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use shared::{
    domain::{
        ColumnDescriptor, ComponentId, OperationDescriptor, PaginationInfo, ParameterDescriptor,
    },
    protocol::ComponentDescriptor,
};
use thiserror::Error;
use tokio::sync::broadcast;

pub mod auto_refresh;
mod bindings;
pub mod dispatcher;
pub mod fetch;
mod grid;
pub mod http;
pub mod presentation;
pub mod query_state;
pub mod schema;
pub mod store;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

pub use bindings::{row_operations_icon, OperationsIcon};
pub use grid::{GridEvent, GridOptions, GridView, TableGrid};

/// Failure reported by a [`DataSource`]. `status` is the HTTP status when the
/// remote answered at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DataSourceError {
    pub status: Option<u16>,
    pub message: String,
}

impl DataSourceError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub component: ComponentId,
    pub descriptor: ComponentDescriptor,
    pub query: BTreeMap<String, String>,
    /// Issued by [`ComponentStore::next_generation`]; stores drop commits
    /// older than the newest one they have seen.
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationResponse {
    pub body: Value,
}

/// Loads component data into the store and invokes operations.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetches rows for `request.component` and commits them to the store.
    async fn fetch(&self, request: FetchRequest) -> Result<(), DataSourceError>;
    async fn operate(
        &self,
        operation: &OperationDescriptor,
        params: &Map<String, Value>,
    ) -> Result<OperationResponse, DataSourceError>;
}

/// Everything the store holds for one mounted component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentSnapshot {
    pub response: Option<Value>,
    pub columns: Vec<ColumnDescriptor>,
    pub table_operations: Vec<OperationDescriptor>,
    pub row_operations: Vec<OperationDescriptor>,
    pub post_operation: Option<OperationDescriptor>,
    pub search_parameters: Vec<ParameterDescriptor>,
    pub primary: Option<String>,
    pub pagination: Option<PaginationInfo>,
    pub auto_refresh_sec: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTopic {
    Layout,
    Component(ComponentId),
    Util,
}

/// Read side of the shared store plus the generation counter and the one
/// removal action a grid issues.
pub trait ComponentStore: Send + Sync {
    fn component(&self, id: &ComponentId) -> Option<ComponentSnapshot>;
    fn is_desktop(&self) -> bool;
    fn refresh_token(&self) -> u64;
    fn subscribe(&self) -> broadcast::Receiver<StoreTopic>;
    /// Fetch generations increase across every grid sharing the store, so a
    /// remounted component never reuses an older one.
    fn next_generation(&self) -> u64;
    /// Drops the slice. Commits for generations issued before the removal
    /// are rejected afterwards.
    fn remove_component(&self, id: &ComponentId);
}
