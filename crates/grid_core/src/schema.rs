//! Column and operation metadata for a component, read out of the API
//! document.

use serde_json::Value;
use shared::{
    domain::{
        ApiDescriptor, ColumnDescriptor, Method, OperationDescriptor, ParameterDescriptor,
        ParameterLocation,
    },
    openapi::ApiDocument,
    protocol::RESERVED_QUERY_KEYS,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("api document has no {method} {path} operation")]
    MissingOperation { method: Method, path: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentMetadata {
    pub columns: Vec<ColumnDescriptor>,
    pub table_operations: Vec<OperationDescriptor>,
    pub row_operations: Vec<OperationDescriptor>,
    pub post_operation: Option<OperationDescriptor>,
    pub search_parameters: Vec<ParameterDescriptor>,
}

enum Scope {
    Table,
    Row,
}

/// Where `path` sits relative to the list endpoint `base`: the endpoint
/// itself or a literal child is table scope, a templated child (`{id}`) and
/// anything below it is row scope.
fn scope(base: &str, path: &str) -> Option<Scope> {
    if path == base {
        return Some(Scope::Table);
    }
    let rest = path.strip_prefix(base)?.strip_prefix('/')?;
    if rest.starts_with('{') {
        Some(Scope::Row)
    } else if !rest.is_empty() {
        Some(Scope::Table)
    } else {
        None
    }
}

pub fn derive_metadata(
    doc: &ApiDocument,
    api: &ApiDescriptor,
) -> Result<ComponentMetadata, SchemaError> {
    let list = doc
        .operation(api.method, &api.path)
        .ok_or_else(|| SchemaError::MissingOperation {
            method: api.method,
            path: api.path.clone(),
        })?;

    let columns = list
        .success_schema()
        .and_then(|schema| schema.items.as_deref())
        .map(|items| {
            items
                .properties
                .iter()
                .map(|(key, property)| {
                    let schema = match property {
                        Value::Object(schema) => schema.clone(),
                        _ => Default::default(),
                    };
                    ColumnDescriptor::new(key.clone(), schema)
                })
                .collect()
        })
        .unwrap_or_default();

    let search_parameters = list
        .parameters
        .iter()
        .filter(|param| param.location == ParameterLocation::Query)
        .filter(|param| !RESERVED_QUERY_KEYS.contains(&param.name.as_str()))
        .cloned()
        .collect();

    let mut metadata = ComponentMetadata {
        columns,
        search_parameters,
        ..ComponentMetadata::default()
    };

    for (method, path, operation) in doc.operations() {
        if method == api.method && path == api.path {
            continue;
        }
        let descriptor = operation.to_descriptor(method, path);
        match scope(&api.path, path) {
            Some(Scope::Table) if path == api.path && method == Method::Post => {
                metadata.post_operation = Some(descriptor);
            }
            Some(Scope::Table) => metadata.table_operations.push(descriptor),
            Some(Scope::Row) => metadata.row_operations.push(descriptor),
            None => {}
        }
    }

    Ok(metadata)
}

#[cfg(test)]
#[path = "tests/schema_tests.rs"]
mod tests;
