//! Subset of an OpenAPI 2.0 document: enough to describe list endpoints and
//! the operations that act on their rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Method, OperationDescriptor, ParameterDescriptor, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiInfo {
    pub title: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDocument {
    #[serde(default = "default_swagger_version")]
    pub swagger: String,
    pub info: ApiInfo,
    /// path -> lowercase method -> operation
    #[serde(default)]
    pub paths: BTreeMap<String, BTreeMap<String, OperationObject>>,
}

fn default_swagger_version() -> String {
    "2.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(default)]
    pub responses: BTreeMap<String, ResponseObject>,
    #[serde(rename = "x-preview", default, skip_serializing_if = "std::ops::Not::not")]
    pub preview: bool,
    #[serde(rename = "x-target", default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseObject {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

impl OperationObject {
    pub fn success_schema(&self) -> Option<&Schema> {
        ["200", "201"]
            .iter()
            .find_map(|code| self.responses.get(*code))
            .and_then(|response| response.schema.as_ref())
    }

    pub fn to_descriptor(&self, method: Method, path: &str) -> OperationDescriptor {
        OperationDescriptor {
            method,
            path: path.to_string(),
            operation_id: self.operation_id.clone(),
            summary: self.summary.clone(),
            parameters: self.parameters.clone(),
            is_preview: self.preview,
            target: self.target.clone(),
        }
    }
}

impl ApiDocument {
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            swagger: default_swagger_version(),
            info: ApiInfo {
                title: title.into(),
                version: version.into(),
            },
            paths: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, method: Method, path: impl Into<String>, operation: OperationObject) {
        self.paths
            .entry(path.into())
            .or_default()
            .insert(method.as_str().to_string(), operation);
    }

    pub fn operation(&self, method: Method, path: &str) -> Option<&OperationObject> {
        self.paths.get(path)?.get(method.as_str())
    }

    /// Every operation in the document with a recognised method, path order.
    pub fn operations(&self) -> impl Iterator<Item = (Method, &str, &OperationObject)> {
        self.paths.iter().flat_map(|(path, item)| {
            item.iter().filter_map(move |(method, operation)| {
                method
                    .parse::<Method>()
                    .ok()
                    .map(|method| (method, path.as_str(), operation))
            })
        })
    }
}
