use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);
    };
}

id_newtype!(RecordId);

/// Identity of a mounted dashboard component; keys every store slice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub String);

impl ComponentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Put => "put",
            Method::Patch => "patch",
            Method::Delete => "delete",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

#[derive(Debug, Error)]
#[error("unknown http method `{0}`")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            "put" => Ok(Method::Put),
            "patch" => Ok(Method::Patch),
            "delete" => Ok(Method::Delete),
            _ => Err(UnknownMethod(raw.to_string())),
        }
    }
}

/// Endpoint a component reads its rows from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDescriptor {
    pub method: Method,
    pub path: String,
}

/// JSON-schema fragment. Unknown keywords are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Schema {
    pub fn object(properties: Map<String, Value>) -> Self {
        Self {
            kind: Some("object".to_string()),
            properties,
            ..Self::default()
        }
    }

    pub fn array_of(items: Schema) -> Self {
        Self {
            kind: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterLocation {
    Body { schema: Schema },
    Path,
    Query,
    Header,
    FormData,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Body { .. } => "body",
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::FormData => "formData",
        }
    }
}

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("body parameter `{name}` has no schema")]
    MissingBodySchema { name: String },
    #[error("parameter `{name}` has unsupported location `{location}`")]
    UnsupportedLocation { name: String, location: String },
}

/// One named input of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameter", into = "RawParameter")]
pub struct ParameterDescriptor {
    pub name: String,
    pub required: bool,
    pub description: Option<String>,
    /// Scalar type of non-body parameters (`string`, `integer`, ...).
    pub kind: Option<String>,
    pub location: ParameterLocation,
}

impl ParameterDescriptor {
    pub fn body(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            required: true,
            description: None,
            kind: None,
            location: ParameterLocation::Body { schema },
        }
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            description: None,
            kind: Some("integer".to_string()),
            location: ParameterLocation::Path,
        }
    }

    pub fn query(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            description: None,
            kind: Some(kind.into()),
            location: ParameterLocation::Query,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Serialize, Deserialize)]
struct RawParameter {
    name: String,
    #[serde(rename = "in")]
    location: String,
    #[serde(default)]
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema: Option<Schema>,
}

impl TryFrom<RawParameter> for ParameterDescriptor {
    type Error = ParameterError;

    fn try_from(raw: RawParameter) -> Result<Self, Self::Error> {
        let location = match raw.location.as_str() {
            "body" => ParameterLocation::Body {
                schema: raw.schema.ok_or_else(|| ParameterError::MissingBodySchema {
                    name: raw.name.clone(),
                })?,
            },
            "path" => ParameterLocation::Path,
            "query" => ParameterLocation::Query,
            "header" => ParameterLocation::Header,
            "formData" => ParameterLocation::FormData,
            other => {
                return Err(ParameterError::UnsupportedLocation {
                    name: raw.name,
                    location: other.to_string(),
                })
            }
        };
        Ok(Self {
            name: raw.name,
            required: raw.required,
            description: raw.description,
            kind: raw.kind,
            location,
        })
    }
}

impl From<ParameterDescriptor> for RawParameter {
    fn from(param: ParameterDescriptor) -> Self {
        let location = param.location.as_str().to_string();
        let schema = match param.location {
            ParameterLocation::Body { schema } => Some(schema),
            _ => None,
        };
        Self {
            name: param.name,
            location,
            required: param.required,
            description: param.description,
            kind: param.kind,
            schema,
        }
    }
}

/// One invokable action on the described API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    pub method: Method,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(default)]
    pub is_preview: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl OperationDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            operation_id: None,
            summary: None,
            parameters: Vec::new(),
            is_preview: false,
            target: None,
        }
    }

    pub fn label(&self) -> String {
        self.summary
            .clone()
            .or_else(|| self.operation_id.clone())
            .unwrap_or_else(|| format!("{} {}", self.method, self.path))
    }
}

/// A table column: the property key plus the rest of its schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub key: String,
    #[serde(flatten)]
    pub schema: Map<String, Value>,
}

impl ColumnDescriptor {
    pub fn new(key: impl Into<String>, schema: Map<String, Value>) -> Self {
        Self {
            key: key.into(),
            schema,
        }
    }

    pub fn label(&self) -> &str {
        self.schema
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or(&self.key)
    }

    pub fn kind(&self) -> Option<&str> {
        self.schema.get("type").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    /// Rows per page.
    pub size: u32,
    /// 1-based current page.
    pub current: u32,
    /// Total number of pages.
    pub max: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_parameter_round_trips_through_oas_shape() {
        let raw = json!({
            "name": "payload",
            "in": "body",
            "required": true,
            "schema": { "type": "object", "properties": { "x": { "type": "integer" } } }
        });
        let param: ParameterDescriptor = serde_json::from_value(raw.clone()).expect("param");
        let ParameterLocation::Body { schema } = &param.location else {
            panic!("expected body location");
        };
        assert!(schema.properties.contains_key("x"));
        assert_eq!(serde_json::to_value(&param).expect("json"), raw);
    }

    #[test]
    fn body_parameter_without_schema_is_rejected() {
        let err = serde_json::from_value::<ParameterDescriptor>(json!({
            "name": "payload",
            "in": "body"
        }))
        .expect_err("missing schema");
        assert!(err.to_string().contains("has no schema"));
    }

    #[test]
    fn column_label_falls_back_to_key() {
        let column = ColumnDescriptor::new("email", Map::new());
        assert_eq!(column.label(), "email");

        let mut schema = Map::new();
        schema.insert("description".into(), json!("E-mail"));
        assert_eq!(ColumnDescriptor::new("email", schema).label(), "E-mail");
    }

    #[test]
    fn method_parses_case_insensitively_and_displays_upper() {
        assert_eq!("DELETE".parse::<Method>().expect("method"), Method::Delete);
        assert_eq!(Method::Put.to_string(), "PUT");
        assert!("options".parse::<Method>().is_err());
    }
}
