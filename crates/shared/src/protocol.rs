use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ApiDescriptor, RecordId};

pub const PAGINATION_LIMIT_HEADER: &str = "x-pagination-limit";
pub const PAGINATION_CURRENT_PAGE_HEADER: &str = "x-pagination-current-page";
pub const PAGINATION_TOTAL_PAGES_HEADER: &str = "x-pagination-total-pages";

/// Query keys owned by the grid; never offered as search parameters.
pub const RESERVED_QUERY_KEYS: [&str; 3] = ["limit", "offset", "sort"];

/// Dashboard-level definition of one table component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub name: String,
    pub api: ApiDescriptor,
    #[serde(default)]
    pub pagination: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_refresh_sec: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub table_labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardPage {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub components: Vec<ComponentDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub name: String,
    #[serde(default)]
    pub pages: Vec<DashboardPage>,
}

impl Dashboard {
    pub fn find_component(&self, name: &str) -> Option<(&DashboardPage, &ComponentDescriptor)> {
        self.pages.iter().find_map(|page| {
            page.components
                .iter()
                .find(|component| component.name == name)
                .map(|component| (page, component))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Editor,
    Viewer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Editor => "editor",
            UserRole::Viewer => "viewer",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "admin" => Some(UserRole::Admin),
            "editor" => Some(UserRole::Editor),
            "viewer" => Some(UserRole::Viewer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInput {
    pub name: String,
    pub email: String,
    pub role: UserRole,
}
