//! Pagination, sort, search and column visibility for one grid, plus the
//! rules for how each change affects the next fetch.

use std::{collections::BTreeMap, fmt};

use serde_json::{Map, Value};
use shared::domain::{ColumnDescriptor, PaginationInfo};

use crate::fetch::PageWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortEntry {
    pub key: String,
    pub direction: SortDirection,
}

impl fmt::Display for SortEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.direction.as_str())
    }
}

/// What a state transition requires of the next fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refetch {
    Skip,
    /// Refetch keeping the current page.
    Current,
    /// Refetch from page 1 when paginated, plain refetch otherwise.
    FirstPage,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    /// Present only while the data source reports pagination.
    pub pagination: Option<PaginationInfo>,
    /// Priority order; a key appears at most once.
    pub sort: Vec<SortEntry>,
    pub search_queries: BTreeMap<String, Value>,
    /// `None` shows every column.
    pub visible_column_keys: Option<Vec<String>>,
}

impl QueryState {
    /// Seeds search queries from the defined cross-filter values.
    pub fn with_cross_filters(filters: &BTreeMap<String, Option<Value>>) -> Self {
        let search_queries = filters
            .iter()
            .filter_map(|(key, value)| value.clone().map(|value| (key.clone(), value)))
            .collect();
        Self {
            search_queries,
            ..Self::default()
        }
    }

    pub fn sort_direction(&self, key: &str) -> Option<SortDirection> {
        self.sort
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.direction)
    }

    pub fn is_asc(&self, key: &str) -> bool {
        self.sort_direction(key) == Some(SortDirection::Asc)
    }

    pub fn is_desc(&self, key: &str) -> bool {
        self.sort_direction(key) == Some(SortDirection::Desc)
    }

    /// unsorted -> asc -> desc -> unsorted. A key moving to desc drops to the
    /// end of the priority list.
    pub fn toggle_sort(&mut self, key: &str) -> Refetch {
        match self.sort_direction(key) {
            Some(SortDirection::Asc) => {
                self.sort.retain(|entry| entry.key != key);
                self.sort.push(SortEntry {
                    key: key.to_string(),
                    direction: SortDirection::Desc,
                });
            }
            Some(SortDirection::Desc) => {
                self.sort.retain(|entry| entry.key != key);
            }
            None => {
                self.sort.push(SortEntry {
                    key: key.to_string(),
                    direction: SortDirection::Asc,
                });
            }
        }
        Refetch::FirstPage
    }

    /// Replaces the search map. Null values count as unset.
    pub fn set_search_queries(&mut self, queries: Map<String, Value>) -> Refetch {
        self.search_queries = queries
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .collect();
        Refetch::FirstPage
    }

    pub fn set_visible_columns(&mut self, keys: Option<Vec<String>>) -> Refetch {
        self.visible_column_keys = keys;
        Refetch::Current
    }

    pub fn has_search_queries(&self) -> bool {
        !self.search_queries.is_empty()
    }

    pub fn search_queries_map(&self) -> Map<String, Value> {
        self.search_queries
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn filtered_columns(&self, columns: &[ColumnDescriptor]) -> Vec<ColumnDescriptor> {
        match &self.visible_column_keys {
            None => columns.to_vec(),
            Some(keys) => columns
                .iter()
                .filter(|column| keys.contains(&column.key))
                .cloned()
                .collect(),
        }
    }

    pub fn current_window(&self) -> Option<PageWindow> {
        self.pagination
            .map(|pagination| PageWindow::for_page(pagination.size, pagination.current))
    }

    pub fn first_page_window(&self) -> Option<PageWindow> {
        self.pagination
            .map(|pagination| PageWindow::for_page(pagination.size, 1))
    }
}

/// Remembers the last cross-filter map handed to the grid so a new one can be
/// reconciled against it.
#[derive(Debug, Clone, Default)]
pub struct CrossFilterTracker {
    previous: BTreeMap<String, Option<Value>>,
}

impl CrossFilterTracker {
    pub fn new(initial: BTreeMap<String, Option<Value>>) -> Self {
        Self { previous: initial }
    }

    /// Folds `incoming` into `query`. Any differing value or a change in the
    /// number of keys counts as a change; defined values are set and undefined
    /// ones removed. The snapshot is replaced either way.
    pub fn merge(
        &mut self,
        incoming: BTreeMap<String, Option<Value>>,
        query: &mut QueryState,
    ) -> Refetch {
        let value_changed = incoming.iter().any(|(key, value)| {
            let previous = self.previous.get(key).and_then(Option::as_ref);
            previous != value.as_ref()
        });
        let changed = value_changed || incoming.len() != self.previous.len();

        if changed {
            for (key, value) in &incoming {
                match value {
                    Some(value) => {
                        query.search_queries.insert(key.clone(), value.clone());
                    }
                    None => {
                        query.search_queries.remove(key);
                    }
                }
            }
        }
        self.previous = incoming;

        if changed {
            Refetch::FirstPage
        } else {
            Refetch::Skip
        }
    }
}

#[cfg(test)]
#[path = "tests/query_state_tests.rs"]
mod tests;
