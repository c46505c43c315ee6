//! Routes row and table operations to previews, forms and menus.

use std::sync::Arc;

use serde_json::{Map, Value};
use shared::domain::{
    ColumnDescriptor, OperationDescriptor, ParameterDescriptor, ParameterLocation, Schema,
};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{
    grid::TableGrid,
    presentation::{PopoverAnchor, PresentationCommand, PreviewSelection, Rect},
};

/// Name of the synthetic body parameter used when browsing whole rows.
pub const PREVIEW_PARAMETER: &str = "preview";

fn defined<'a>(row: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    row.get(key).filter(|value| !value.is_null())
}

/// Seeds an operation's inputs from a row. Body parameters receive the row
/// values for their declared properties; other parameters take the row value
/// under their own name. Missing and null values are skipped.
pub fn create_initial_value(
    operation: &OperationDescriptor,
    row: &Map<String, Value>,
) -> Map<String, Value> {
    let mut initial = Map::new();
    for parameter in &operation.parameters {
        match &parameter.location {
            ParameterLocation::Body { schema } => {
                let body = schema
                    .properties
                    .keys()
                    .filter_map(|key| defined(row, key).map(|value| (key.clone(), value.clone())))
                    .collect();
                initial.insert(parameter.name.clone(), Value::Object(body));
            }
            _ => {
                if let Some(value) = defined(row, &parameter.name) {
                    initial.insert(parameter.name.clone(), value.clone());
                }
            }
        }
    }
    initial
}

/// One body parameter whose properties are the grid's columns.
pub fn preview_parameters(columns: &[ColumnDescriptor]) -> Vec<ParameterDescriptor> {
    let properties = columns
        .iter()
        .map(|column| (column.key.clone(), Value::Object(column.schema.clone())))
        .collect();
    vec![ParameterDescriptor::body(
        PREVIEW_PARAMETER,
        Schema::object(properties),
    )]
}

/// Wraps every row as `{ "preview": row }`.
pub fn preview_data_list(data: Option<&Value>) -> Vec<Map<String, Value>> {
    data.and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    let mut wrapper = Map::new();
                    wrapper.insert(PREVIEW_PARAMETER.to_string(), row.clone());
                    wrapper
                })
                .collect()
        })
        .unwrap_or_default()
}

impl TableGrid {
    /// Previews run immediately and may navigate; everything else opens a form
    /// whose successful submission refetches the grid.
    pub async fn create_initial_value_and_operate(
        self: &Arc<Self>,
        operation: OperationDescriptor,
        row: &Map<String, Value>,
    ) {
        let initial_value = create_initial_value(&operation, row);
        if operation.is_preview {
            self.open_preview(&operation, &initial_value).await;
        } else {
            self.open_operation_drawer(operation, initial_value).await;
        }
    }

    async fn open_preview(&self, operation: &OperationDescriptor, params: &Map<String, Value>) {
        match self.source.operate(operation, params).await {
            Ok(response) => {
                let Value::String(url) = response.body else {
                    debug!(component = %self.id, operation = %operation.label(), "preview returned no link");
                    return;
                };
                self.present(PresentationCommand::Navigate {
                    url,
                    target: operation.target.clone(),
                });
            }
            Err(err) => {
                warn!(
                    component = %self.id,
                    operation = %operation.label(),
                    status = ?err.status,
                    error = %err,
                    "preview operation failed"
                );
                self.present(PresentationCommand::ReportError {
                    error: err.to_string(),
                });
            }
        }
    }

    async fn open_operation_drawer(
        self: &Arc<Self>,
        operation: OperationDescriptor,
        initial_value: Map<String, Value>,
    ) {
        let primary = self.state.lock().await.primary.clone();
        let (reply, succeeded) = oneshot::channel();
        self.present(PresentationCommand::OperationDrawer {
            operation,
            initial_value,
            primary,
            reply,
        });
        let grid = Arc::clone(self);
        tokio::spawn(async move {
            if succeeded.await.is_ok() {
                grid.get_data(None).await;
            }
        });
    }

    pub async fn handle_post_button_tap(self: &Arc<Self>) {
        let post_operation = self.state.lock().await.post_operation.clone();
        match post_operation {
            Some(operation) => self.open_operation_drawer(operation, Map::new()).await,
            None => debug!(component = %self.id, "no create operation available"),
        }
    }

    /// Table-level operations menu anchored under `trigger`.
    pub async fn handle_setting_button_tap(self: &Arc<Self>, trigger: Rect) {
        let operations = self.state.lock().await.table_operations.clone();
        let (reply, selected) = oneshot::channel();
        self.present(PresentationCommand::OperationsPopover {
            operations,
            anchor: PopoverAnchor::below(trigger),
            reply,
        });
        let grid = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(operation) = selected.await {
                grid.open_operation_drawer(operation, Map::new()).await;
            }
        });
    }

    /// Opens the row browser at `row_index`.
    pub async fn handle_row_tap(self: &Arc<Self>, row_index: usize) {
        let (parameters, data_list, operations) = {
            let state = self.state.lock().await;
            (
                preview_parameters(&state.columns),
                preview_data_list(state.data.as_ref()),
                state.row_operations.clone(),
            )
        };
        if row_index >= data_list.len() {
            warn!(component = %self.id, row_index, "row tap outside of data");
            return;
        }

        let (reply, selected) = oneshot::channel();
        self.present(PresentationCommand::PreviewDrawer {
            parameters,
            data_list,
            selected_index: row_index,
            operations,
            reply,
        });
        let grid = Arc::clone(self);
        tokio::spawn(async move {
            let Ok(PreviewSelection {
                operation,
                row_index,
            }) = selected.await
            else {
                return;
            };
            let row = grid.state.lock().await.row(row_index);
            match row {
                Some(row) => grid.create_initial_value_and_operate(operation, &row).await,
                None => warn!(component = %grid.id, row_index, "selected row is gone"),
            }
        });
    }

    /// A single row operation runs directly; several open a menu under
    /// `trigger`.
    pub async fn handle_row_setting_tap(self: &Arc<Self>, row_index: usize, trigger: Rect) {
        let (row, operations) = {
            let state = self.state.lock().await;
            (state.row(row_index), state.row_operations.clone())
        };
        let Some(row) = row else {
            warn!(component = %self.id, row_index, "row setting tap outside of data");
            return;
        };

        if let [operation] = operations.as_slice() {
            self.create_initial_value_and_operate(operation.clone(), &row)
                .await;
            return;
        }

        self.present(PresentationCommand::CloseFloats);
        let (reply, selected) = oneshot::channel();
        self.present(PresentationCommand::OperationsPopover {
            operations,
            anchor: PopoverAnchor::below(trigger),
            reply,
        });
        let grid = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(operation) = selected.await {
                grid.create_initial_value_and_operate(operation, &row).await;
            }
        });
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
