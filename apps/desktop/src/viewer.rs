//! Terminal stand-in for the drawers, popovers and navigation a graphical
//! dashboard would show.

use std::{fmt::Write, sync::Arc};

use grid_core::{
    presentation::{PresentationCommand, PreviewSelection, Rect},
    store::MemoryStore,
    DataSource, TableGrid,
};
use serde_json::{Map, Value};
use shared::domain::{ColumnDescriptor, OperationDescriptor, ParameterDescriptor};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::commands::{apply_assignments, ViewerCommand, HELP};

/// The form or menu currently waiting for input.
enum Pending {
    Operation {
        operation: OperationDescriptor,
        values: Map<String, Value>,
        reply: oneshot::Sender<()>,
    },
    Preview {
        selected_index: usize,
        operations: Vec<OperationDescriptor>,
        reply: oneshot::Sender<PreviewSelection>,
    },
    Search {
        values: Map<String, Value>,
        reply: oneshot::Sender<Map<String, Value>>,
    },
    Filter {
        columns: Vec<ColumnDescriptor>,
        reply: oneshot::Sender<Option<Vec<String>>>,
    },
    Menu {
        operations: Vec<OperationDescriptor>,
        reply: oneshot::Sender<OperationDescriptor>,
    },
}

pub enum Flow {
    Continue(Option<String>),
    Quit,
}

pub struct Viewer {
    grid: Arc<TableGrid>,
    source: Arc<dyn DataSource>,
    store: Arc<MemoryStore>,
    pending: Option<Pending>,
}

fn describe_parameters(out: &mut String, parameters: &[ParameterDescriptor]) {
    for parameter in parameters {
        let _ = write!(out, "\n  {} ({})", parameter.name, parameter.location.as_str());
        if let Some(description) = &parameter.description {
            let _ = write!(out, " - {description}");
        }
    }
}

fn describe_operations(out: &mut String, operations: &[OperationDescriptor]) {
    for (index, operation) in operations.iter().enumerate() {
        let _ = write!(out, "\n  {index}: {}", operation.label());
    }
}

impl Viewer {
    pub fn new(grid: Arc<TableGrid>, source: Arc<dyn DataSource>, store: Arc<MemoryStore>) -> Self {
        Self {
            grid,
            source,
            store,
            pending: None,
        }
    }

    fn replace_pending(&mut self, pending: Pending) {
        if self.pending.replace(pending).is_some() {
            info!("discarding previous form");
        }
    }

    /// Takes over a request from the grid and returns what to print.
    pub fn present(&mut self, command: PresentationCommand) -> Option<String> {
        let mut out = String::new();
        match command {
            PresentationCommand::OperationDrawer {
                operation,
                initial_value,
                primary,
                reply,
            } => {
                let _ = write!(out, "form: {}", operation.label());
                if let Some(primary) = primary {
                    let _ = write!(out, " (record key `{primary}`)");
                }
                describe_parameters(&mut out, &operation.parameters);
                let _ = write!(
                    out,
                    "\ncurrent: {}\nsubmit key=value ... | cancel",
                    Value::Object(initial_value.clone())
                );
                self.replace_pending(Pending::Operation {
                    operation,
                    values: initial_value,
                    reply,
                });
            }
            PresentationCommand::PreviewDrawer {
                data_list,
                selected_index,
                operations,
                reply,
                ..
            } => {
                let _ = write!(out, "row {selected_index} of {}:", data_list.len());
                if let Some(entry) = data_list.get(selected_index) {
                    for value in entry.values() {
                        let _ = write!(out, " {value}");
                    }
                }
                describe_operations(&mut out, &operations);
                out.push_str("\nchoose <n> | cancel");
                self.replace_pending(Pending::Preview {
                    selected_index,
                    operations,
                    reply,
                });
            }
            PresentationCommand::SearchDrawer {
                parameters,
                initial_value,
                reply,
            } => {
                out.push_str("search:");
                describe_parameters(&mut out, &parameters);
                let _ = write!(
                    out,
                    "\ncurrent: {}\nsubmit key=value ... | cancel",
                    Value::Object(initial_value.clone())
                );
                self.replace_pending(Pending::Search {
                    values: initial_value,
                    reply,
                });
            }
            PresentationCommand::FilterDrawer {
                columns,
                selected,
                reply,
            } => {
                out.push_str("columns:");
                for column in &columns {
                    let shown = match &selected {
                        Some(keys) => keys.contains(&column.key),
                        None => true,
                    };
                    let _ = write!(
                        out,
                        "\n  [{}] {}",
                        if shown { "x" } else { " " },
                        column.key
                    );
                }
                out.push_str("\nsubmit <column> ... (none for all) | cancel");
                self.replace_pending(Pending::Filter { columns, reply });
            }
            PresentationCommand::OperationsPopover {
                operations,
                anchor,
                reply,
            } => {
                let _ = write!(out, "operations ({}):", anchor.direction);
                describe_operations(&mut out, &operations);
                out.push_str("\nchoose <n> | cancel");
                self.replace_pending(Pending::Menu { operations, reply });
            }
            PresentationCommand::Navigate { url, target } => match target {
                Some(target) => {
                    let _ = write!(out, "open {url} in {target}");
                }
                None => {
                    let _ = write!(out, "open {url}");
                }
            },
            PresentationCommand::ReportError { error } => {
                let _ = write!(out, "error: {error}");
            }
            PresentationCommand::CloseFloats => {
                if matches!(self.pending, Some(Pending::Menu { .. })) {
                    self.pending = None;
                }
                return None;
            }
        }
        Some(out)
    }

    pub async fn handle(&mut self, command: ViewerCommand) -> Flow {
        let output = match command {
            ViewerCommand::Sort(key) => {
                self.grid.handle_sort_tap(&key).await;
                None
            }
            ViewerCommand::Search => {
                self.grid.handle_search_button_tap().await;
                None
            }
            ViewerCommand::Filter => {
                self.grid.handle_filter_button_tap().await;
                None
            }
            ViewerCommand::Page(page) => {
                self.grid.handle_pagination_change(page).await;
                None
            }
            ViewerCommand::Row(index) => {
                self.grid.handle_row_tap(index).await;
                None
            }
            ViewerCommand::Ops(None) => {
                self.grid.handle_setting_button_tap(Rect::default()).await;
                None
            }
            ViewerCommand::Ops(Some(index)) => {
                self.grid
                    .handle_row_setting_tap(index, Rect::default())
                    .await;
                None
            }
            ViewerCommand::Post => {
                self.grid.handle_post_button_tap().await;
                None
            }
            ViewerCommand::Refresh => {
                let token = self.store.bump_refresh_token();
                Some(format!("refresh #{token}"))
            }
            ViewerCommand::Layout { desktop } => {
                self.store.set_layout(desktop);
                None
            }
            ViewerCommand::Choose(index) => Some(self.choose(index)),
            ViewerCommand::Submit(args) => Some(self.submit(&args).await),
            ViewerCommand::Cancel => Some(match self.pending.take() {
                Some(_) => "cancelled".to_string(),
                None => "nothing to cancel".to_string(),
            }),
            ViewerCommand::Help => Some(HELP.to_string()),
            ViewerCommand::Quit => return Flow::Quit,
        };
        Flow::Continue(output)
    }

    fn choose(&mut self, index: usize) -> String {
        match self.pending.take() {
            Some(Pending::Preview {
                selected_index,
                operations,
                reply,
            }) => match operations.get(index) {
                Some(operation) => {
                    let _ = reply.send(PreviewSelection {
                        operation: operation.clone(),
                        row_index: selected_index,
                    });
                    format!("running {}", operation.label())
                }
                None => {
                    self.pending = Some(Pending::Preview {
                        selected_index,
                        operations,
                        reply,
                    });
                    format!("no operation {index}")
                }
            },
            Some(Pending::Menu { operations, reply }) => match operations.get(index) {
                Some(operation) => {
                    let _ = reply.send(operation.clone());
                    format!("running {}", operation.label())
                }
                None => {
                    self.pending = Some(Pending::Menu { operations, reply });
                    format!("no operation {index}")
                }
            },
            other => {
                self.pending = other;
                "nothing to choose from".to_string()
            }
        }
    }

    async fn submit(&mut self, args: &[String]) -> String {
        match self.pending.take() {
            Some(Pending::Operation {
                operation,
                mut values,
                reply,
            }) => {
                if let Err(err) = apply_assignments(&mut values, args) {
                    self.pending = Some(Pending::Operation {
                        operation,
                        values,
                        reply,
                    });
                    return err.to_string();
                }
                match self.source.operate(&operation, &values).await {
                    Ok(response) => {
                        let _ = reply.send(());
                        match response.body {
                            Value::Null => format!("{} done", operation.label()),
                            body => format!("{} done: {body}", operation.label()),
                        }
                    }
                    Err(err) => {
                        warn!(operation = %operation.label(), status = ?err.status, error = %err, "operation failed");
                        let message = format!("error: {err}");
                        self.pending = Some(Pending::Operation {
                            operation,
                            values,
                            reply,
                        });
                        message
                    }
                }
            }
            Some(Pending::Search { mut values, reply }) => {
                // an empty submit clears the search
                if args.is_empty() {
                    values.clear();
                }
                match apply_assignments(&mut values, args) {
                    Ok(()) => {
                        let _ = reply.send(values);
                        "searching".to_string()
                    }
                    Err(err) => {
                        self.pending = Some(Pending::Search { values, reply });
                        err.to_string()
                    }
                }
            }
            Some(Pending::Filter { columns, reply }) => {
                if let Some(unknown) = args
                    .iter()
                    .find(|key| !columns.iter().any(|column| &column.key == *key))
                {
                    let message = format!("unknown column `{unknown}`");
                    self.pending = Some(Pending::Filter { columns, reply });
                    return message;
                }
                let selection = (!args.is_empty()).then(|| args.to_vec());
                let _ = reply.send(selection);
                "columns updated".to_string()
            }
            other => {
                self.pending = other;
                "no open form".to_string()
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/viewer_tests.rs"]
mod tests;
