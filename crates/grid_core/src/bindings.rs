use std::{
    sync::{atomic::Ordering, Arc, Weak},
    time::Duration,
};

use shared::domain::{Method, OperationDescriptor};
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};
use tracing::{debug, info, warn};

use crate::{fetch::validate, grid::TableGrid, StoreTopic};

const DESKTOP_PAGINATION_SIZE: u32 = 5;
const COMPACT_PAGINATION_SIZE: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationsIcon {
    Square,
    File,
    Edit,
    Plus,
    Remove,
    Setting,
}

impl OperationsIcon {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationsIcon::Square => "square",
            OperationsIcon::File => "file",
            OperationsIcon::Edit => "edit",
            OperationsIcon::Plus => "plus",
            OperationsIcon::Remove => "remove",
            OperationsIcon::Setting => "setting",
        }
    }
}

/// Icon for the per-row operations button. Anything but exactly one
/// operation gets the generic menu icon.
pub fn row_operations_icon(operations: &[OperationDescriptor]) -> OperationsIcon {
    let [operation] = operations else {
        return OperationsIcon::Setting;
    };
    match operation.method {
        Method::Get if operation.is_preview => OperationsIcon::Square,
        Method::Get => OperationsIcon::File,
        Method::Put => OperationsIcon::Edit,
        Method::Post => OperationsIcon::Plus,
        Method::Delete => OperationsIcon::Remove,
        Method::Patch => OperationsIcon::Setting,
    }
}

pub(crate) fn pagination_size(is_desktop: bool) -> u32 {
    if is_desktop {
        DESKTOP_PAGINATION_SIZE
    } else {
        COMPACT_PAGINATION_SIZE
    }
}

/// Applies store notifications to `grid` until the grid is dropped or the
/// store goes away.
pub(crate) fn spawn(
    grid: Weak<TableGrid>,
    topics: broadcast::Receiver<StoreTopic>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut topics = BroadcastStream::new(topics);
        while let Some(topic) = topics.next().await {
            let Some(grid) = grid.upgrade() else {
                break;
            };
            match topic {
                Ok(StoreTopic::Layout) => grid.on_layout_changed().await,
                Ok(StoreTopic::Component(id)) if id == grid.id => {
                    grid.on_component_changed().await
                }
                Ok(StoreTopic::Component(_)) => {}
                Ok(StoreTopic::Util) => grid.on_util_changed().await,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(component = %grid.id, skipped, "store notifications lagged; resyncing");
                    grid.on_layout_changed().await;
                    grid.on_component_changed().await;
                    grid.on_util_changed().await;
                }
            }
        }
        debug!("grid bindings stopped");
    })
}

impl TableGrid {
    pub(crate) async fn on_layout_changed(&self) {
        let size = pagination_size(self.store.is_desktop());
        let mut state = self.state.lock().await;
        if state.pagination_size != size {
            state.pagination_size = size;
            self.publish(&state);
        }
    }

    /// Pulls this component's slice from the store and replaces every
    /// store-derived field. Validation of the new response overwrites any
    /// previous error.
    pub(crate) async fn on_component_changed(self: &Arc<Self>) {
        let Some(snapshot) = self.store.component(&self.id) else {
            return;
        };
        let interval = {
            let mut state = self.state.lock().await;
            state.error = validate(snapshot.response.as_ref())
                .err()
                .map(|err| self.messages.validation(err));
            state.data = snapshot.response;
            state.columns = snapshot.columns;
            state.table_operations = snapshot.table_operations;
            state.row_operations_icon = row_operations_icon(&snapshot.row_operations);
            state.row_operations = snapshot.row_operations;
            state.post_operation = snapshot.post_operation;
            state.search_parameters = snapshot.search_parameters;
            state.primary = snapshot.primary;
            state.query.pagination = snapshot.pagination;
            state.auto_refresh_sec = snapshot.auto_refresh_sec;
            self.publish(&state);
            snapshot.auto_refresh_sec
        };
        self.reconcile_auto_refresh(interval).await;
    }

    pub(crate) async fn on_util_changed(self: &Arc<Self>) {
        let token = self.store.refresh_token();
        {
            let mut state = self.state.lock().await;
            if state.refresh_token == token {
                return;
            }
            state.refresh_token = token;
        }
        debug!(component = %self.id, token, "refresh requested");
        let grid = Arc::clone(self);
        tokio::spawn(async move { grid.get_data(None).await });
    }

    /// Keeps the timer in line with the interval: started when set, restarted
    /// when it changes, stopped when it becomes zero or unset.
    async fn reconcile_auto_refresh(self: &Arc<Self>, interval_sec: Option<u64>) {
        let period = interval_sec
            .filter(|sec| *sec > 0)
            .map(Duration::from_secs);
        let mut timer = self.timer.lock().await;
        match period {
            Some(period) if self.mounted.load(Ordering::SeqCst) => {
                let grid = Arc::downgrade(self);
                let started = timer.start(period, move || {
                    let grid = grid.clone();
                    async move {
                        let Some(grid) = grid.upgrade() else {
                            return false;
                        };
                        // detached so restarting the timer cannot cancel a fetch midway
                        tokio::spawn(async move { grid.get_data(None).await });
                        true
                    }
                });
                if started {
                    info!(component = %self.id, period_sec = period.as_secs(), "auto refresh enabled");
                }
            }
            _ => {
                if timer.is_active() {
                    info!(component = %self.id, "auto refresh disabled");
                }
                timer.stop();
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/bindings_tests.rs"]
mod tests;
