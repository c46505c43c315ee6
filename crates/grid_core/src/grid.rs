use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::future::try_join;
use serde_json::{Map, Value};
use shared::{
    domain::{
        ColumnDescriptor, ComponentId, OperationDescriptor, PaginationInfo, ParameterDescriptor,
    },
    protocol::ComponentDescriptor,
};
use tokio::{
    sync::{broadcast, oneshot, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    auto_refresh::AutoRefreshTimer,
    bindings::{self, OperationsIcon},
    fetch::{build_query_params, Messages, PageWindow, ANTI_FLICKER_FLOOR},
    presentation::{PresentationCommand, Presenter},
    query_state::{CrossFilterTracker, QueryState, Refetch, SortDirection, SortEntry},
    ComponentStore, DataSource, DataSourceError, FetchRequest,
};

/// Inbound configuration for one grid.
#[derive(Debug, Clone)]
pub struct GridOptions {
    pub id: ComponentId,
    pub descriptor: ComponentDescriptor,
    /// Search contributions from a parent; `None` marks a key as unset.
    pub cross_filters: BTreeMap<String, Option<Value>>,
    pub messages: Messages,
}

impl GridOptions {
    pub fn new(id: ComponentId, descriptor: ComponentDescriptor) -> Self {
        Self {
            id,
            descriptor,
            cross_filters: BTreeMap::new(),
            messages: Messages::default(),
        }
    }
}

/// Render-ready snapshot published after every state change.
#[derive(Debug, Clone, PartialEq)]
pub struct GridView {
    pub id: ComponentId,
    pub data: Option<Value>,
    /// Visible columns only.
    pub columns: Vec<ColumnDescriptor>,
    pub sort: Vec<SortEntry>,
    pub search_queries: BTreeMap<String, Value>,
    pub has_search_queries: bool,
    pub pagination: Option<PaginationInfo>,
    /// Number of page buttons the pagination control shows.
    pub pagination_size: u32,
    pub table_operations: Vec<OperationDescriptor>,
    pub row_operations: Vec<OperationDescriptor>,
    pub row_operations_icon: OperationsIcon,
    pub has_post_operation: bool,
    pub has_search_parameters: bool,
    pub primary: Option<String>,
    pub auto_refresh_sec: Option<u64>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl GridView {
    pub fn rows(&self) -> &[Value] {
        self.data
            .as_ref()
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn sort_direction(&self, key: &str) -> Option<SortDirection> {
        self.sort
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.direction)
    }
}

#[derive(Debug, Clone)]
pub enum GridEvent {
    Updated(GridView),
    Unmounted(ComponentId),
}

pub(crate) struct GridState {
    pub(crate) query: QueryState,
    pub(crate) cross_filters: CrossFilterTracker,
    pub(crate) data: Option<Value>,
    pub(crate) columns: Vec<ColumnDescriptor>,
    pub(crate) table_operations: Vec<OperationDescriptor>,
    pub(crate) row_operations: Vec<OperationDescriptor>,
    pub(crate) row_operations_icon: OperationsIcon,
    pub(crate) post_operation: Option<OperationDescriptor>,
    pub(crate) search_parameters: Vec<ParameterDescriptor>,
    pub(crate) primary: Option<String>,
    pub(crate) is_loading: bool,
    pub(crate) error: Option<String>,
    pub(crate) pagination_size: u32,
    pub(crate) auto_refresh_sec: Option<u64>,
    pub(crate) refresh_token: u64,
}

impl GridState {
    fn view(&self, id: &ComponentId) -> GridView {
        GridView {
            id: id.clone(),
            data: self.data.clone(),
            columns: self.query.filtered_columns(&self.columns),
            sort: self.query.sort.clone(),
            search_queries: self.query.search_queries.clone(),
            has_search_queries: self.query.has_search_queries(),
            pagination: self.query.pagination,
            pagination_size: self.pagination_size,
            table_operations: self.table_operations.clone(),
            row_operations: self.row_operations.clone(),
            row_operations_icon: self.row_operations_icon,
            has_post_operation: self.post_operation.is_some(),
            has_search_parameters: !self.search_parameters.is_empty(),
            primary: self.primary.clone(),
            auto_refresh_sec: self.auto_refresh_sec,
            is_loading: self.is_loading,
            error: self.error.clone(),
        }
    }

    pub(crate) fn row(&self, index: usize) -> Option<Map<String, Value>> {
        self.data
            .as_ref()?
            .as_array()?
            .get(index)?
            .as_object()
            .cloned()
    }
}

/// Controller for one schema-driven table component.
pub struct TableGrid {
    pub(crate) id: ComponentId,
    pub(crate) descriptor: ComponentDescriptor,
    pub(crate) source: Arc<dyn DataSource>,
    pub(crate) store: Arc<dyn ComponentStore>,
    presenter: Presenter,
    pub(crate) messages: Messages,
    pub(crate) state: Mutex<GridState>,
    pub(crate) timer: Mutex<AutoRefreshTimer>,
    bindings: Mutex<Option<JoinHandle<()>>>,
    generation: AtomicU64,
    pub(crate) mounted: AtomicBool,
    events: broadcast::Sender<GridEvent>,
}

impl TableGrid {
    pub fn new(
        options: GridOptions,
        source: Arc<dyn DataSource>,
        store: Arc<dyn ComponentStore>,
        presenter: Presenter,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        let state = GridState {
            query: QueryState::with_cross_filters(&options.cross_filters),
            cross_filters: CrossFilterTracker::new(options.cross_filters),
            data: None,
            columns: Vec::new(),
            table_operations: Vec::new(),
            row_operations: Vec::new(),
            row_operations_icon: OperationsIcon::Setting,
            post_operation: None,
            search_parameters: Vec::new(),
            primary: None,
            is_loading: true,
            error: None,
            pagination_size: bindings::pagination_size(store.is_desktop()),
            auto_refresh_sec: None,
            refresh_token: store.refresh_token(),
        };
        Arc::new(Self {
            id: options.id,
            descriptor: options.descriptor,
            source,
            store,
            presenter,
            messages: options.messages,
            state: Mutex::new(state),
            timer: Mutex::new(AutoRefreshTimer::new()),
            bindings: Mutex::new(None),
            generation: AtomicU64::new(0),
            mounted: AtomicBool::new(false),
            events,
        })
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GridEvent> {
        self.events.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub async fn view(&self) -> GridView {
        self.state.lock().await.view(&self.id)
    }

    /// Every column, ignoring the visibility filter.
    pub async fn columns(&self) -> Vec<ColumnDescriptor> {
        self.state.lock().await.columns.clone()
    }

    pub async fn auto_refresh_period(&self) -> Option<Duration> {
        self.timer.lock().await.period()
    }

    /// Starts listening to the store and performs the initial fetch.
    pub async fn mount(self: &Arc<Self>) {
        if self.mounted.swap(true, Ordering::SeqCst) {
            return;
        }
        let topics = self.store.subscribe();
        let task = bindings::spawn(Arc::downgrade(self), topics);
        *self.bindings.lock().await = Some(task);
        info!(component = %self.id, "grid mounted");
        self.get_data(None).await;
    }

    /// Tears down the refresh timer and store subscription. No fetch is issued
    /// afterwards.
    pub async fn unmount(&self) {
        if !self.mounted.swap(false, Ordering::SeqCst) {
            return;
        }
        self.timer.lock().await.stop();
        if let Some(task) = self.bindings.lock().await.take() {
            task.abort();
        }
        self.store.remove_component(&self.id);
        let _ = self.events.send(GridEvent::Unmounted(self.id.clone()));
        info!(component = %self.id, "grid unmounted");
    }

    /// Fetches rows for the current query. Without an explicit window the
    /// current page is requested when paginated. Failures end up in the view's
    /// `error`; nothing is returned to the caller.
    pub async fn get_data(&self, window: Option<PageWindow>) {
        if !self.is_mounted() {
            debug!(component = %self.id, "skipping fetch for unmounted grid");
            return;
        }
        let generation = self.store.next_generation();
        self.generation.fetch_max(generation, Ordering::SeqCst);
        let query = {
            let mut state = self.state.lock().await;
            let window = window.or_else(|| state.query.current_window());
            let query = build_query_params(&state.query.search_queries, window, &state.query.sort);
            state.is_loading = true;
            self.publish(&state);
            query
        };

        let request = FetchRequest {
            component: self.id.clone(),
            descriptor: self.descriptor.clone(),
            query,
            generation,
        };
        let floor = async {
            tokio::time::sleep(ANTI_FLICKER_FLOOR).await;
            Ok::<(), DataSourceError>(())
        };
        let outcome = try_join(floor, self.source.fetch(request)).await;

        let mut state = self.state.lock().await;
        if generation != self.generation.load(Ordering::SeqCst) {
            debug!(component = %self.id, generation, "superseded fetch settled");
            return;
        }
        state.is_loading = false;
        if let Err(err) = outcome {
            warn!(
                component = %self.id,
                generation,
                status = ?err.status,
                error = %err,
                "grid fetch failed"
            );
            state.error = Some(self.messages.fetch_failure(&self.descriptor.api, &err));
        }
        self.publish(&state);
    }

    pub(crate) async fn refetch(&self, refetch: Refetch) {
        let window = match refetch {
            Refetch::Skip => return,
            Refetch::Current => None,
            Refetch::FirstPage => self.state.lock().await.query.first_page_window(),
        };
        self.get_data(window).await;
    }

    pub async fn handle_sort_tap(&self, key: &str) {
        let refetch = self.state.lock().await.query.toggle_sort(key);
        self.refetch(refetch).await;
    }

    /// `page` is 1-based.
    pub async fn handle_pagination_change(&self, page: u32) {
        let window = self
            .state
            .lock()
            .await
            .query
            .pagination
            .map(|pagination| PageWindow::for_page(pagination.size, page));
        match window {
            Some(window) => self.get_data(Some(window)).await,
            None => warn!(component = %self.id, page, "page change on unpaginated grid"),
        }
    }

    /// Reconciles a new cross-filter map from the parent.
    pub async fn set_cross_filters(&self, filters: BTreeMap<String, Option<Value>>) {
        let refetch = {
            let mut state = self.state.lock().await;
            let GridState {
                query,
                cross_filters,
                ..
            } = &mut *state;
            cross_filters.merge(filters, query)
        };
        if refetch != Refetch::Skip {
            debug!(component = %self.id, "cross filters changed");
        }
        self.refetch(refetch).await;
    }

    pub async fn handle_search_button_tap(self: &Arc<Self>) {
        let (reply, submitted) = oneshot::channel();
        {
            let state = self.state.lock().await;
            self.present(PresentationCommand::SearchDrawer {
                parameters: state.search_parameters.clone(),
                initial_value: state.query.search_queries_map(),
                reply,
            });
        }
        let grid = Arc::clone(self);
        tokio::spawn(async move {
            let Ok(queries) = submitted.await else {
                return;
            };
            let refetch = grid.state.lock().await.query.set_search_queries(queries);
            grid.refetch(refetch).await;
        });
    }

    pub async fn handle_filter_button_tap(self: &Arc<Self>) {
        let (reply, submitted) = oneshot::channel();
        {
            let state = self.state.lock().await;
            self.present(PresentationCommand::FilterDrawer {
                columns: state.columns.clone(),
                selected: state.query.visible_column_keys.clone(),
                reply,
            });
        }
        let grid = Arc::clone(self);
        tokio::spawn(async move {
            let Ok(keys) = submitted.await else {
                return;
            };
            let refetch = grid.state.lock().await.query.set_visible_columns(keys);
            grid.refetch(refetch).await;
        });
    }

    pub(crate) fn publish(&self, state: &GridState) {
        let _ = self.events.send(GridEvent::Updated(state.view(&self.id)));
    }

    pub(crate) fn present(&self, command: PresentationCommand) {
        if self.presenter.send(command).is_err() {
            warn!(component = %self.id, "presentation channel closed; dropping command");
        }
    }
}

#[cfg(test)]
#[path = "tests/grid_tests.rs"]
mod tests;
