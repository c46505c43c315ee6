use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use shared::{
    domain::{
        ApiDescriptor, ColumnDescriptor, ComponentId, Method, OperationDescriptor, PaginationInfo,
        ParameterDescriptor, Schema,
    },
    protocol::ComponentDescriptor,
};
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::{
    grid::{GridEvent, GridOptions, GridView, TableGrid},
    presentation::PresentationCommand,
    store::MemoryStore,
    ComponentSnapshot, DataSource, DataSourceError, FetchRequest, OperationResponse,
};

pub(crate) const DEFAULT_LATENCY: Duration = Duration::from_millis(10);

/// Outcome of one scripted fetch.
pub(crate) struct Step {
    pub latency: Duration,
    pub outcome: Result<(), DataSourceError>,
}

/// Fetches commit a fixed snapshot after a short latency unless a scripted
/// step says otherwise. Every request is forwarded to the test.
pub(crate) struct ScriptedSource {
    store: Arc<MemoryStore>,
    pub snapshot: Mutex<ComponentSnapshot>,
    pub steps: Mutex<VecDeque<Step>>,
    pub operate_result: Mutex<Result<Value, DataSourceError>>,
    pub operations: Mutex<Vec<(OperationDescriptor, Map<String, Value>)>>,
    requests: mpsc::UnboundedSender<FetchRequest>,
}

impl ScriptedSource {
    pub fn new(
        store: Arc<MemoryStore>,
        snapshot: ComponentSnapshot,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<FetchRequest>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                store,
                snapshot: Mutex::new(snapshot),
                steps: Mutex::new(VecDeque::new()),
                operate_result: Mutex::new(Ok(Value::Null)),
                operations: Mutex::new(Vec::new()),
                requests,
            }),
            rx,
        )
    }

    pub async fn push_step(&self, latency: Duration, outcome: Result<(), DataSourceError>) {
        self.steps.lock().await.push_back(Step { latency, outcome });
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    async fn fetch(&self, request: FetchRequest) -> Result<(), DataSourceError> {
        let _ = self.requests.send(request.clone());
        let step = self.steps.lock().await.pop_front().unwrap_or(Step {
            latency: DEFAULT_LATENCY,
            outcome: Ok(()),
        });
        tokio::time::sleep(step.latency).await;
        step.outcome?;
        let snapshot = self.snapshot.lock().await.clone();
        self.store
            .commit(&request.component, request.generation, snapshot);
        Ok(())
    }

    async fn operate(
        &self,
        operation: &OperationDescriptor,
        params: &Map<String, Value>,
    ) -> Result<OperationResponse, DataSourceError> {
        self.operations
            .lock()
            .await
            .push((operation.clone(), params.clone()));
        self.operate_result
            .lock()
            .await
            .clone()
            .map(|body| OperationResponse { body })
    }
}

pub(crate) fn users_descriptor(pagination: bool) -> ComponentDescriptor {
    ComponentDescriptor {
        name: "users".to_string(),
        api: ApiDescriptor {
            method: Method::Get,
            path: "/users".to_string(),
        },
        pagination,
        primary: Some("id".to_string()),
        auto_refresh_sec: None,
        table_labels: Vec::new(),
    }
}

pub(crate) fn column(key: &str, kind: &str, description: &str) -> ColumnDescriptor {
    let mut schema = Map::new();
    schema.insert("type".into(), json!(kind));
    schema.insert("description".into(), json!(description));
    ColumnDescriptor::new(key, schema)
}

pub(crate) fn user_body_schema() -> Schema {
    let mut properties = Map::new();
    properties.insert("name".into(), json!({ "type": "string" }));
    properties.insert("email".into(), json!({ "type": "string" }));
    Schema::object(properties)
}

pub(crate) fn edit_operation() -> OperationDescriptor {
    let mut operation = OperationDescriptor::new(Method::Put, "/users/{id}");
    operation.parameters = vec![
        ParameterDescriptor::path("id"),
        ParameterDescriptor::body("payload", user_body_schema()),
    ];
    operation
}

pub(crate) fn profile_operation() -> OperationDescriptor {
    let mut operation = OperationDescriptor::new(Method::Get, "/users/{id}/profile");
    operation.parameters = vec![ParameterDescriptor::path("id")];
    operation.is_preview = true;
    operation.target = Some("_blank".to_string());
    operation
}

pub(crate) fn users_snapshot() -> ComponentSnapshot {
    let mut create = OperationDescriptor::new(Method::Post, "/users");
    create.parameters = vec![ParameterDescriptor::body("payload", user_body_schema())];
    ComponentSnapshot {
        response: Some(json!([
            { "id": 1, "name": "alice", "email": "alice@example.com" },
            { "id": 2, "name": "bob", "email": null },
        ])),
        columns: vec![
            column("id", "integer", "ID"),
            column("name", "string", "Name"),
            column("email", "string", "E-mail"),
        ],
        table_operations: vec![OperationDescriptor::new(Method::Delete, "/users")],
        row_operations: vec![edit_operation()],
        post_operation: Some(create),
        search_parameters: vec![ParameterDescriptor::query("name", "string")],
        primary: Some("id".to_string()),
        pagination: Some(PaginationInfo {
            size: 2,
            current: 2,
            max: 3,
        }),
        auto_refresh_sec: None,
    }
}

pub(crate) struct Harness {
    pub grid: Arc<TableGrid>,
    pub store: Arc<MemoryStore>,
    pub source: Arc<ScriptedSource>,
    pub requests: mpsc::UnboundedReceiver<FetchRequest>,
    pub commands: mpsc::UnboundedReceiver<PresentationCommand>,
}

pub(crate) fn harness_with(options: GridOptions, snapshot: ComponentSnapshot) -> Harness {
    let store = Arc::new(MemoryStore::new(true));
    let (source, requests) = ScriptedSource::new(Arc::clone(&store), snapshot);
    let (presenter, commands) = mpsc::unbounded_channel();
    let grid = TableGrid::new(
        options,
        Arc::clone(&source) as Arc<dyn DataSource>,
        Arc::clone(&store) as Arc<dyn crate::ComponentStore>,
        presenter,
    );
    Harness {
        grid,
        store,
        source,
        requests,
        commands,
    }
}

pub(crate) fn harness(snapshot: ComponentSnapshot) -> Harness {
    harness_with(
        GridOptions::new(ComponentId::new("users"), users_descriptor(true)),
        snapshot,
    )
}

/// Waits for the next published view that satisfies `predicate`.
pub(crate) async fn wait_for_view(
    events: &mut broadcast::Receiver<GridEvent>,
    predicate: impl Fn(&GridView) -> bool,
) -> GridView {
    loop {
        match events.recv().await.expect("grid event") {
            GridEvent::Updated(view) if predicate(&view) => return view,
            _ => {}
        }
    }
}

/// Lets spawned tasks run without moving the paused clock.
pub(crate) async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
