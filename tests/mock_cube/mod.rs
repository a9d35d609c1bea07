//! An in-process imitation of the parts of *CUBE* and *pfdcm* that regiflow
//! talks to, recording every request of interest it receives.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

type Shared = Arc<Mutex<ArchiveState>>;

#[derive(Default)]
pub struct ArchiveState {
    /// Scripted per-series registered-file counts, consumed one per query;
    /// the last value repeats forever. An unscripted series counts as 0.
    pub counts: HashMap<String, Vec<u64>>,
    /// Storage path of the first registered file of each series.
    pub fnames: HashMap<String, String>,
    /// `(name, version, id)` of every plugin known to the mock.
    pub plugins: Vec<(String, String, u32)>,
    /// `(name, id)` of every pipeline known to the mock.
    pub pipelines: Vec<(String, u32)>,
    /// Recorded plugin instance creation requests, with the plugin's id.
    pub instance_requests: Vec<(u32, Value)>,
    /// Recorded workflow creation requests, with the pipeline's id.
    pub workflow_requests: Vec<(u32, Value)>,
    /// Recorded pfdcm retrieve requests.
    pub retrieve_requests: Vec<Value>,
    /// How many registered-count queries have been served (or refused).
    pub count_queries: usize,
    /// Respond 500 to this many count queries before behaving again.
    pub fail_count_queries: usize,
    /// Respond 500 to every health check.
    pub fail_health: bool,
    next_instance_id: u32,
}

impl ArchiveState {
    fn next_count(&mut self, uid: &str) -> u64 {
        let Some(seq) = self.counts.get_mut(uid) else {
            return 0;
        };
        if seq.len() > 1 {
            seq.remove(0)
        } else {
            seq.first().copied().unwrap_or(0)
        }
    }
}

/// Handle to a mock archive listening on an ephemeral port.
pub struct MockArchive {
    state: Shared,
    pub url: String,
    pub pfdcm_url: String,
}

impl MockArchive {
    pub async fn start(state: ArchiveState) -> Self {
        let shared = Arc::new(Mutex::new(state));
        let app = router(Arc::clone(&shared));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            state: shared,
            url: format!("http://{addr}/api/v1/"),
            pfdcm_url: format!("http://{addr}/pfdcm/"),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, ArchiveState> {
        self.state.lock().unwrap()
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/v1/", get(api_root))
        .route("/api/v1/plugins/search/", get(plugin_search))
        .route("/api/v1/plugins/{id}/instances/", post(create_instance))
        .route("/api/v1/pacsfiles/search/", get(pacsfiles_search))
        .route("/api/v1/pipelines/search/", get(pipeline_search))
        .route("/api/v1/pipelines/{id}/workflows/", post(create_workflow))
        .route("/pfdcm/api/v1/PACS/thread/pypx/", post(pypx_thread))
        .with_state(state)
}

async fn api_root(State(state): State<Shared>) -> Response {
    if state.lock().unwrap().fail_health {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(collection(Vec::new())).into_response()
}

async fn plugin_search(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let state = state.lock().unwrap();
    let name = query.get("name").cloned().unwrap_or_default();
    let version = query.get("version").cloned().unwrap_or_default();
    let items: Vec<Value> = state
        .plugins
        .iter()
        .filter(|(n, v, _)| *n == name && *v == version)
        .map(|(n, v, id)| {
            collection_item(&[
                ("id", json!(id)),
                ("name", json!(n)),
                ("version", json!(v)),
            ])
        })
        .collect();
    Json(collection(items))
}

async fn create_instance(
    State(state): State<Shared>,
    Path(plugin_id): Path<u32>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.instance_requests.push((plugin_id, body));
    state.next_instance_id += 1;
    let id = 100 + state.next_instance_id;
    Json(collection(vec![collection_item(&[
        ("id", json!(id)),
        ("plugin_id", json!(plugin_id)),
    ])]))
}

async fn pacsfiles_search(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.count_queries += 1;
    if state.fail_count_queries > 0 {
        state.fail_count_queries -= 1;
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let uid = query
        .get("SeriesInstanceUID")
        .cloned()
        .unwrap_or_default();
    let total = state.next_count(&uid);
    let items = if total > 0 {
        state
            .fnames
            .get(&uid)
            .map(|fname| vec![collection_item(&[("id", json!(1)), ("fname", json!(fname))])])
            .unwrap_or_default()
    } else {
        Vec::new()
    };
    Json(collection_with_total(items, total)).into_response()
}

async fn pipeline_search(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let state = state.lock().unwrap();
    let name = query.get("name").cloned().unwrap_or_default();
    let items: Vec<Value> = state
        .pipelines
        .iter()
        .filter(|(n, _)| *n == name)
        .map(|(n, id)| collection_item(&[("id", json!(id)), ("name", json!(n))]))
        .collect();
    Json(collection(items))
}

async fn create_workflow(
    State(state): State<Shared>,
    Path(pipeline_id): Path<u32>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.workflow_requests.push((pipeline_id, body));
    Json(collection(vec![collection_item(&[("id", json!(77))])]))
}

async fn pypx_thread(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.retrieve_requests.push(body);
    Json(json!({
        "response": {"job": {"status": true}},
        "message": "retrieve spawned"
    }))
}

fn collection(items: Vec<Value>) -> Value {
    let total = items.len();
    collection_with_total(items, total as u64)
}

fn collection_with_total(items: Vec<Value>, total: u64) -> Value {
    json!({"collection": {"items": items, "links": [], "total": total}})
}

fn collection_item(fields: &[(&str, Value)]) -> Value {
    let data: Vec<Value> = fields
        .iter()
        .map(|(name, value)| json!({"name": name, "value": value}))
        .collect();
    json!({"data": data, "links": []})
}
