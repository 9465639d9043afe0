#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::Value;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the stub collector answers and what it has received.
pub struct StubState {
    pub healthy: AtomicBool,
    pub accept_uploads: AtomicBool,
    pub accept_termination: AtomicBool,
    pub version: Mutex<Option<Value>>,
    pub health_checks: AtomicUsize,
    pub uploads: Mutex<Vec<Value>>,
    pub terminations: Mutex<Vec<Value>>,
}

impl Default for StubState {
    fn default() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            accept_uploads: AtomicBool::new(true),
            accept_termination: AtomicBool::new(true),
            version: Mutex::new(None),
            health_checks: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
            terminations: Mutex::new(Vec::new()),
        }
    }
}

async fn ready(State(state): State<Arc<StubState>>) -> Response {
    state.health_checks.fetch_add(1, Ordering::SeqCst);
    if !state.healthy.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    match state.version.lock().unwrap().clone() {
        Some(version) => Json(version).into_response(),
        None => StatusCode::OK.into_response(),
    }
}

async fn logs(State(state): State<Arc<StubState>>, Json(body): Json<Value>) -> StatusCode {
    state.uploads.lock().unwrap().push(body);
    if state.accept_uploads.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn termination(State(state): State<Arc<StubState>>, Json(body): Json<Value>) -> StatusCode {
    state.terminations.lock().unwrap().push(body);
    if state.accept_termination.load(Ordering::SeqCst) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::BAD_REQUEST
    }
}

pub struct StubCollector {
    pub addr: SocketAddr,
    pub state: Arc<StubState>,
    handle: JoinHandle<()>,
}

impl StubCollector {
    pub async fn start() -> Self {
        let state = Arc::new(StubState::default());
        let app = Router::new()
            .route("/api/v1/monitoring/ready", get(ready))
            .route("/api/v1/monitoring/logs", post(logs))
            .route("/api/v1/monitoring/logs/termination", put(termination))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state, handle }
    }

    pub fn address(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn uploads(&self) -> Vec<Value> {
        self.state.uploads.lock().unwrap().clone()
    }

    pub fn terminations(&self) -> Vec<Value> {
        self.state.terminations.lock().unwrap().clone()
    }
}

impl Drop for StubCollector {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// An address nothing listens on.
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// A log line stamped `seconds_ago` seconds before now.
pub fn stamped_line(seconds_ago: i64, message: &str) -> String {
    let ts = chrono::Local::now() - chrono::Duration::seconds(seconds_ago);
    format!("[{}] {}", ts.to_rfc3339(), message)
}

pub fn write_log(path: &Path, lines: &[String]) {
    let mut file = std::fs::File::create(path).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
}
