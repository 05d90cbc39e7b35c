//! Optional status listener for process supervisors.
//!
//! `GET /health` is a liveness probe that answers "ok" while the process runs.
//! `GET /status` reports the trigger and the most recent run as JSON.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde::Serialize;

use crate::middleware::request_id_layer;
use crate::schedule::{LastRun, RunRecord, Scheduler};

/// Shared state for the status handlers
#[derive(Clone)]
pub struct StatusState {
    pub info: Arc<TriggerInfo>,
    pub last_run: LastRun,
}

/// Static description of the scheduled trigger
#[derive(Debug, Clone, Serialize)]
pub struct TriggerInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub url: String,
    pub interval_secs: u64,
}

impl StatusState {
    /// Snapshot trigger info and share the scheduler's last-run handle
    pub fn from_scheduler(scheduler: &Scheduler) -> Self {
        let task = scheduler.task();
        Self {
            info: Arc::new(TriggerInfo {
                id: task.id(),
                name: task.name(),
                url: task.url().to_string(),
                interval_secs: task.schedule().interval().as_secs(),
            }),
            last_run: scheduler.last_run(),
        }
    }
}

#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    trigger: TriggerInfo,
    last_run: Option<RunRecord>,
}

/// Liveness probe
pub async fn health() -> &'static str {
    "ok"
}

async fn status(State(state): State<StatusState>) -> Json<StatusResponse> {
    let last_run = state.last_run.read().await.clone();
    Json(StatusResponse {
        trigger: (*state.info).clone(),
        last_run,
    })
}

/// Router with `/health` and `/status`, each request in a request-ID span
pub fn create_router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .with_state(state)
        .layer(middleware::from_fn(request_id_layer))
}

/// Status listener startup error
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("Invalid status.host or status.port: {0}")]
    Address(String),

    #[error("Status server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bind and serve until `shutdown` resolves
pub async fn serve<F>(
    state: StatusState,
    host: &str,
    port: u16,
    shutdown: F,
) -> Result<(), StatusError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| StatusError::Address(format!("{}", e)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Status endpoint listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
