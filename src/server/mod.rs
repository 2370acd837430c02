//! Control endpoint: the HTTP surface peers and the dashboard talk to
//!
//! One handler accepts a JSON [`JobDescriptor`], dispatches by command and
//! answers with the serialized [`StressReport`]. Worker mode binds it at
//! `/`; dashboard mode serves the embedded page at `/` and the JSON API at
//! `/api`.

use axum::extract::State;
use axum::response::{Html, Json};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tracing::{debug, info};

use crate::engine::{self, EngineContext};
use crate::errors::Result;
use crate::job::JobDescriptor;
use crate::metrics::StressReport;

static DASHBOARD_HTML: &str = include_str!("../../assets/dashboard.html");

/// Router for worker mode: the job API at `/`.
pub fn worker_router(ctx: Arc<EngineContext>) -> Router {
    Router::new().route("/", post(handle_job)).with_state(ctx)
}

/// Router for dashboard mode: page at `/`, job API at `/api`.
pub fn dashboard_router(ctx: Arc<EngineContext>) -> Router {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/api", post(handle_job))
        .with_state(ctx)
}

pub async fn serve_worker(addr: &str, ctx: Arc<EngineContext>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("worker listening on {}", addr);
    axum::serve(listener, worker_router(ctx)).await?;
    Ok(())
}

pub async fn serve_dashboard(addr: &str, ctx: Arc<EngineContext>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("dashboard listening on {}", addr);
    axum::serve(listener, dashboard_router(ctx)).await?;
    Ok(())
}

async fn dashboard_page() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn handle_job(
    State(ctx): State<Arc<EngineContext>>,
    Json(descriptor): Json<JobDescriptor>,
) -> Json<StressReport> {
    debug!(
        "job {} cmd {:?} via control endpoint",
        descriptor.sequence_id, descriptor.cmd
    );
    Json(engine::run_job(&ctx, descriptor).await)
}
