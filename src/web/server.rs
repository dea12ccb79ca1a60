use axum::response::Html;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::config::WebConfig;
use crate::storage::RecordStore;

use super::api::{get_latest_failure, get_stats, health_check, list_records, AppState};

/// The dashboard is a single self-contained page that polls the JSON API;
/// it shares the presenter read contract with the TUI and never queries the
/// store directly.
const DASHBOARD_HTML: &str = include_str!("dashboard.html");

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health_check))
        .route("/api/stats", get(get_stats))
        .route("/api/records", get(list_records))
        .route("/api/failures/latest", get(get_latest_failure))
        .with_state(state)
}

/// Start the web server with the given record store.
pub async fn run_server(
    store: Arc<dyn RecordStore>,
    web_config: WebConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(AppState { store }).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&web_config.listen).await?;
    tracing::info!("web dashboard listening on {}", web_config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|&v| v).await;
            tracing::info!("web server shutting down gracefully");
        })
        .await?;

    Ok(())
}
