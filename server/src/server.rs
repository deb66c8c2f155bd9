//! HTTP server for smoorgh

use crate::routes;
use anyhow::{Context, Result};
use axum::Router;
use smoorgh_core::Orchestrator;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::answer_routes())
        .merge(routes::health_routes())
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until it fails
pub async fn run(state: AppState, bind: &str) -> Result<()> {
    let phase = state.orchestrator.phase();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(%phase, "Listening on http://{}", bind);

    axum::serve(listener, app).await?;
    Ok(())
}
