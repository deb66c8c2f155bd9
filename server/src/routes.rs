//! API routes for the smoorgh server

use crate::error::ApiError;
use crate::server::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use smoorgh_core::{Answer, Question};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

type AppStateArc = Arc<AppState>;

pub fn answer_routes() -> Router<AppStateArc> {
    Router::new().route("/ask", post(ask))
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(health))
}

async fn ask(
    State(state): State<AppStateArc>,
    Json(question): Json<Question>,
) -> Result<Json<Answer>, ApiError> {
    let span = info_span!(
        "ask",
        request_id = %Uuid::new_v4(),
        question_type = %question.question_type,
        correlation_token = question.correlation_token.as_deref().unwrap_or(""),
    );

    async move {
        info!(phase = %state.orchestrator.phase(), "Received question");
        let answer = state.orchestrator.answer(&question).await?;
        Ok::<_, ApiError>(Json(answer))
    }
    .instrument(span)
    .await
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Hello Smorgs" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
