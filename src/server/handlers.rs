//! HTTP request handlers.

use axum::{
    extract::State,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use super::auth::Viewer;
use super::error::ApiError;
use super::sse;
use super::AppState;
use crate::config::APP_NAME;
use crate::models::{PriceAnalysisRequest, PriceAnalysisResponse};
use crate::services::{price_analysis, stream_answer, Intent};

/// Request body for both chat routes.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub intent: Intent,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
}

fn require_question(body: &ChatRequest) -> Result<(), ApiError> {
    if body.question.trim().is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }
    Ok(())
}

/// GET /health
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: APP_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// POST /ai/chat
pub async fn post_chat(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    require_question(&body)?;

    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("chat", %request_id, authenticated = viewer.0.is_some());

    let result = state
        .assistant
        .answer(&body.question, viewer.identity())
        .instrument(span)
        .await?;

    Ok(Json(ChatResponse {
        answer: result.answer,
        intent: result.intent,
    }))
}

/// POST /ai/chat/stream
pub async fn post_chat_stream(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Json(body): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_question(&body)?;

    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("chat_stream", %request_id, authenticated = viewer.0.is_some());

    let frames = span.in_scope(|| {
        tracing::info!("chat stream opened");
        stream_answer(state.assistant.clone(), body.question, viewer.identity())
    });
    Ok(sse::frames_to_sse(frames))
}

/// POST /price-analysis
pub async fn post_price_analysis(
    State(state): State<AppState>,
    Json(body): Json<PriceAnalysisRequest>,
) -> Result<Json<PriceAnalysisResponse>, ApiError> {
    if !body.predicted_price.is_finite() || body.predicted_price < 0.0 {
        return Err(ApiError::BadRequest(
            "predicted_price must be a non-negative number".to_string(),
        ));
    }
    if !(body.features.area_sqm.is_finite() && body.features.area_sqm > 0.0) {
        return Err(ApiError::BadRequest("area_sqm must be positive".to_string()));
    }

    let response =
        price_analysis::analyze_price(&state.providers, &state.provider_config, &body).await?;
    Ok(Json(response))
}
