//! Conversation endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use skald_chat::{ChatRequest, InpaintOutcome};
use skald_core::{InpaintRequest, Turn};

use crate::SharedState;
use crate::error::ApiError;

/// Set on responses whose history had undecodable records dropped.
pub const SKIPPED_RECORDS_HEADER: HeaderName = HeaderName::from_static("x-skald-skipped-records");

/// Attach the skipped-records header when anything was skipped.
fn with_skipped<T: Serialize>(body: T, skipped: usize) -> Response {
    let mut response = Json(body).into_response();
    if skipped > 0 {
        response
            .headers_mut()
            .insert(SKIPPED_RECORDS_HEADER, HeaderValue::from(skipped));
    }
    response
}

/// `POST /chat`
pub async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let outcome = state.chat.handle_turn(request).await?;
    Ok(with_skipped(outcome.reply, outcome.skipped))
}

/// `GET /chat/{chat_id}`
pub async fn chat_history_handler(
    State(state): State<SharedState>,
    Path(chat_id): Path<String>,
) -> Result<Response, ApiError> {
    let result = state.query.by_chat(&chat_id).await?;
    Ok(with_skipped::<Vec<Turn>>(result.turns, result.skipped))
}

/// `GET /user/{user_id}`
pub async fn user_history_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let result = state.query.by_user(&user_id).await?;
    Ok(with_skipped::<Vec<Turn>>(result.turns, result.skipped))
}

/// `GET /user/`: a participant query without a participant.
pub async fn missing_user_handler() -> ApiError {
    ApiError::bad_request("user_id is required")
}

/// `POST /inpaint`
pub async fn inpaint_handler(
    State(state): State<SharedState>,
    payload: Result<Json<InpaintRequest>, JsonRejection>,
) -> Result<Json<InpaintOutcome>, ApiError> {
    let Json(request) = payload?;
    let outcome = state.chat.handle_inpaint(request).await?;
    Ok(Json(outcome))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    store: String,
}

/// `GET /health`: 503 when the store does not answer a ping in time.
pub async fn health_handler(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, label) = match state.chat.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "Health check: store ping failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };
    (
        status,
        Json(HealthResponse {
            status: label,
            version: env!("CARGO_PKG_VERSION"),
            store: state.chat.store().name().to_string(),
        }),
    )
}
