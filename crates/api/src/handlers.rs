//! HTTP request handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use orchestrator::PrepareOutcome;
use tracing::info;

use crate::error::ApiError;
use crate::types::{
    ChatAccepted, ChatRequest, ChatStatusResponse, HealthResponse, PrepareRequest,
    PrepareResponse, StatsResponse,
};
use crate::ApiState;

/// Liveness probe
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        message: "Avatar chat API is running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Submit a chat turn; the pipeline runs in the background
pub async fn submit_chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = state
        .scheduler
        .submit(request.messages, request.video_id.as_deref())
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ChatAccepted {
            job_id: job_id.to_string(),
            status: "processing".to_string(),
            message: "Video chat processing started".to_string(),
        }),
    ))
}

pub async fn chat_status(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Json<ChatStatusResponse>, ApiError> {
    let snapshot = state.scheduler.status(&job_id).await?;
    Ok(Json(ChatStatusResponse::from_snapshot(
        snapshot,
        &state.public_output_prefix,
    )))
}

/// Pre-compose the face swap for a material set
pub async fn prepare_material(
    State(state): State<ApiState>,
    Json(request): Json<PrepareRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .scheduler
        .prepare(
            &request.source_video,
            &request.target_face,
            request.voice_sample.as_deref(),
        )
        .await?;

    let response = match outcome {
        PrepareOutcome::Ready { video_id } => PrepareResponse {
            request_id: None,
            video_id,
            status: "ready".to_string(),
            message: "Video preparation already completed".to_string(),
        },
        PrepareOutcome::Processing {
            request_id,
            video_id,
        } => {
            info!(video_id = %video_id, "preparation in progress");
            PrepareResponse {
                request_id: request_id.map(|id| id.to_string()),
                video_id,
                status: "processing".to_string(),
                message: "Video preparation started".to_string(),
            }
        }
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Stage latency and job counters since start
pub async fn stats(State(state): State<ApiState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        queue_capacity: state.scheduler.capacity(),
        metrics: state.scheduler.metrics().summary(),
    })
}
