use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use psyche_core::assessment::{AssessmentRecord, Language, SymptomScores};

use crate::engine::service;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn predict_router() -> Router<AppState> {
    Router::new().route("/v1/mental/predict", post(predict))
}

pub fn history_router() -> Router<AppState> {
    Router::new()
        .route("/v1/mental/history/{user_id}", get(history))
        .route("/v1/mental/history/{user_id}/latest", get(latest))
}

// ──────────────────────────────────────────────
// POST /v1/mental/predict
// ──────────────────────────────────────────────

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    pub user_id: Uuid,
    #[serde(default = "default_language")]
    pub language: Language,
    #[serde(flatten)]
    pub scores: SymptomScores,
}

fn default_language() -> Language {
    Language::En
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    pub message: String,
    pub depression_state: i16,
    pub suggestion: String,
    pub data: AssessmentRecord,
}

/// Classify the twelve symptom scores and record the assessment
///
/// Runs the severity classifier over the score vector, generates a
/// supportive suggestion (remote provider when configured, local table
/// otherwise), and appends the result to the user's history.
#[utoipa::path(
    post,
    path = "/v1/mental/predict",
    request_body = PredictRequest,
    responses(
        (status = 201, description = "Assessment recorded", body = PredictResponse),
        (status = 400, description = "Score out of range or malformed body", body = psyche_core::error::ApiError),
        (status = 404, description = "Unknown user", body = psyche_core::error::ApiError),
        (status = 503, description = "Classifier model unavailable", body = psyche_core::error::ApiError)
    ),
    tag = "mental-health"
)]
pub async fn predict(
    State(state): State<AppState>,
    AppJson(req): AppJson<PredictRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(violation) = req.scores.validate() {
        return Err(AppError::Validation {
            message: format!(
                "{} must be between 1 and 6, got {}",
                violation.field, violation.value
            ),
            field: Some(violation.field.to_string()),
            received: Some(serde_json::json!(violation.value)),
            docs_hint: Some("Every symptom score is an integer from 1 to 6.".to_string()),
        });
    }

    let record = service::predict(
        &state.db,
        &state.classifier,
        &state.suggestions,
        req.user_id,
        req.scores,
        req.language,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(PredictResponse {
            message: "Depression state predicted and recorded successfully.".to_string(),
            depression_state: record.depression_state,
            suggestion: record.generated_suggestion.clone(),
            data: record,
        }),
    ))
}

// ──────────────────────────────────────────────
// GET /v1/mental/history/{user_id}
// ──────────────────────────────────────────────

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HistoryResponse {
    pub message: String,
    pub data: Vec<AssessmentRecord>,
}

/// Full assessment history for a user, newest first
#[utoipa::path(
    get,
    path = "/v1/mental/history/{user_id}",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Assessment history", body = HistoryResponse),
        (status = 404, description = "Unknown user", body = psyche_core::error::ApiError)
    ),
    tag = "mental-health"
)]
pub async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, AppError> {
    let data = service::history(&state.db, user_id).await?;
    Ok(Json(HistoryResponse {
        message: "Test history retrieved successfully.".to_string(),
        data,
    }))
}

// ──────────────────────────────────────────────
// GET /v1/mental/history/{user_id}/latest
// ──────────────────────────────────────────────

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LatestHistoryResponse {
    pub message: String,
    pub data: Option<AssessmentRecord>,
}

/// Most recent assessment for a user, if any
#[utoipa::path(
    get,
    path = "/v1/mental/history/{user_id}/latest",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Latest assessment (data is null when the user has none)", body = LatestHistoryResponse),
        (status = 404, description = "Unknown user", body = psyche_core::error::ApiError)
    ),
    tag = "mental-health"
)]
pub async fn latest(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<LatestHistoryResponse>, AppError> {
    let data = service::latest(&state.db, user_id).await?;
    let message = if data.is_some() {
        "Latest test history retrieved successfully."
    } else {
        "No test history found for this user."
    };
    Ok(Json(LatestHistoryResponse {
        message: message.to_string(),
        data,
    }))
}
