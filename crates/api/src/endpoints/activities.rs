//! Need activity endpoints.

use agora_common::AppResult;
use agora_core::{ActivityUpdate, Checklist};
use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use validator::Validate;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Activity request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRequest {
    #[validate(length(min = 1, max = 64))]
    pub activity_id: String,
}

/// Mark an activity completed by the caller.
async fn complete(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ActivityRequest>,
) -> AppResult<ApiResponse<ActivityUpdate>> {
    req.validate()?;

    let update = state
        .activity_service
        .complete_activity(&req.activity_id, &user_id)
        .await?;
    Ok(ApiResponse::ok(update))
}

/// Reopen a completed activity.
async fn uncomplete(
    AuthUser(_user_id): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ActivityRequest>,
) -> AppResult<ApiResponse<ActivityUpdate>> {
    req.validate()?;

    let update = state
        .activity_service
        .uncomplete_activity(&req.activity_id)
        .await?;
    Ok(ApiResponse::ok(update))
}

/// Checklist request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistRequest {
    #[validate(length(min = 1, max = 64))]
    pub content_id: String,
}

/// List a need's activities with progress.
async fn list(
    State(state): State<AppState>,
    Json(req): Json<ChecklistRequest>,
) -> AppResult<ApiResponse<Checklist>> {
    req.validate()?;

    let checklist = state.activity_service.checklist(&req.content_id).await?;
    Ok(ApiResponse::ok(checklist))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/complete", post(complete))
        .route("/uncomplete", post(uncomplete))
        .route("/list", post(list))
}
