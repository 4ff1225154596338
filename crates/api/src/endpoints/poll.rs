//! Poll endpoints.

use agora_common::AppResult;
use agora_core::{PollResults, VoteResult};
use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use validator::Validate;

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Show poll request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShowPollRequest {
    #[validate(length(min = 1, max = 64))]
    pub content_id: String,
}

/// Get poll results with the viewer's choice.
async fn show_poll(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Json(req): Json<ShowPollRequest>,
) -> AppResult<ApiResponse<PollResults>> {
    req.validate()?;

    let results = state
        .poll_service
        .poll_results(&req.content_id, viewer.as_deref())
        .await?;
    Ok(ApiResponse::ok(results))
}

/// Vote request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[validate(length(min = 1, max = 64))]
    pub content_id: String,
    #[validate(length(min = 1, max = 64))]
    pub option_id: String,
}

/// Vote on a poll, or move an earlier vote.
async fn vote(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<VoteRequest>,
) -> AppResult<ApiResponse<VoteResult>> {
    req.validate()?;

    let result = state
        .poll_service
        .cast_vote(&req.content_id, &user_id, &req.option_id)
        .await?;
    Ok(ApiResponse::ok(result))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/show", post(show_poll))
        .route("/vote", post(vote))
}
