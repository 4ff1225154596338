//! Content endpoints.

use agora_common::AppResult;
use agora_core::{
    CompletionSignal, ContentListFilter, ContentView, CreateContentInput, NewContentKind,
    StatusChange,
};
use agora_db::entities::content_item::{self, ContentStatus, ContentType};
use axum::{Json, Router, extract::State, routing::post};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Create content request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateContentRequest {
    #[validate(length(min = 1, max = 256))]
    pub title: String,

    #[validate(length(max = 8192))]
    pub description: Option<String>,

    pub voting_deadline: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub kind: NewContentKind,
}

/// Create a content item and open it for voting.
async fn create(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateContentRequest>,
) -> AppResult<ApiResponse<ContentView>> {
    req.validate()?;

    let input = CreateContentInput {
        title: req.title,
        description: req.description,
        voting_deadline: req.voting_deadline,
        kind: req.kind,
    };

    let view = state.content_service.create(&user_id, input).await?;
    Ok(ApiResponse::ok(view))
}

/// Content ID request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContentIdRequest {
    #[validate(length(min = 1, max = 64))]
    pub content_id: String,
}

/// Show a content item.
async fn show(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Json(req): Json<ContentIdRequest>,
) -> AppResult<ApiResponse<ContentView>> {
    req.validate()?;

    let view = state
        .content_service
        .show(&req.content_id, viewer.as_deref())
        .await?;
    Ok(ApiResponse::ok(view))
}

/// List content request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListContentRequest {
    #[serde(rename = "type")]
    pub content_type: Option<ContentType>,

    pub status: Option<ContentStatus>,

    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_limit")]
    pub limit: u64,

    pub until_id: Option<String>,
}

const fn default_limit() -> u64 {
    10
}

/// List content, newest first.
async fn list(
    State(state): State<AppState>,
    Json(req): Json<ListContentRequest>,
) -> AppResult<ApiResponse<Vec<content_item::Model>>> {
    req.validate()?;

    let items = state
        .content_service
        .list(ContentListFilter {
            content_type: req.content_type,
            status: req.status,
            until_id: req.until_id,
            limit: req.limit,
        })
        .await?;
    Ok(ApiResponse::ok(items))
}

/// Apply the next automatic transition, if one is due.
async fn advance(
    AuthUser(_user_id): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ContentIdRequest>,
) -> AppResult<ApiResponse<StatusChange>> {
    req.validate()?;

    let change = state
        .lifecycle_service
        .advance_status(&req.content_id)
        .await?;
    Ok(ApiResponse::ok(change))
}

/// Start an approved item. Creator only.
async fn activate(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ContentIdRequest>,
) -> AppResult<ApiResponse<StatusChange>> {
    req.validate()?;

    let change = state
        .lifecycle_service
        .activate(&req.content_id, &user_id)
        .await?;
    Ok(ApiResponse::ok(change))
}

/// Record the completion signal of a challenge. Creator only.
async fn signal_completion(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ContentIdRequest>,
) -> AppResult<ApiResponse<CompletionSignal>> {
    req.validate()?;

    let signal = state
        .lifecycle_service
        .signal_completion(&req.content_id, &user_id)
        .await?;
    Ok(ApiResponse::ok(signal))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/show", post(show))
        .route("/list", post(list))
        .route("/advance", post(advance))
        .route("/activate", post(activate))
        .route("/signal-completion", post(signal_completion))
}
