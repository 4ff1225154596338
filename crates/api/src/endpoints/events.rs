//! Event registration endpoints.

use agora_common::AppResult;
use agora_core::RegistrationState;
use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use validator::Validate;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Event request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    #[validate(length(min = 1, max = 64))]
    pub content_id: String,
}

/// Register for an event.
async fn register(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<EventRequest>,
) -> AppResult<ApiResponse<RegistrationState>> {
    req.validate()?;

    let registration = state
        .registration_service
        .register(&req.content_id, &user_id)
        .await?;
    Ok(ApiResponse::ok(registration))
}

/// Cancel an event registration.
async fn cancel(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<EventRequest>,
) -> AppResult<ApiResponse<RegistrationState>> {
    req.validate()?;

    let registration = state
        .registration_service
        .cancel(&req.content_id, &user_id)
        .await?;
    Ok(ApiResponse::ok(registration))
}

/// Get the caller's registration for an event.
async fn status(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<EventRequest>,
) -> AppResult<ApiResponse<RegistrationState>> {
    req.validate()?;

    let registration = state
        .registration_service
        .registration_status(&req.content_id, &user_id)
        .await?;
    Ok(ApiResponse::ok(registration))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/cancel", post(cancel))
        .route("/status", post(status))
}
