//! Funding endpoints.
//!
//! Recording and reconciliation are called by the payment collaborator,
//! which authenticates with a shared secret instead of a user identity.

use agora_common::{AppError, AppResult};
use agora_core::{FundingResult, FundingSummary, ReconcileReport, RecordFundingInput};
use agora_db::entities::funding_transaction::FundingSource;
use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    middleware::{AppState, PAYMENT_SECRET_HEADER, secrets_match},
    response::ApiResponse,
};

fn require_payment_secret(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    let provided = headers
        .get(PAYMENT_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    // An unset secret would match a missing header.
    if !state.payment_secret.is_empty() && secrets_match(&state.payment_secret, provided) {
        Ok(())
    } else {
        tracing::warn!("Rejected funding call with a bad payment secret");
        Err(AppError::Unauthorized)
    }
}

/// Record funding request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordFundingRequest {
    #[validate(length(min = 1, max = 64))]
    pub content_id: String,
    pub amount: i64,
    pub source_type: FundingSource,
    #[validate(length(min = 1, max = 128))]
    pub dedupe_key: String,
}

/// Apply a payment that already succeeded upstream.
async fn record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RecordFundingRequest>,
) -> AppResult<ApiResponse<FundingResult>> {
    require_payment_secret(&state, &headers)?;
    req.validate()?;

    let result = state
        .funding_service
        .record_funding(RecordFundingInput {
            content_id: req.content_id,
            amount: req.amount,
            source_type: req.source_type,
            dedupe_key: req.dedupe_key,
        })
        .await?;
    Ok(ApiResponse::ok(result))
}

/// Funding request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FundingRequest {
    #[validate(length(min = 1, max = 64))]
    pub content_id: String,
}

/// Show funding totals.
async fn show(
    State(state): State<AppState>,
    Json(req): Json<FundingRequest>,
) -> AppResult<ApiResponse<FundingSummary>> {
    req.validate()?;

    let summary = state.funding_service.funding_summary(&req.content_id).await?;
    Ok(ApiResponse::ok(summary))
}

/// Repair the cached total from the ledger.
async fn reconcile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FundingRequest>,
) -> AppResult<ApiResponse<ReconcileReport>> {
    require_payment_secret(&state, &headers)?;
    req.validate()?;

    let report = state.funding_service.reconcile(&req.content_id).await?;
    Ok(ApiResponse::ok(report))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/record", post(record))
        .route("/show", post(show))
        .route("/reconcile", post(reconcile))
}
