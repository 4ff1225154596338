//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use agora_core::{
    ActivityService, ContentService, FundingService, LifecycleService, PollService,
    RegistrationService,
};
use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::extractors::UserId;

/// Header carrying the authenticated user ID from the gateway.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Header carrying the payment collaborator's shared secret.
pub const PAYMENT_SECRET_HEADER: &str = "X-Payment-Secret";

const MAX_USER_ID_LEN: usize = 64;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub content_service: ContentService,
    pub poll_service: PollService,
    pub registration_service: RegistrationService,
    pub activity_service: ActivityService,
    pub funding_service: FundingService,
    pub lifecycle_service: LifecycleService,
    pub payment_secret: Arc<str>,
}

/// Authentication middleware.
///
/// Identity is established upstream; this only lifts a well-formed
/// `X-User-Id` header into a request extension.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Response {
    if let Some(header) = req.headers().get(USER_ID_HEADER)
        && let Ok(value) = header.to_str()
    {
        let user_id = value.trim().to_string();
        if !user_id.is_empty() && user_id.len() <= MAX_USER_ID_LEN {
            req.extensions_mut().insert(UserId(user_id));
        } else {
            tracing::debug!("Ignoring malformed user id header");
        }
    }

    next.run(req).await
}

/// Compare two secrets without short-circuiting on the first difference.
#[must_use]
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    let (a, b) = (expected.as_bytes(), provided.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(!secrets_match("s3cret", "s3cre7"));
        assert!(!secrets_match("s3cret", "s3cret-longer"));
        assert!(!secrets_match("s3cret", ""));
    }
}
