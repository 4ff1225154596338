//! Request extractors.

use agora_common::AppError;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Identity forwarded by the upstream gateway, set by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

/// Authenticated user extractor.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by auth middleware
        parts
            .extensions
            .get::<UserId>()
            .map(|UserId(id)| Self(id.clone()))
            .ok_or(AppError::Unauthorized)
    }
}

/// Optional authenticated user extractor.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<String>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts.extensions.get::<UserId>().map(|UserId(id)| id.clone()),
        ))
    }
}
