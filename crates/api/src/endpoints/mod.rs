//! API endpoints.

mod activities;
mod content;
mod events;
mod funding;
mod poll;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/content", content::router())
        .nest("/poll", poll::router())
        .nest("/events", events::router())
        .nest("/activities", activities::router())
        .nest("/funding", funding::router())
}
