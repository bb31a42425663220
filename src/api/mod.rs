//! API layer
//!
//! HTTP handlers for:
//! - Game catalog and external catalog integration
//! - User profiles and the social graph
//! - Library tracking
//! - Reviews, activity feeds, posts
//! - Metrics (Prometheus)

mod activities;
mod games;
mod library;
pub mod metrics;
mod posts;
mod reviews;
mod users;

use axum::Router;

use crate::AppState;

pub use metrics::metrics_router;

/// Compose all `/api` routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(games::games_router())
        .merge(users::users_router())
        .merge(library::library_router())
        .merge(reviews::reviews_router())
        .merge(activities::activities_router())
        .merge(posts::posts_router())
}
