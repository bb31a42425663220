//! Activity feed endpoints

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::data::ActivityWithDetails;
use crate::error::AppError;
use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};
use crate::AppState;

const DEFAULT_FEED_LIMIT: i64 = 20;
const MAX_FEED_LIMIT: i64 = 100;

pub fn activities_router() -> Router<AppState> {
    Router::new()
        .route("/activities", get(own_activities))
        .route("/activities/following", get(following_activities))
}

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub limit: Option<i64>,
}

fn feed_limit(params: &FeedParams) -> i64 {
    params
        .limit
        .unwrap_or(DEFAULT_FEED_LIMIT)
        .clamp(1, MAX_FEED_LIMIT)
}

/// GET /api/activities
///
/// The caller's own feed, newest first.
async fn own_activities(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(params): Query<FeedParams>,
) -> Result<Json<Vec<ActivityWithDetails>>, AppError> {
    let feed = state
        .db
        .get_user_activities(&session.user_id, feed_limit(&params))
        .await?;
    Ok(Json(feed))
}

/// GET /api/activities/following
///
/// The combined feed of everyone the caller follows, newest first.
async fn following_activities(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(params): Query<FeedParams>,
) -> Result<Json<Vec<ActivityWithDetails>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/activities/following"])
        .start_timer();

    let feed = state
        .db
        .get_following_activities(&session.user_id, feed_limit(&params))
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/activities/following", "200"])
        .inc();
    Ok(Json(feed))
}
