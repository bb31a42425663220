//! Review endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::data::{NewReview, Review, ReviewPatch};
use crate::error::AppError;
use crate::service::ReviewService;
use crate::AppState;

pub fn reviews_router() -> Router<AppState> {
    Router::new()
        .route("/reviews", post(create_review))
        .route(
            "/reviews/:id",
            axum::routing::patch(update_review).delete(delete_review),
        )
}

fn validate_rating(rating: f64) -> Result<(), AppError> {
    if !(1.0..=5.0).contains(&rating) {
        return Err(AppError::Validation(
            "rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

/// Review creation request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub game_id: i64,
    pub rating: f64,
    pub title: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub spoilers: bool,
    pub recommended_for: Option<String>,
}

/// POST /api/reviews
async fn create_review(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    validate_rating(request.rating)?;

    let service = ReviewService::new(state.db.clone());
    let review = service
        .create_review(&NewReview {
            user_id: session.user_id.clone(),
            game_id: request.game_id,
            rating: request.rating,
            title: request.title,
            content: request.content,
            image_url: request.image_url,
            spoilers: request.spoilers,
            recommended_for: request.recommended_for,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(review)))
}

/// Review update request; omitted fields are left unchanged
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReviewRequest {
    pub rating: Option<f64>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub spoilers: Option<bool>,
    pub recommended_for: Option<String>,
}

/// PATCH /api/reviews/:id
async fn update_review(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateReviewRequest>,
) -> Result<Json<Review>, AppError> {
    if let Some(rating) = request.rating {
        validate_rating(rating)?;
    }

    let service = ReviewService::new(state.db.clone());
    let review = service
        .update_review(
            id,
            &session.user_id,
            &ReviewPatch {
                rating: request.rating,
                title: request.title,
                content: request.content,
                spoilers: request.spoilers,
                recommended_for: request.recommended_for,
            },
        )
        .await?;
    Ok(Json(review))
}

/// DELETE /api/reviews/:id
async fn delete_review(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let service = ReviewService::new(state.db.clone());
    service.delete_review(id, &session.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
