//! User profile and social graph endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{CurrentUser, MaybeUser};
use crate::data::{
    FavoriteGameWithGame, PostWithDetails, ReviewWithGame, User, UserProfilePatch, UserWithStats,
};
use crate::error::AppError;
use crate::service::ReviewService;
use crate::AppState;

const DEFAULT_SEARCH_LIMIT: i64 = 20;
const FAVORITE_SLOTS: i64 = 4;

pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/auth/user", get(current_user))
        .route("/users/profile", patch(update_profile))
        .route("/users/search", get(search_users))
        .route("/users/:user_id", get(get_user))
        .route(
            "/users/:user_id/follow",
            post(follow_user).delete(unfollow_user),
        )
        .route("/users/:user_id/followers", get(followers))
        .route("/users/:user_id/following", get(following))
        .route("/users/:user_id/reviews", get(user_reviews))
        .route("/users/:user_id/posts", get(user_posts))
        .route("/users/:user_id/favorites", get(user_favorites))
        .route("/favorites", post(set_favorite))
        .route("/favorites/:position", axum::routing::delete(remove_favorite))
}

// =============================================================================
// Profile
// =============================================================================

/// GET /api/auth/user
///
/// The authenticated user with aggregated library stats.
async fn current_user(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<UserWithStats>, AppError> {
    let user = state
        .db
        .get_user_with_stats(&session.user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(user))
}

/// Profile update request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    pub steam_username: Option<String>,
    pub epic_username: Option<String>,
    pub battlenet_username: Option<String>,
    pub psn_username: Option<String>,
    pub xbox_username: Option<String>,
    pub nintendo_username: Option<String>,
    pub ea_username: Option<String>,
    pub discord_username: Option<String>,
}

/// PATCH /api/users/profile
async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    if let Some(username) = &request.username {
        let trimmed = username.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("username cannot be empty".to_string()));
        }
    }

    let user = state
        .db
        .update_user_profile(
            &session.user_id,
            &UserProfilePatch {
                username: request.username.map(|u| u.trim().to_string()),
                bio: request.bio,
                profile_image_url: request.profile_image_url,
                steam_username: request.steam_username,
                epic_username: request.epic_username,
                battlenet_username: request.battlenet_username,
                psn_username: request.psn_username,
                xbox_username: request.xbox_username,
                nintendo_username: request.nintendo_username,
                ea_username: request.ea_username,
                discord_username: request.discord_username,
            },
        )
        .await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<i64>,
}

/// GET /api/users/search
async fn search_users(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<User>>, AppError> {
    let term = params.q.trim();
    if term.is_empty() {
        return Ok(Json(vec![]));
    }
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, 100);
    Ok(Json(state.db.search_users(term, limit).await?))
}

/// GET /api/users/:userId
async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserWithStats>, AppError> {
    let user = state
        .db
        .get_user_with_stats(&user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(user))
}

// =============================================================================
// Follows
// =============================================================================

/// POST /api/users/:userId/follow
async fn follow_user(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    state
        .db
        .get_user(&user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    state.db.follow_user(&session.user_id, &user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User followed successfully" })),
    ))
}

/// DELETE /api/users/:userId/follow
async fn unfollow_user(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.db.unfollow_user(&session.user_id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/users/:userId/followers
async fn followers(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.db.get_followers(&user_id).await?))
}

/// GET /api/users/:userId/following
async fn following(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.db.get_following(&user_id).await?))
}

// =============================================================================
// Per-user content
// =============================================================================

/// GET /api/users/:userId/reviews
async fn user_reviews(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ReviewWithGame>>, AppError> {
    let service = ReviewService::new(state.db.clone());
    Ok(Json(service.get_reviews_by_user(&user_id).await?))
}

/// GET /api/users/:userId/posts
async fn user_posts(
    State(state): State<AppState>,
    MaybeUser(session): MaybeUser,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<PostWithDetails>>, AppError> {
    let viewer_id = session.as_ref().map(|s| s.user_id.as_str());
    Ok(Json(state.db.get_posts_by_user(&user_id, viewer_id).await?))
}

// =============================================================================
// Favorites
// =============================================================================

/// GET /api/users/:userId/favorites
async fn user_favorites(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<FavoriteGameWithGame>>, AppError> {
    Ok(Json(state.db.get_favorite_games(&user_id).await?))
}

/// Favorite slot request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetFavoriteRequest {
    pub game_id: i64,
    pub position: i64,
}

/// POST /api/favorites
///
/// Pins a game into one of the four profile slots, replacing whatever
/// occupied it.
async fn set_favorite(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<SetFavoriteRequest>,
) -> Result<Json<crate::data::FavoriteGame>, AppError> {
    if !(1..=FAVORITE_SLOTS).contains(&request.position) {
        return Err(AppError::Validation(format!(
            "position must be between 1 and {}",
            FAVORITE_SLOTS
        )));
    }
    state
        .db
        .get_game(request.game_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let favorite = state
        .db
        .set_favorite_game(&session.user_id, request.game_id, request.position)
        .await?;
    Ok(Json(favorite))
}

/// DELETE /api/favorites/:position
async fn remove_favorite(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(position): Path<i64>,
) -> Result<StatusCode, AppError> {
    state
        .db
        .remove_favorite_game(&session.user_id, position)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
