//! Game post, reaction and comment endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::data::{
    CommentWithUser, GamePost, NewGamePost, PostReaction, PostType, ReactionType, ReactionWithUser,
};
use crate::error::AppError;
use crate::AppState;

const MAX_COMMENT_CHARS: usize = 2000;

pub fn posts_router() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route("/posts/:id", axum::routing::delete(delete_post))
        .route(
            "/posts/:id/reactions",
            get(get_reactions).post(set_reaction).delete(remove_reaction),
        )
        .route("/posts/:id/comments", get(get_comments).post(add_comment))
}

// =============================================================================
// Posts
// =============================================================================

/// Post creation request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub game_id: i64,
    pub content: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub post_type: Option<String>,
}

/// POST /api/posts
async fn create_post(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<GamePost>), AppError> {
    if request.content.trim().is_empty() {
        return Err(AppError::Validation("content cannot be empty".to_string()));
    }
    let post_type = match request.post_type.as_deref() {
        None => PostType::Text,
        Some(raw) => PostType::parse(raw).ok_or_else(|| {
            AppError::Validation(
                "postType must be one of: text, image, screenshot, media".to_string(),
            )
        })?,
    };
    state
        .db
        .get_game(request.game_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let post = state
        .db
        .create_post(&NewGamePost {
            user_id: session.user_id.clone(),
            game_id: request.game_id,
            content: request.content,
            image_urls: request.image_urls,
            post_type,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

/// DELETE /api/posts/:id
async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.db.delete_post(id, &session.user_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Reactions
// =============================================================================

/// GET /api/posts/:id/reactions
async fn get_reactions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ReactionWithUser>>, AppError> {
    Ok(Json(state.db.get_reactions(id).await?))
}

/// Reaction request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
    pub reaction_type: String,
}

/// POST /api/posts/:id/reactions
///
/// One reaction per user per post; a second reaction replaces the first.
async fn set_reaction(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<ReactionRequest>,
) -> Result<Json<PostReaction>, AppError> {
    let reaction_type = ReactionType::parse(&request.reaction_type).ok_or_else(|| {
        AppError::Validation(
            "reactionType must be one of: like, heart, laugh, sad, wow, angry".to_string(),
        )
    })?;
    state.db.get_post(id).await?.ok_or(AppError::NotFound)?;

    let reaction = state
        .db
        .set_reaction(&session.user_id, id, reaction_type)
        .await?;
    Ok(Json(reaction))
}

/// DELETE /api/posts/:id/reactions
async fn remove_reaction(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.db.remove_reaction(&session.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Comments
// =============================================================================

/// GET /api/posts/:id/comments
async fn get_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<CommentWithUser>>, AppError> {
    Ok(Json(state.db.get_comments(id).await?))
}

/// Comment request
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

/// POST /api/posts/:id/comments
async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<crate::data::PostComment>), AppError> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("content cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::Validation(format!(
            "content cannot exceed {} characters",
            MAX_COMMENT_CHARS
        )));
    }
    state.db.get_post(id).await?.ok_or(AppError::NotFound)?;

    let comment = state.db.add_comment(&session.user_id, id, content).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
