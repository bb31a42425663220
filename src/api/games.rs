//! Game catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

use crate::auth::{CurrentUser, MaybeUser};
use crate::data::{Game, GameWithUserData, NewGame, NewGamePost, PostType, PostWithDetails, ReviewWithUser};
use crate::error::AppError;
use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};
use crate::service::{IngestService, ReviewService};
use crate::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;
const DEFAULT_SEARCH_LIMIT: i64 = 20;
const DEFAULT_SHELF_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

pub fn games_router() -> Router<AppState> {
    Router::new()
        .route("/games", get(list_games).post(create_game))
        .route("/games/search", get(search_games))
        .route("/games/search-igdb", get(search_catalog))
        .route("/games/from-igdb", post(import_from_catalog))
        .route("/games/trending", get(trending_games))
        .route("/games/top-rated", get(top_rated_games))
        .route("/games/new-releases", get(new_release_games))
        .route("/games/retro", get(retro_games))
        .route("/games/genre/:genre", get(games_by_genre))
        .route("/games/:id", get(get_game))
        .route("/games/:id/reviews", get(game_reviews))
        .route("/games/:id/posts", get(game_posts))
        .route("/games/:id/upload-media", post(upload_media))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

// =============================================================================
// Local catalog
// =============================================================================

/// GET /api/games
async fn list_games(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Game>>, AppError> {
    let limit = clamp_limit(params.limit, DEFAULT_LIST_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);
    let games = state.db.list_games(limit, offset).await?;
    Ok(Json(games))
}

/// GET /api/games/:id
///
/// Anonymous callers get the game with review stats; authenticated
/// callers also get their own library entry.
async fn get_game(
    State(state): State<AppState>,
    MaybeUser(session): MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<GameWithUserData>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/games/:id"])
        .start_timer();

    let viewer_id = session.as_ref().map(|s| s.user_id.as_str());
    let game = state
        .db
        .get_game_with_user_data(id, viewer_id)
        .await?
        .ok_or(AppError::NotFound)?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/games/:id", "200"])
        .inc();
    Ok(Json(game))
}

/// Game creation request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    pub title: String,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub screenshot_urls: Option<Vec<String>>,
    pub genre: Option<String>,
    pub platform: Option<String>,
    pub release_date: Option<chrono::DateTime<chrono::Utc>>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub metacritic_score: Option<i64>,
    #[serde(default)]
    pub is_retro: bool,
}

/// POST /api/games
async fn create_game(
    State(state): State<AppState>,
    CurrentUser(_session): CurrentUser,
    Json(request): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<Game>), AppError> {
    if request.title.trim().is_empty() {
        return Err(AppError::Validation("title cannot be empty".to_string()));
    }

    let game = state
        .db
        .create_game(&NewGame {
            igdb_id: None,
            title: request.title.trim().to_string(),
            description: request.description,
            cover_image_url: request.cover_image_url,
            screenshot_urls: request.screenshot_urls,
            genre: request.genre,
            platform: request.platform,
            release_date: request.release_date,
            developer: request.developer,
            publisher: request.publisher,
            metacritic_score: request.metacritic_score,
            igdb_rating: None,
            is_retro: request.is_retro,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(game)))
}

/// GET /api/games/search
async fn search_games(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Game>>, AppError> {
    let limit = clamp_limit(params.limit, DEFAULT_SEARCH_LIMIT);
    let games = state.db.search_games(params.q.trim(), limit).await?;
    Ok(Json(games))
}

/// GET /api/games/trending
async fn trending_games(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<Game>>, AppError> {
    let limit = clamp_limit(params.limit, DEFAULT_SHELF_LIMIT);
    Ok(Json(state.db.get_trending_games(limit).await?))
}

/// GET /api/games/top-rated
async fn top_rated_games(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<Game>>, AppError> {
    let limit = clamp_limit(params.limit, DEFAULT_SHELF_LIMIT);
    Ok(Json(state.db.get_top_rated_games(limit).await?))
}

/// GET /api/games/new-releases
async fn new_release_games(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<Game>>, AppError> {
    let limit = clamp_limit(params.limit, DEFAULT_SHELF_LIMIT);
    Ok(Json(state.db.get_new_release_games(limit).await?))
}

/// GET /api/games/retro
async fn retro_games(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<Game>>, AppError> {
    let limit = clamp_limit(params.limit, DEFAULT_SHELF_LIMIT);
    Ok(Json(state.db.get_retro_games(limit).await?))
}

/// GET /api/games/genre/:genre
async fn games_by_genre(
    State(state): State<AppState>,
    Path(genre): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<Game>>, AppError> {
    let limit = clamp_limit(params.limit, DEFAULT_SEARCH_LIMIT);
    Ok(Json(state.db.get_games_by_genre(&genre, limit).await?))
}

// =============================================================================
// External catalog
// =============================================================================

/// GET /api/games/search-igdb
async fn search_catalog(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<crate::catalog::CatalogSearchResult>>, AppError> {
    let term = params.q.trim();
    if term.is_empty() {
        return Err(AppError::Validation(
            "search query cannot be empty".to_string(),
        ));
    }
    let limit = clamp_limit(params.limit, DEFAULT_SEARCH_LIMIT);
    let results = state.catalog.search_games(term, limit).await?;
    Ok(Json(results))
}

/// Catalog import request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportGameRequest {
    pub igdb_id: i64,
}

/// POST /api/games/from-igdb
///
/// Idempotent: importing an already-known catalog id returns the
/// existing row with 200 instead of 201.
async fn import_from_catalog(
    State(state): State<AppState>,
    CurrentUser(_session): CurrentUser,
    Json(request): Json<ImportGameRequest>,
) -> Result<(StatusCode, Json<Game>), AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/games/from-igdb"])
        .start_timer();

    let already_known = state
        .db
        .get_game_by_igdb_id(request.igdb_id)
        .await?
        .is_some();

    let service = IngestService::new(state.db.clone(), state.catalog.clone());
    let game = service.ensure_game(request.igdb_id).await?;

    let status = if already_known {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/games/from-igdb", status.as_str()])
        .inc();
    Ok((status, Json(game)))
}

// =============================================================================
// Per-game content
// =============================================================================

/// GET /api/games/:id/reviews
async fn game_reviews(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ReviewWithUser>>, AppError> {
    let service = ReviewService::new(state.db.clone());
    Ok(Json(service.get_reviews_for_game(id).await?))
}

/// GET /api/games/:id/posts
async fn game_posts(
    State(state): State<AppState>,
    MaybeUser(session): MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PostWithDetails>>, AppError> {
    let viewer_id = session.as_ref().map(|s| s.user_id.as_str());
    Ok(Json(state.db.get_posts_for_game(id, viewer_id).await?))
}

/// Media upload request
///
/// The payload is a base64 data URL; it is stored as-is and attached to
/// a generated media post.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMediaRequest {
    pub image_data: String,
    pub file_name: Option<String>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMediaResponse {
    pub message: String,
    pub post: crate::data::GamePost,
    pub image_url: String,
}

/// POST /api/games/:id/upload-media
async fn upload_media(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(game_id): Path<i64>,
    Json(request): Json<UploadMediaRequest>,
) -> Result<Json<UploadMediaResponse>, AppError> {
    state
        .db
        .get_game(game_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let payload = strip_data_url_prefix(&request.image_data);
    let decoded = general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| AppError::Validation("image data is not valid base64".to_string()))?;
    if decoded.len() > state.config.media.max_upload_bytes {
        return Err(AppError::Validation(format!(
            "file size exceeds {} byte limit",
            state.config.media.max_upload_bytes
        )));
    }

    let file_name = request.file_name.as_deref().unwrap_or("screenshot");
    let post = state
        .db
        .create_post(&NewGamePost {
            user_id: session.user_id.clone(),
            game_id,
            content: format!("Uploaded {}", file_name),
            image_urls: vec![request.image_data.clone()],
            post_type: PostType::Media,
        })
        .await?;

    Ok(Json(UploadMediaResponse {
        message: "Media uploaded successfully".to_string(),
        post,
        image_url: request.image_data,
    }))
}

fn strip_data_url_prefix(image_data: &str) -> &str {
    if !image_data.starts_with("data:image/") {
        return image_data;
    }
    match image_data.split_once(";base64,") {
        Some((_, payload)) => payload,
        None => image_data,
    }
}
