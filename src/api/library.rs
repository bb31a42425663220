//! Library endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::data::{
    LibraryEntry, LibraryEntryPatch, LibraryEntryWithGame, LibraryStatus, NewLibraryEntry,
};
use crate::error::AppError;
use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};
use crate::service::LibraryService;
use crate::AppState;

pub fn library_router() -> Router<AppState> {
    Router::new()
        .route("/library", get(get_library).post(add_to_library))
        // PATCH addresses the entry id, DELETE addresses the game id,
        // mirroring how clients hold on to each.
        .route(
            "/library/:id",
            axum::routing::patch(update_entry).delete(remove_from_library),
        )
}

fn parse_status(status: &str) -> Result<LibraryStatus, AppError> {
    LibraryStatus::parse(status).ok_or_else(|| {
        AppError::Validation(
            "status must be one of: want_to_play, currently_playing, completed, dnf".to_string(),
        )
    })
}

fn validate_progress(progress: i64) -> Result<(), AppError> {
    if !(0..=100).contains(&progress) {
        return Err(AppError::Validation(
            "progress must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

fn validate_rating(rating: f64) -> Result<(), AppError> {
    if !(1.0..=5.0).contains(&rating) {
        return Err(AppError::Validation(
            "rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

fn validate_hours(hours: i64) -> Result<(), AppError> {
    if hours < 0 {
        return Err(AppError::Validation(
            "hoursPlayed cannot be negative".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct LibraryQuery {
    pub status: Option<String>,
}

/// GET /api/library
async fn get_library(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(params): Query<LibraryQuery>,
) -> Result<Json<Vec<LibraryEntryWithGame>>, AppError> {
    let status = params.status.as_deref().map(parse_status).transpose()?;
    let service = LibraryService::new(state.db.clone());
    Ok(Json(service.get_library(&session.user_id, status).await?))
}

/// Add-to-library request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToLibraryRequest {
    pub game_id: i64,
    pub status: String,
    pub progress: Option<i64>,
    pub rating: Option<f64>,
    pub hours_played: Option<i64>,
}

/// POST /api/library
async fn add_to_library(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<AddToLibraryRequest>,
) -> Result<(StatusCode, Json<LibraryEntry>), AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/library"])
        .start_timer();

    let status = parse_status(&request.status)?;
    let progress = request.progress.unwrap_or(0);
    validate_progress(progress)?;
    if let Some(rating) = request.rating {
        validate_rating(rating)?;
    }
    let hours_played = request.hours_played.unwrap_or(0);
    validate_hours(hours_played)?;

    let service = LibraryService::new(state.db.clone());
    let entry = service
        .add_game(&NewLibraryEntry {
            user_id: session.user_id.clone(),
            game_id: request.game_id,
            status,
            progress,
            rating: request.rating,
            hours_played,
            started_at: None,
        })
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/library", "201"])
        .inc();
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Library entry update request; omitted fields are left unchanged
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLibraryRequest {
    pub status: Option<String>,
    pub progress: Option<i64>,
    pub rating: Option<f64>,
    pub hours_played: Option<i64>,
}

/// PATCH /api/library/:id
async fn update_entry(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateLibraryRequest>,
) -> Result<Json<LibraryEntry>, AppError> {
    let status = request.status.as_deref().map(parse_status).transpose()?;
    if let Some(progress) = request.progress {
        validate_progress(progress)?;
    }
    if let Some(rating) = request.rating {
        validate_rating(rating)?;
    }
    if let Some(hours) = request.hours_played {
        validate_hours(hours)?;
    }

    let service = LibraryService::new(state.db.clone());
    let entry = service
        .update_entry(
            &session.user_id,
            id,
            &LibraryEntryPatch {
                status,
                progress: request.progress,
                rating: request.rating,
                hours_played: request.hours_played,
            },
        )
        .await?;
    Ok(Json(entry))
}

/// DELETE /api/library/:gameId
async fn remove_from_library(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(game_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let service = LibraryService::new(state.db.clone());
    service.remove_game(&session.user_id, game_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing() {
        assert!(parse_status("completed").is_ok());
        assert!(parse_status("abandoned").is_err());
    }

    #[test]
    fn range_validation() {
        assert!(validate_progress(100).is_ok());
        assert!(validate_progress(101).is_err());
        assert!(validate_rating(1.0).is_ok());
        assert!(validate_rating(0.5).is_err());
        assert!(validate_rating(5.5).is_err());
        assert!(validate_hours(0).is_ok());
        assert!(validate_hours(-1).is_err());
    }
}
