//! Catalog ingestion service
//!
//! Materializes games from the external catalog into local rows.
//! Ingestion is idempotent on the catalog id: an already-imported game
//! is returned as-is without touching the catalog again.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use crate::catalog::{CatalogGame, CatalogProvider};
use crate::data::{Database, Game, NewGame};
use crate::error::AppError;

/// Games released at least this long ago are tagged retro at ingestion.
const RETRO_AGE_SECONDS: i64 = 15 * 365 * 24 * 60 * 60;

pub struct IngestService {
    db: Arc<Database>,
    catalog: Arc<dyn CatalogProvider>,
}

impl IngestService {
    pub fn new(db: Arc<Database>, catalog: Arc<dyn CatalogProvider>) -> Self {
        Self { db, catalog }
    }

    /// Return the local game for a catalog id, importing it on first use.
    ///
    /// # Errors
    /// `NotFound` if the catalog has no such game.
    pub async fn ensure_game(&self, catalog_id: i64) -> Result<Game, AppError> {
        if let Some(existing) = self.db.get_game_by_igdb_id(catalog_id).await? {
            return Ok(existing);
        }

        let details = self
            .catalog
            .game_details(catalog_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let new_game = map_catalog_game(details);

        match self.db.create_game(&new_game).await {
            Ok(game) => {
                tracing::info!(game_id = game.id, catalog_id, "Imported game from catalog");
                Ok(game)
            }
            // A concurrent import for the same catalog id won the race.
            Err(AppError::Conflict(_)) => self
                .db
                .get_game_by_igdb_id(catalog_id)
                .await?
                .ok_or(AppError::NotFound),
            Err(error) => Err(error),
        }
    }
}

/// Map catalog metadata onto a local game row.
///
/// The catalog's 0-100 rating becomes the local 0-5 scale, and the
/// retro flag is decided once here from the release date.
fn map_catalog_game(details: CatalogGame) -> NewGame {
    let release_date = details
        .first_release_date
        .and_then(|seconds| Utc.timestamp_opt(seconds, 0).single());
    let is_retro = details
        .first_release_date
        .map(|seconds| seconds < Utc::now().timestamp() - RETRO_AGE_SECONDS)
        .unwrap_or(false);

    NewGame {
        igdb_id: Some(details.id),
        title: details.name,
        description: details.summary,
        cover_image_url: details.cover_url,
        screenshot_urls: if details.screenshot_urls.is_empty() {
            None
        } else {
            Some(details.screenshot_urls)
        },
        genre: details.genres.into_iter().next(),
        platform: if details.platforms.is_empty() {
            None
        } else {
            Some(details.platforms.join(", "))
        },
        release_date,
        developer: details.developer,
        publisher: details.publisher,
        metacritic_score: None,
        igdb_rating: details.rating.map(|r| r.round() / 20.0),
        is_retro,
    }
}
