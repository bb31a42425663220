//! SQLite database operations
//!
//! All database access goes through this module.
//! Write operations that participate in multi-statement business flows
//! take an explicit executor so callers can run them inside one
//! transaction.

use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Executor, Pool, QueryBuilder, Sqlite, Transaction};
use std::collections::HashMap;
use std::path::Path;

use super::models::*;
use crate::error::AppError;

/// Window for the "new releases" shelf.
const NEW_RELEASE_WINDOW_DAYS: i64 = 90;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database and run migrations
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        // A single connection keeps every read ordered after the write that
        // preceded it; SQLite serializes writers regardless.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Begin an explicit transaction.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin().await?)
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Create or refresh a user row from identity-provider claims.
    ///
    /// Profile fields the user edits themselves (username, bio, gamer tags)
    /// are never touched here.
    pub async fn upsert_user(&self, upsert: &UpsertUser) -> Result<User, AppError> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, first_name, last_name, profile_image_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                profile_image_url = excluded.profile_image_url,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(&upsert.id)
        .bind(&upsert.email)
        .bind(&upsert.first_name)
        .bind(&upsert.last_name)
        .bind(&upsert.profile_image_url)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Apply a partial profile update.
    ///
    /// # Returns
    /// The updated user, or `AppError::NotFound` if no row matched.
    pub async fn update_user_profile(
        &self,
        id: &str,
        patch: &UserProfilePatch,
    ) -> Result<User, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE users SET ");
        {
            let mut fields = query.separated(", ");
            if let Some(username) = &patch.username {
                fields.push("username = ");
                fields.push_bind_unseparated(username);
            }
            if let Some(bio) = &patch.bio {
                fields.push("bio = ");
                fields.push_bind_unseparated(bio);
            }
            if let Some(url) = &patch.profile_image_url {
                fields.push("profile_image_url = ");
                fields.push_bind_unseparated(url);
            }
            if let Some(v) = &patch.steam_username {
                fields.push("steam_username = ");
                fields.push_bind_unseparated(v);
            }
            if let Some(v) = &patch.epic_username {
                fields.push("epic_username = ");
                fields.push_bind_unseparated(v);
            }
            if let Some(v) = &patch.battlenet_username {
                fields.push("battlenet_username = ");
                fields.push_bind_unseparated(v);
            }
            if let Some(v) = &patch.psn_username {
                fields.push("psn_username = ");
                fields.push_bind_unseparated(v);
            }
            if let Some(v) = &patch.xbox_username {
                fields.push("xbox_username = ");
                fields.push_bind_unseparated(v);
            }
            if let Some(v) = &patch.nintendo_username {
                fields.push("nintendo_username = ");
                fields.push_bind_unseparated(v);
            }
            if let Some(v) = &patch.ea_username {
                fields.push("ea_username = ");
                fields.push_bind_unseparated(v);
            }
            if let Some(v) = &patch.discord_username {
                fields.push("discord_username = ");
                fields.push_bind_unseparated(v);
            }
            fields.push("updated_at = ");
            fields.push_bind_unseparated(Utc::now());
        }
        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from(e).conflict_on_unique("Username already taken"))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        self.get_user(id).await?.ok_or(AppError::NotFound)
    }

    /// Substring search over username and real name, case-insensitive.
    pub async fn search_users(&self, term: &str, limit: i64) -> Result<Vec<User>, AppError> {
        let pattern = format!("%{}%", term);
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE username LIKE ? COLLATE NOCASE
               OR first_name LIKE ? COLLATE NOCASE
               OR last_name LIKE ? COLLATE NOCASE
            ORDER BY username ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Aggregate library statistics for a user.
    ///
    /// A user with no library entries gets an all-zero result rather than
    /// an error.
    pub async fn get_user_stats(&self, user_id: &str) -> Result<UserStats, AppError> {
        let stats = sqlx::query_as::<_, UserStats>(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS games_completed,
                COALESCE(SUM(CASE WHEN status = 'currently_playing' THEN 1 ELSE 0 END), 0) AS games_playing,
                COALESCE(SUM(CASE WHEN status = 'want_to_play' THEN 1 ELSE 0 END), 0) AS games_want_to_play,
                COALESCE(SUM(hours_played), 0) AS total_hours_played,
                COALESCE(AVG(rating), 0.0) AS average_rating
            FROM library_entries
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    pub async fn get_user_with_stats(&self, id: &str) -> Result<Option<UserWithStats>, AppError> {
        let Some(user) = self.get_user(id).await? else {
            return Ok(None);
        };
        let stats = self.get_user_stats(id).await?;
        Ok(Some(UserWithStats { user, stats }))
    }

    /// Batch-fetch users by id, chunked to stay under SQLite's IN limit.
    pub async fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<User>, AppError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut all_users = Vec::new();
        for chunk in ids.chunks(100) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let query = format!("SELECT * FROM users WHERE id IN ({})", placeholders);

            let mut query_builder = sqlx::query_as::<_, User>(&query);
            for id in chunk {
                query_builder = query_builder.bind(id);
            }

            all_users.extend(query_builder.fetch_all(&self.pool).await?);
        }

        Ok(all_users)
    }

    // =========================================================================
    // Games
    // =========================================================================

    pub async fn get_game(&self, id: i64) -> Result<Option<Game>, AppError> {
        let game = sqlx::query_as::<_, Game>("SELECT * FROM games WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(game)
    }

    pub async fn get_game_by_igdb_id(&self, igdb_id: i64) -> Result<Option<Game>, AppError> {
        let game = sqlx::query_as::<_, Game>("SELECT * FROM games WHERE igdb_id = ?")
            .bind(igdb_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(game)
    }

    pub async fn list_games(&self, limit: i64, offset: i64) -> Result<Vec<Game>, AppError> {
        let games = sqlx::query_as::<_, Game>(
            "SELECT * FROM games ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(games)
    }

    /// Insert a game row.
    ///
    /// A duplicate external catalog id surfaces as `AppError::Conflict`.
    pub async fn create_game(&self, new: &NewGame) -> Result<Game, AppError> {
        let game = sqlx::query_as::<_, Game>(
            r#"
            INSERT INTO games (
                igdb_id, title, description, cover_image_url, screenshot_urls,
                genre, platform, release_date, developer, publisher,
                metacritic_score, igdb_rating, is_retro, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(new.igdb_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.cover_image_url)
        .bind(new.screenshot_urls.clone().map(Json))
        .bind(&new.genre)
        .bind(&new.platform)
        .bind(new.release_date)
        .bind(&new.developer)
        .bind(&new.publisher)
        .bind(new.metacritic_score)
        .bind(new.igdb_rating)
        .bind(new.is_retro)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from(e).conflict_on_unique("Game already in catalog"))?;

        Ok(game)
    }

    /// Substring search over title, description, genre and developer.
    pub async fn search_games(&self, term: &str, limit: i64) -> Result<Vec<Game>, AppError> {
        let pattern = format!("%{}%", term);
        let games = sqlx::query_as::<_, Game>(
            r#"
            SELECT * FROM games
            WHERE title LIKE ? COLLATE NOCASE
               OR description LIKE ? COLLATE NOCASE
               OR genre LIKE ? COLLATE NOCASE
               OR developer LIKE ? COLLATE NOCASE
            ORDER BY title ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(games)
    }

    pub async fn get_games_by_genre(&self, genre: &str, limit: i64) -> Result<Vec<Game>, AppError> {
        let pattern = format!("%{}%", genre);
        let games = sqlx::query_as::<_, Game>(
            r#"
            SELECT * FROM games
            WHERE genre LIKE ? COLLATE NOCASE
            ORDER BY title ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(games)
    }

    /// Games ranked by how many libraries contain them.
    ///
    /// Ties break on ascending game id so the ordering is stable.
    pub async fn get_trending_games(&self, limit: i64) -> Result<Vec<Game>, AppError> {
        let games = sqlx::query_as::<_, Game>(
            r#"
            SELECT g.* FROM games g
            LEFT JOIN library_entries le ON le.game_id = g.id
            GROUP BY g.id
            ORDER BY COUNT(le.id) DESC, g.id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(games)
    }

    /// Games ranked by average review rating. Unreviewed games are excluded.
    pub async fn get_top_rated_games(&self, limit: i64) -> Result<Vec<Game>, AppError> {
        let games = sqlx::query_as::<_, Game>(
            r#"
            SELECT g.* FROM games g
            JOIN reviews r ON r.game_id = g.id
            GROUP BY g.id
            HAVING COUNT(r.id) > 0
            ORDER BY AVG(r.rating) DESC, g.id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(games)
    }

    /// Games released within the recent window, newest first.
    pub async fn get_new_release_games(&self, limit: i64) -> Result<Vec<Game>, AppError> {
        let now = Utc::now();
        let cutoff = now - Duration::days(NEW_RELEASE_WINDOW_DAYS);
        let games = sqlx::query_as::<_, Game>(
            r#"
            SELECT * FROM games
            WHERE release_date IS NOT NULL AND release_date >= ? AND release_date <= ?
            ORDER BY release_date DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(cutoff)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(games)
    }

    pub async fn get_retro_games(&self, limit: i64) -> Result<Vec<Game>, AppError> {
        let games = sqlx::query_as::<_, Game>(
            r#"
            SELECT * FROM games
            WHERE is_retro = 1
            ORDER BY release_date ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(games)
    }

    /// Average review rating and review count for a game.
    pub async fn get_review_stats(&self, game_id: i64) -> Result<(f64, i64), AppError> {
        let row = sqlx::query_as::<_, (f64, i64)>(
            "SELECT COALESCE(AVG(rating), 0.0), COUNT(id) FROM reviews WHERE game_id = ?",
        )
        .bind(game_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Game detail page projection: review stats plus the viewer's own
    /// library entry when a viewer is present.
    pub async fn get_game_with_user_data(
        &self,
        game_id: i64,
        viewer_id: Option<&str>,
    ) -> Result<Option<GameWithUserData>, AppError> {
        let Some(game) = self.get_game(game_id).await? else {
            return Ok(None);
        };

        let (average_rating, review_count) = self.get_review_stats(game_id).await?;

        let user_game = match viewer_id {
            Some(user_id) => self.get_library_entry_for_game(user_id, game_id).await?,
            None => None,
        };

        Ok(Some(GameWithUserData {
            game,
            user_game,
            average_rating,
            review_count,
        }))
    }

    /// Batch-fetch games by id, chunked to stay under SQLite's IN limit.
    pub async fn get_games_by_ids(&self, ids: &[i64]) -> Result<Vec<Game>, AppError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut all_games = Vec::new();
        for chunk in ids.chunks(100) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let query = format!("SELECT * FROM games WHERE id IN ({})", placeholders);

            let mut query_builder = sqlx::query_as::<_, Game>(&query);
            for id in chunk {
                query_builder = query_builder.bind(id);
            }

            all_games.extend(query_builder.fetch_all(&self.pool).await?);
        }

        Ok(all_games)
    }

    // =========================================================================
    // Library
    // =========================================================================

    pub async fn get_library_entry(&self, id: i64) -> Result<Option<LibraryEntry>, AppError> {
        let entry = sqlx::query_as::<_, LibraryEntry>("SELECT * FROM library_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    pub async fn get_library_entry_for_game(
        &self,
        user_id: &str,
        game_id: i64,
    ) -> Result<Option<LibraryEntry>, AppError> {
        let entry = sqlx::query_as::<_, LibraryEntry>(
            "SELECT * FROM library_entries WHERE user_id = ? AND game_id = ?",
        )
        .bind(user_id)
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// A user's library with games attached, optionally filtered by status.
    pub async fn get_library(
        &self,
        user_id: &str,
        status: Option<LibraryStatus>,
    ) -> Result<Vec<LibraryEntryWithGame>, AppError> {
        let entries = match status {
            Some(status) => {
                sqlx::query_as::<_, LibraryEntry>(
                    r#"
                    SELECT * FROM library_entries
                    WHERE user_id = ? AND status = ?
                    ORDER BY updated_at DESC, id ASC
                    "#,
                )
                .bind(user_id)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, LibraryEntry>(
                    r#"
                    SELECT * FROM library_entries
                    WHERE user_id = ?
                    ORDER BY updated_at DESC, id ASC
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let game_ids: Vec<i64> = entries.iter().map(|e| e.game_id).collect();
        let mut games: HashMap<i64, Game> = self
            .get_games_by_ids(&game_ids)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect();

        let mut result = Vec::with_capacity(entries.len());
        for entry in entries {
            // Skipping entries whose game vanished keeps the endpoint total.
            if let Some(game) = games.remove(&entry.game_id) {
                result.push(LibraryEntryWithGame { entry, game });
            }
        }

        Ok(result)
    }

    /// Insert a library entry.
    ///
    /// Takes an executor so the caller can pair it with an activity append
    /// in one transaction. A duplicate (user, game) pair surfaces as
    /// `AppError::Conflict`.
    pub async fn insert_library_entry<'e, E>(
        &self,
        executor: E,
        new: &NewLibraryEntry,
    ) -> Result<LibraryEntry, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        let entry = sqlx::query_as::<_, LibraryEntry>(
            r#"
            INSERT INTO library_entries (
                user_id, game_id, status, progress, rating, hours_played,
                started_at, completed_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&new.user_id)
        .bind(new.game_id)
        .bind(new.status.as_str())
        .bind(new.progress)
        .bind(new.rating)
        .bind(new.hours_played)
        .bind(new.started_at)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
        .map_err(|e| AppError::from(e).conflict_on_unique("Game is already in your library"))?;

        Ok(entry)
    }

    /// Overwrite the mutable fields of a library entry, scoped to its owner.
    ///
    /// # Returns
    /// The updated entry, or `AppError::NotFound` when the entry does not
    /// exist or belongs to someone else.
    pub async fn update_library_entry<'e, E>(
        &self,
        executor: E,
        id: i64,
        user_id: &str,
        status: LibraryStatus,
        progress: i64,
        rating: Option<f64>,
        hours_played: i64,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<LibraryEntry, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let entry = sqlx::query_as::<_, LibraryEntry>(
            r#"
            UPDATE library_entries
            SET status = ?, progress = ?, rating = ?, hours_played = ?,
                started_at = ?, completed_at = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            RETURNING *
            "#,
        )
        .bind(status.as_str())
        .bind(progress)
        .bind(rating)
        .bind(hours_played)
        .bind(started_at)
        .bind(completed_at)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        entry.ok_or(AppError::NotFound)
    }

    /// Remove a game from a user's library.
    ///
    /// # Returns
    /// `true` if a row was removed.
    pub async fn remove_library_entry(
        &self,
        user_id: &str,
        game_id: i64,
    ) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM library_entries WHERE user_id = ? AND game_id = ?")
                .bind(user_id)
                .bind(game_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    pub async fn get_review(&self, id: i64) -> Result<Option<Review>, AppError> {
        let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(review)
    }

    pub async fn insert_review<'e, E>(
        &self,
        executor: E,
        new: &NewReview,
    ) -> Result<Review, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (
                user_id, game_id, rating, title, content, image_url,
                spoilers, recommended_for, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&new.user_id)
        .bind(new.game_id)
        .bind(new.rating)
        .bind(&new.title)
        .bind(&new.content)
        .bind(&new.image_url)
        .bind(new.spoilers)
        .bind(&new.recommended_for)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await?;

        Ok(review)
    }

    /// Reviews for a game with authors attached, newest first.
    pub async fn get_reviews_for_game(
        &self,
        game_id: i64,
    ) -> Result<Vec<ReviewWithUser>, AppError> {
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews WHERE game_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        let user_ids: Vec<String> = reviews.iter().map(|r| r.user_id.clone()).collect();
        let users: HashMap<String, User> = self
            .get_users_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let mut result = Vec::with_capacity(reviews.len());
        for review in reviews {
            if let Some(user) = users.get(&review.user_id) {
                result.push(ReviewWithUser {
                    user: user.clone(),
                    review,
                });
            }
        }

        Ok(result)
    }

    /// Reviews written by a user with games attached, newest first.
    pub async fn get_reviews_by_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ReviewWithGame>, AppError> {
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let game_ids: Vec<i64> = reviews.iter().map(|r| r.game_id).collect();
        let games: HashMap<i64, Game> = self
            .get_games_by_ids(&game_ids)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect();

        let mut result = Vec::with_capacity(reviews.len());
        for review in reviews {
            if let Some(game) = games.get(&review.game_id) {
                result.push(ReviewWithGame {
                    game: game.clone(),
                    review,
                });
            }
        }

        Ok(result)
    }

    /// Apply a partial review update, scoped to its author.
    pub async fn update_review(
        &self,
        id: i64,
        user_id: &str,
        patch: &ReviewPatch,
    ) -> Result<Review, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE reviews SET ");
        {
            let mut fields = query.separated(", ");
            if let Some(rating) = patch.rating {
                fields.push("rating = ");
                fields.push_bind_unseparated(rating);
            }
            if let Some(title) = &patch.title {
                fields.push("title = ");
                fields.push_bind_unseparated(title);
            }
            if let Some(content) = &patch.content {
                fields.push("content = ");
                fields.push_bind_unseparated(content);
            }
            if let Some(spoilers) = patch.spoilers {
                fields.push("spoilers = ");
                fields.push_bind_unseparated(spoilers);
            }
            if let Some(recommended_for) = &patch.recommended_for {
                fields.push("recommended_for = ");
                fields.push_bind_unseparated(recommended_for);
            }
            fields.push("updated_at = ");
            fields.push_bind_unseparated(Utc::now());
        }
        query.push(" WHERE id = ");
        query.push_bind(id);
        query.push(" AND user_id = ");
        query.push_bind(user_id);

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        self.get_review(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn delete_review(&self, id: i64, user_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Activities
    // =========================================================================

    /// Append one feed event. Activities are never updated or deleted.
    pub async fn insert_activity<'e, E>(
        &self,
        executor: E,
        new: &NewActivity,
    ) -> Result<Activity, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let activity = sqlx::query_as::<_, Activity>(
            r#"
            INSERT INTO activities (user_id, game_id, activity_type, metadata, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&new.user_id)
        .bind(new.game_id)
        .bind(new.activity_type.as_str())
        .bind(new.metadata.clone().map(Json))
        .bind(Utc::now())
        .fetch_one(executor)
        .await?;

        Ok(activity)
    }

    /// A single user's feed, newest first.
    pub async fn get_user_activities(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ActivityWithDetails>, AppError> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"
            SELECT * FROM activities
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        self.compose_activity_details(activities).await
    }

    /// The feed of everyone the user follows, newest first.
    pub async fn get_following_activities(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ActivityWithDetails>, AppError> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"
            SELECT * FROM activities
            WHERE user_id IN (SELECT following_id FROM follows WHERE follower_id = ?)
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        self.compose_activity_details(activities).await
    }

    /// Attach user and game rows to a page of activities with two batch
    /// queries instead of one pair per row.
    async fn compose_activity_details(
        &self,
        activities: Vec<Activity>,
    ) -> Result<Vec<ActivityWithDetails>, AppError> {
        let mut user_ids: Vec<String> = activities.iter().map(|a| a.user_id.clone()).collect();
        user_ids.sort();
        user_ids.dedup();
        let mut game_ids: Vec<i64> = activities.iter().filter_map(|a| a.game_id).collect();
        game_ids.sort_unstable();
        game_ids.dedup();

        let users: HashMap<String, User> = self
            .get_users_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        let games: HashMap<i64, Game> = self
            .get_games_by_ids(&game_ids)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect();

        let mut result = Vec::with_capacity(activities.len());
        for activity in activities {
            let Some(user) = users.get(&activity.user_id) else {
                continue;
            };
            let game = activity.game_id.and_then(|id| games.get(&id).cloned());
            result.push(ActivityWithDetails {
                user: user.clone(),
                game,
                activity,
            });
        }

        Ok(result)
    }

    // =========================================================================
    // Follows
    // =========================================================================

    /// Create a follower edge.
    ///
    /// Following the same user twice surfaces as `AppError::Conflict`;
    /// self-follows are rejected before any write.
    pub async fn follow_user(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> Result<Follow, AppError> {
        if follower_id == following_id {
            return Err(AppError::Validation("You cannot follow yourself".to_string()));
        }

        let follow = sqlx::query_as::<_, Follow>(
            r#"
            INSERT INTO follows (follower_id, following_id, created_at)
            VALUES (?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from(e).conflict_on_unique("Already following this user"))?;

        Ok(follow)
    }

    pub async fn unfollow_user(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM follows WHERE follower_id = ? AND following_id = ?")
                .bind(follower_id)
                .bind(following_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_following(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> Result<bool, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM follows WHERE follower_id = ? AND following_id = ?",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    pub async fn get_followers(&self, user_id: &str) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN follows f ON f.follower_id = u.id
            WHERE f.following_id = ?
            ORDER BY f.created_at DESC, f.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn get_following(&self, user_id: &str) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN follows f ON f.following_id = u.id
            WHERE f.follower_id = ?
            ORDER BY f.created_at DESC, f.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    // =========================================================================
    // Posts
    // =========================================================================

    pub async fn get_post(&self, id: i64) -> Result<Option<GamePost>, AppError> {
        let post = sqlx::query_as::<_, GamePost>("SELECT * FROM game_posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }

    pub async fn create_post(&self, new: &NewGamePost) -> Result<GamePost, AppError> {
        let post = sqlx::query_as::<_, GamePost>(
            r#"
            INSERT INTO game_posts (user_id, game_id, content, image_urls, post_type, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&new.user_id)
        .bind(new.game_id)
        .bind(&new.content)
        .bind(Json(new.image_urls.clone()))
        .bind(new.post_type.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(post)
    }

    /// Delete a post and everything hanging off it, scoped to its author.
    pub async fn delete_post(&self, id: i64, user_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM game_posts WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Posts about a game, fully composed for the feed.
    pub async fn get_posts_for_game(
        &self,
        game_id: i64,
        viewer_id: Option<&str>,
    ) -> Result<Vec<PostWithDetails>, AppError> {
        let posts = sqlx::query_as::<_, GamePost>(
            "SELECT * FROM game_posts WHERE game_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        self.compose_post_details(posts, viewer_id).await
    }

    /// Posts written by a user, fully composed for their profile.
    pub async fn get_posts_by_user(
        &self,
        user_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<Vec<PostWithDetails>, AppError> {
        let posts = sqlx::query_as::<_, GamePost>(
            "SELECT * FROM game_posts WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.compose_post_details(posts, viewer_id).await
    }

    /// Attach authors, games, reactions and comments to a page of posts
    /// with batch queries.
    async fn compose_post_details(
        &self,
        posts: Vec<GamePost>,
        viewer_id: Option<&str>,
    ) -> Result<Vec<PostWithDetails>, AppError> {
        if posts.is_empty() {
            return Ok(vec![]);
        }

        let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let reactions = self.get_reactions_for_posts(&post_ids).await?;
        let comments = self.get_comments_for_posts(&post_ids).await?;

        let mut user_ids: Vec<String> = posts.iter().map(|p| p.user_id.clone()).collect();
        user_ids.extend(reactions.iter().map(|r| r.user_id.clone()));
        user_ids.extend(comments.iter().map(|c| c.user_id.clone()));
        user_ids.sort();
        user_ids.dedup();
        let mut game_ids: Vec<i64> = posts.iter().map(|p| p.game_id).collect();
        game_ids.sort_unstable();
        game_ids.dedup();

        let users: HashMap<String, User> = self
            .get_users_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        let games: HashMap<i64, Game> = self
            .get_games_by_ids(&game_ids)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect();

        let mut reactions_by_post: HashMap<i64, Vec<PostReaction>> = HashMap::new();
        for reaction in reactions {
            reactions_by_post
                .entry(reaction.post_id)
                .or_default()
                .push(reaction);
        }
        let mut comments_by_post: HashMap<i64, Vec<PostComment>> = HashMap::new();
        for comment in comments {
            comments_by_post
                .entry(comment.post_id)
                .or_default()
                .push(comment);
        }

        let mut result = Vec::with_capacity(posts.len());
        for post in posts {
            let (Some(user), Some(game)) =
                (users.get(&post.user_id), games.get(&post.game_id))
            else {
                continue;
            };

            let post_reactions = reactions_by_post.remove(&post.id).unwrap_or_default();
            let mut reaction_counts = ReactionCounts::default();
            let mut user_reaction = None;
            let mut reactions_with_users = Vec::with_capacity(post_reactions.len());
            for reaction in post_reactions {
                match reaction.reaction_type.as_str() {
                    "like" => reaction_counts.like += 1,
                    "heart" => reaction_counts.heart += 1,
                    "laugh" => reaction_counts.laugh += 1,
                    "sad" => reaction_counts.sad += 1,
                    "wow" => reaction_counts.wow += 1,
                    "angry" => reaction_counts.angry += 1,
                    _ => {}
                }
                if viewer_id == Some(reaction.user_id.as_str()) {
                    user_reaction = Some(reaction.reaction_type.clone());
                }
                if let Some(reactor) = users.get(&reaction.user_id) {
                    reactions_with_users.push(ReactionWithUser {
                        user: reactor.clone(),
                        reaction,
                    });
                }
            }

            let comments_with_users = comments_by_post
                .remove(&post.id)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|comment| {
                    users.get(&comment.user_id).map(|author| CommentWithUser {
                        user: author.clone(),
                        comment,
                    })
                })
                .collect();

            result.push(PostWithDetails {
                user: user.clone(),
                game: game.clone(),
                reactions: reactions_with_users,
                comments: comments_with_users,
                reaction_counts,
                user_reaction,
                post,
            });
        }

        Ok(result)
    }

    async fn get_reactions_for_posts(
        &self,
        post_ids: &[i64],
    ) -> Result<Vec<PostReaction>, AppError> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut all_reactions = Vec::new();
        for chunk in post_ids.chunks(100) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let query = format!(
                "SELECT * FROM post_reactions WHERE post_id IN ({}) ORDER BY created_at ASC, id ASC",
                placeholders
            );

            let mut query_builder = sqlx::query_as::<_, PostReaction>(&query);
            for id in chunk {
                query_builder = query_builder.bind(id);
            }

            all_reactions.extend(query_builder.fetch_all(&self.pool).await?);
        }

        Ok(all_reactions)
    }

    async fn get_comments_for_posts(
        &self,
        post_ids: &[i64],
    ) -> Result<Vec<PostComment>, AppError> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut all_comments = Vec::new();
        for chunk in post_ids.chunks(100) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let query = format!(
                "SELECT * FROM post_comments WHERE post_id IN ({}) ORDER BY created_at ASC, id ASC",
                placeholders
            );

            let mut query_builder = sqlx::query_as::<_, PostComment>(&query);
            for id in chunk {
                query_builder = query_builder.bind(id);
            }

            all_comments.extend(query_builder.fetch_all(&self.pool).await?);
        }

        Ok(all_comments)
    }

    // =========================================================================
    // Reactions and comments
    // =========================================================================

    /// Set a user's reaction to a post, replacing any previous one.
    pub async fn set_reaction(
        &self,
        user_id: &str,
        post_id: i64,
        reaction_type: ReactionType,
    ) -> Result<PostReaction, AppError> {
        let reaction = sqlx::query_as::<_, PostReaction>(
            r#"
            INSERT INTO post_reactions (user_id, post_id, reaction_type, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, post_id) DO UPDATE SET
                reaction_type = excluded.reaction_type,
                created_at = excluded.created_at
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .bind(reaction_type.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(reaction)
    }

    pub async fn remove_reaction(&self, user_id: &str, post_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM post_reactions WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_reactions(&self, post_id: i64) -> Result<Vec<ReactionWithUser>, AppError> {
        let reactions = self.get_reactions_for_posts(&[post_id]).await?;

        let user_ids: Vec<String> = reactions.iter().map(|r| r.user_id.clone()).collect();
        let users: HashMap<String, User> = self
            .get_users_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let mut result = Vec::with_capacity(reactions.len());
        for reaction in reactions {
            if let Some(user) = users.get(&reaction.user_id) {
                result.push(ReactionWithUser {
                    user: user.clone(),
                    reaction,
                });
            }
        }

        Ok(result)
    }

    pub async fn add_comment(
        &self,
        user_id: &str,
        post_id: i64,
        content: &str,
    ) -> Result<PostComment, AppError> {
        let comment = sqlx::query_as::<_, PostComment>(
            r#"
            INSERT INTO post_comments (user_id, post_id, content, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .bind(content)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    pub async fn get_comments(&self, post_id: i64) -> Result<Vec<CommentWithUser>, AppError> {
        let comments = self.get_comments_for_posts(&[post_id]).await?;

        let user_ids: Vec<String> = comments.iter().map(|c| c.user_id.clone()).collect();
        let users: HashMap<String, User> = self
            .get_users_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let mut result = Vec::with_capacity(comments.len());
        for comment in comments {
            if let Some(user) = users.get(&comment.user_id) {
                result.push(CommentWithUser {
                    user: user.clone(),
                    comment,
                });
            }
        }

        Ok(result)
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    /// A user's pinned slots with games attached, ordered by position.
    pub async fn get_favorite_games(
        &self,
        user_id: &str,
    ) -> Result<Vec<FavoriteGameWithGame>, AppError> {
        let favorites = sqlx::query_as::<_, FavoriteGame>(
            "SELECT * FROM favorite_games WHERE user_id = ? ORDER BY position ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let game_ids: Vec<i64> = favorites.iter().map(|f| f.game_id).collect();
        let games: HashMap<i64, Game> = self
            .get_games_by_ids(&game_ids)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect();

        let mut result = Vec::with_capacity(favorites.len());
        for favorite in favorites {
            if let Some(game) = games.get(&favorite.game_id) {
                result.push(FavoriteGameWithGame {
                    game: game.clone(),
                    favorite,
                });
            }
        }

        Ok(result)
    }

    /// Pin a game into a slot, replacing whatever occupied it.
    pub async fn set_favorite_game(
        &self,
        user_id: &str,
        game_id: i64,
        position: i64,
    ) -> Result<FavoriteGame, AppError> {
        let favorite = sqlx::query_as::<_, FavoriteGame>(
            r#"
            INSERT INTO favorite_games (user_id, game_id, position, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, position) DO UPDATE SET
                game_id = excluded.game_id,
                created_at = excluded.created_at
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(game_id)
        .bind(position)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(favorite)
    }

    pub async fn remove_favorite_game(
        &self,
        user_id: &str,
        position: i64,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM favorite_games WHERE user_id = ? AND position = ?")
            .bind(user_id)
            .bind(position)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
