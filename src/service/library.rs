//! Library service
//!
//! Business flows around a user's game library. Every mutation that
//! also appends a feed activity runs inside one transaction, so a
//! library change and its activity are visible together or not at all.

use std::sync::Arc;

use chrono::Utc;

use crate::data::{
    ActivityType, Database, LibraryEntry, LibraryEntryPatch, LibraryEntryWithGame, LibraryStatus,
    NewActivity, NewLibraryEntry,
};
use crate::error::AppError;

/// Library service
pub struct LibraryService {
    db: Arc<Database>,
}

impl LibraryService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn get_library(
        &self,
        user_id: &str,
        status: Option<LibraryStatus>,
    ) -> Result<Vec<LibraryEntryWithGame>, AppError> {
        self.db.get_library(user_id, status).await
    }

    /// Add a game to the user's library and log an `added` activity.
    ///
    /// # Errors
    /// `NotFound` if the game does not exist, `Conflict` if the game is
    /// already in the library.
    pub async fn add_game(&self, new: &NewLibraryEntry) -> Result<LibraryEntry, AppError> {
        self.db
            .get_game(new.game_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut tx = self.db.begin().await?;

        let mut new = new.clone();
        if new.status == LibraryStatus::CurrentlyPlaying && new.started_at.is_none() {
            new.started_at = Some(Utc::now());
        }
        let entry = self.db.insert_library_entry(&mut *tx, &new).await?;

        self.db
            .insert_activity(
                &mut *tx,
                &NewActivity {
                    user_id: entry.user_id.clone(),
                    game_id: Some(entry.game_id),
                    activity_type: ActivityType::Added,
                    metadata: Some(serde_json::json!({ "status": entry.status })),
                },
            )
            .await?;

        tx.commit().await?;
        tracing::debug!(user_id = %entry.user_id, game_id = entry.game_id, "Game added to library");

        Ok(entry)
    }

    /// Apply a partial update to a library entry and log the matching
    /// activities.
    ///
    /// Side effects: an update that sets `completed` stamps `completed_at`
    /// and logs `completed` every time, even when the entry was already
    /// completed; entering `currently_playing` stamps `started_at` and logs
    /// `started`; a rating change on its own logs `rated`.
    pub async fn update_entry(
        &self,
        user_id: &str,
        entry_id: i64,
        patch: &LibraryEntryPatch,
    ) -> Result<LibraryEntry, AppError> {
        let existing = self
            .db
            .get_library_entry(entry_id)
            .await?
            .filter(|entry| entry.user_id == user_id)
            .ok_or(AppError::NotFound)?;

        let old_status = LibraryStatus::parse(&existing.status);
        let status = patch.status.or(old_status).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "library entry {} has unknown status {}",
                existing.id,
                existing.status
            ))
        })?;
        let progress = patch.progress.unwrap_or(existing.progress);
        let rating = patch.rating.or(existing.rating);
        let hours_played = patch.hours_played.unwrap_or(existing.hours_played);

        let now = Utc::now();
        // Fires on every update that sets completed, not just the first.
        let marked_completed = patch.status == Some(LibraryStatus::Completed);
        let entered_playing = status == LibraryStatus::CurrentlyPlaying
            && old_status != Some(LibraryStatus::CurrentlyPlaying);

        let started_at = match (existing.started_at, entered_playing) {
            (None, true) => Some(now),
            (existing, _) => existing,
        };
        let completed_at = if marked_completed {
            Some(now)
        } else {
            existing.completed_at
        };

        let mut tx = self.db.begin().await?;

        let entry = self
            .db
            .update_library_entry(
                &mut *tx,
                entry_id,
                user_id,
                status,
                progress,
                rating,
                hours_played,
                started_at,
                completed_at,
            )
            .await?;

        if marked_completed {
            self.db
                .insert_activity(
                    &mut *tx,
                    &NewActivity {
                        user_id: user_id.to_string(),
                        game_id: Some(entry.game_id),
                        activity_type: ActivityType::Completed,
                        metadata: Some(serde_json::json!({ "rating": patch.rating })),
                    },
                )
                .await?;
        } else if entered_playing {
            self.db
                .insert_activity(
                    &mut *tx,
                    &NewActivity {
                        user_id: user_id.to_string(),
                        game_id: Some(entry.game_id),
                        activity_type: ActivityType::Started,
                        metadata: None,
                    },
                )
                .await?;
        } else if let Some(rating) = patch.rating {
            self.db
                .insert_activity(
                    &mut *tx,
                    &NewActivity {
                        user_id: user_id.to_string(),
                        game_id: Some(entry.game_id),
                        activity_type: ActivityType::Rated,
                        metadata: Some(serde_json::json!({ "rating": rating })),
                    },
                )
                .await?;
        }

        tx.commit().await?;

        Ok(entry)
    }

    /// Remove a game from the user's library.
    pub async fn remove_game(&self, user_id: &str, game_id: i64) -> Result<(), AppError> {
        if !self.db.remove_library_entry(user_id, game_id).await? {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NewGame;
    use tempfile::TempDir;

    async fn setup() -> (LibraryService, Arc<Database>, TempDir, i64) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            Database::connect(&temp_dir.path().join("test.db"))
                .await
                .unwrap(),
        );
        db.upsert_user(&crate::data::UpsertUser {
            id: "user-1".to_string(),
            email: None,
            first_name: None,
            last_name: None,
            profile_image_url: None,
        })
        .await
        .unwrap();
        let game = db
            .create_game(&NewGame {
                title: "Game One".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        (LibraryService::new(db.clone()), db, temp_dir, game.id)
    }

    fn new_entry(game_id: i64, status: LibraryStatus) -> NewLibraryEntry {
        NewLibraryEntry {
            user_id: "user-1".to_string(),
            game_id,
            status,
            progress: 0,
            rating: None,
            hours_played: 0,
            started_at: None,
        }
    }

    #[tokio::test]
    async fn add_logs_added_activity() {
        let (service, db, _tmp, game_id) = setup().await;

        service
            .add_game(&new_entry(game_id, LibraryStatus::WantToPlay))
            .await
            .unwrap();

        let feed = db.get_user_activities("user-1", 10).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].activity.activity_type, "added");
        assert_eq!(
            feed[0].activity.metadata.as_ref().unwrap().0["status"],
            "want_to_play"
        );
    }

    #[tokio::test]
    async fn add_unknown_game_is_not_found() {
        let (service, db, _tmp, _game_id) = setup().await;

        let err = service
            .add_game(&new_entry(9999, LibraryStatus::WantToPlay))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));

        // The failed add must not leak an activity.
        assert!(db.get_user_activities("user-1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn completing_stamps_timestamp_and_logs() {
        let (service, db, _tmp, game_id) = setup().await;

        let entry = service
            .add_game(&new_entry(game_id, LibraryStatus::CurrentlyPlaying))
            .await
            .unwrap();
        assert!(entry.started_at.is_some());

        let updated = service
            .update_entry(
                "user-1",
                entry.id,
                &LibraryEntryPatch {
                    status: Some(LibraryStatus::Completed),
                    rating: Some(4.5),
                    progress: Some(100),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.completed_at.is_some());
        assert_eq!(updated.rating, Some(4.5));

        let feed = db.get_user_activities("user-1", 10).await.unwrap();
        assert_eq!(feed[0].activity.activity_type, "completed");
    }

    #[tokio::test]
    async fn repeated_completed_update_logs_again() {
        let (service, db, _tmp, game_id) = setup().await;

        let entry = service
            .add_game(&new_entry(game_id, LibraryStatus::CurrentlyPlaying))
            .await
            .unwrap();

        let first = service
            .update_entry(
                "user-1",
                entry.id,
                &LibraryEntryPatch {
                    status: Some(LibraryStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let second = service
            .update_entry(
                "user-1",
                entry.id,
                &LibraryEntryPatch {
                    status: Some(LibraryStatus::Completed),
                    rating: Some(5.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Every completed update re-stamps and logs, even back to back.
        assert!(second.completed_at >= first.completed_at);
        let feed = db.get_user_activities("user-1", 10).await.unwrap();
        let completed = feed
            .iter()
            .filter(|a| a.activity.activity_type == "completed")
            .count();
        assert_eq!(completed, 2);
    }

    #[tokio::test]
    async fn rating_alone_logs_rated() {
        let (service, db, _tmp, game_id) = setup().await;

        let entry = service
            .add_game(&new_entry(game_id, LibraryStatus::Completed))
            .await
            .unwrap();

        service
            .update_entry(
                "user-1",
                entry.id,
                &LibraryEntryPatch {
                    rating: Some(3.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let feed = db.get_user_activities("user-1", 10).await.unwrap();
        assert_eq!(feed[0].activity.activity_type, "rated");
    }

    #[tokio::test]
    async fn starting_logs_started_once() {
        let (service, db, _tmp, game_id) = setup().await;

        let entry = service
            .add_game(&new_entry(game_id, LibraryStatus::WantToPlay))
            .await
            .unwrap();

        let updated = service
            .update_entry(
                "user-1",
                entry.id,
                &LibraryEntryPatch {
                    status: Some(LibraryStatus::CurrentlyPlaying),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let first_started_at = updated.started_at;
        assert!(first_started_at.is_some());

        // Going back and forth does not reset the original start stamp.
        service
            .update_entry(
                "user-1",
                entry.id,
                &LibraryEntryPatch {
                    status: Some(LibraryStatus::WantToPlay),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let again = service
            .update_entry(
                "user-1",
                entry.id,
                &LibraryEntryPatch {
                    status: Some(LibraryStatus::CurrentlyPlaying),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(again.started_at, first_started_at);

        let feed = db.get_user_activities("user-1", 10).await.unwrap();
        let started = feed
            .iter()
            .filter(|a| a.activity.activity_type == "started")
            .count();
        assert_eq!(started, 2);
    }

    #[tokio::test]
    async fn update_rejects_other_users_entry() {
        let (service, _db, _tmp, game_id) = setup().await;

        let entry = service
            .add_game(&new_entry(game_id, LibraryStatus::WantToPlay))
            .await
            .unwrap();

        let err = service
            .update_entry("someone-else", entry.id, &LibraryEntryPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }
}
