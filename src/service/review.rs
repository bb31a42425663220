//! Review service
//!
//! Review creation logs a `reviewed` activity in the same transaction.

use std::sync::Arc;

use crate::data::{
    ActivityType, Database, NewActivity, NewReview, Review, ReviewPatch, ReviewWithGame,
    ReviewWithUser,
};
use crate::error::AppError;

pub struct ReviewService {
    db: Arc<Database>,
}

impl ReviewService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a review and log a `reviewed` activity.
    ///
    /// # Errors
    /// `NotFound` if the game does not exist.
    pub async fn create_review(&self, new: &NewReview) -> Result<Review, AppError> {
        self.db
            .get_game(new.game_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut tx = self.db.begin().await?;

        let review = self.db.insert_review(&mut *tx, new).await?;
        self.db
            .insert_activity(
                &mut *tx,
                &NewActivity {
                    user_id: review.user_id.clone(),
                    game_id: Some(review.game_id),
                    activity_type: ActivityType::Reviewed,
                    metadata: Some(serde_json::json!({ "rating": review.rating })),
                },
            )
            .await?;

        tx.commit().await?;

        Ok(review)
    }

    pub async fn get_reviews_for_game(
        &self,
        game_id: i64,
    ) -> Result<Vec<ReviewWithUser>, AppError> {
        self.db.get_reviews_for_game(game_id).await
    }

    pub async fn get_reviews_by_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ReviewWithGame>, AppError> {
        self.db.get_reviews_by_user(user_id).await
    }

    pub async fn update_review(
        &self,
        id: i64,
        user_id: &str,
        patch: &ReviewPatch,
    ) -> Result<Review, AppError> {
        self.db.update_review(id, user_id, patch).await
    }

    pub async fn delete_review(&self, id: i64, user_id: &str) -> Result<(), AppError> {
        if !self.db.delete_review(id, user_id).await? {
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

    async fn setup() -> (ReviewService, Arc<Database>, TempDir, i64) {
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
        (ReviewService::new(db.clone()), db, temp_dir, game.id)
    }

    #[tokio::test]
    async fn create_logs_reviewed_activity() {
        let (service, db, _tmp, game_id) = setup().await;

        let review = service
            .create_review(&NewReview {
                user_id: "user-1".to_string(),
                game_id,
                rating: 4.0,
                title: Some("Solid".to_string()),
                content: Some("Worth playing".to_string()),
                image_url: None,
                spoilers: false,
                recommended_for: Some("RPG fans".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(review.rating, 4.0);

        let feed = db.get_user_activities("user-1", 10).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].activity.activity_type, "reviewed");
        assert_eq!(feed[0].activity.metadata.as_ref().unwrap().0["rating"], 4.0);
    }

    #[tokio::test]
    async fn create_for_unknown_game_is_not_found() {
        let (service, db, _tmp, _game_id) = setup().await;

        let err = service
            .create_review(&NewReview {
                user_id: "user-1".to_string(),
                game_id: 9999,
                rating: 4.0,
                title: None,
                content: None,
                image_url: None,
                spoilers: false,
                recommended_for: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
        assert!(db.get_user_activities("user-1", 10).await.unwrap().is_empty());
    }
}
