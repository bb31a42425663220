//! Data models
//!
//! Rust structs representing database entities and the view projections
//! the API serves. Timestamps use chrono; JSON-array columns are mapped
//! through `sqlx::types::Json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

// =============================================================================
// User
// =============================================================================

/// A registered user
///
/// The id is the opaque subject issued by the identity provider;
/// rows are created by upsert on first authentication.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub steam_username: Option<String>,
    pub epic_username: Option<String>,
    pub battlenet_username: Option<String>,
    pub psn_username: Option<String>,
    pub xbox_username: Option<String>,
    pub nintendo_username: Option<String>,
    pub ea_username: Option<String>,
    pub discord_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written on first authentication (upsert-by-id)
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertUser {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
}

/// Partial profile update; omitted fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfilePatch {
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

/// Library statistics aggregated per user
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub games_completed: i64,
    pub games_playing: i64,
    pub games_want_to_play: i64,
    pub total_hours_played: i64,
    pub average_rating: f64,
}

/// User plus aggregated library statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithStats {
    #[serde(flatten)]
    pub user: User,
    pub stats: UserStats,
}

// =============================================================================
// Game
// =============================================================================

/// A catalog entry
///
/// Created either directly or by materializing from the external catalog.
/// Identity (serial id) is immutable; metadata is mutable.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: i64,
    /// External catalog id (nullable, unique)
    pub igdb_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub screenshot_urls: Option<Json<Vec<String>>>,
    pub genre: Option<String>,
    pub platform: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub metacritic_score: Option<i64>,
    /// External catalog rating normalized to a 0-5 scale
    pub igdb_rating: Option<f64>,
    pub is_retro: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a game row
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGame {
    pub igdb_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub screenshot_urls: Option<Vec<String>>,
    pub genre: Option<String>,
    pub platform: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub metacritic_score: Option<i64>,
    pub igdb_rating: Option<f64>,
    #[serde(default)]
    pub is_retro: bool,
}

/// Game plus review statistics and the caller's library entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameWithUserData {
    #[serde(flatten)]
    pub game: Game,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_game: Option<LibraryEntry>,
    pub average_rating: f64,
    pub review_count: i64,
}

// =============================================================================
// Library
// =============================================================================

/// A user's per-game tracking record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    pub id: i64,
    pub user_id: String,
    pub game_id: i64,
    /// want_to_play, currently_playing, completed, dnf
    pub status: String,
    /// Completion percentage 0-100
    pub progress: i64,
    /// 1-5 stars
    pub rating: Option<f64>,
    pub hours_played: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Library entry tracking status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryStatus {
    WantToPlay,
    CurrentlyPlaying,
    Completed,
    Dnf,
}

impl LibraryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WantToPlay => "want_to_play",
            Self::CurrentlyPlaying => "currently_playing",
            Self::Completed => "completed",
            Self::Dnf => "dnf",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "want_to_play" => Some(Self::WantToPlay),
            "currently_playing" => Some(Self::CurrentlyPlaying),
            "completed" => Some(Self::Completed),
            "dnf" => Some(Self::Dnf),
            _ => None,
        }
    }
}

/// Fields for creating a library entry
#[derive(Debug, Clone)]
pub struct NewLibraryEntry {
    pub user_id: String,
    pub game_id: i64,
    pub status: LibraryStatus,
    pub progress: i64,
    pub rating: Option<f64>,
    pub hours_played: i64,
    pub started_at: Option<DateTime<Utc>>,
}

/// Partial library entry update; omitted fields are left unchanged.
///
/// A transition to `completed` stamps `completed_at` server-side
/// regardless of client-supplied fields.
#[derive(Debug, Clone, Default)]
pub struct LibraryEntryPatch {
    pub status: Option<LibraryStatus>,
    pub progress: Option<i64>,
    pub rating: Option<f64>,
    pub hours_played: Option<i64>,
}

/// Library entry joined with its game
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntryWithGame {
    #[serde(flatten)]
    pub entry: LibraryEntry,
    pub game: Game,
}

// =============================================================================
// Review
// =============================================================================

/// A user's review of a game
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: i64,
    pub user_id: String,
    pub game_id: i64,
    /// 1-5 stars
    pub rating: f64,
    pub title: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub spoilers: bool,
    /// Comma-separated tags
    pub recommended_for: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a review
#[derive(Debug, Clone)]
pub struct NewReview {
    pub user_id: String,
    pub game_id: i64,
    pub rating: f64,
    pub title: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub spoilers: bool,
    pub recommended_for: Option<String>,
}

/// Partial review update
#[derive(Debug, Clone, Default)]
pub struct ReviewPatch {
    pub rating: Option<f64>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub spoilers: Option<bool>,
    pub recommended_for: Option<String>,
}

/// Review joined with its author
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewWithUser {
    #[serde(flatten)]
    pub review: Review,
    pub user: User,
}

/// Review joined with its game
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewWithGame {
    #[serde(flatten)]
    pub review: Review,
    pub game: Game,
}

// =============================================================================
// Activity
// =============================================================================

/// An append-only feed log entry
///
/// Produced as a side-effect of other mutations; never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i64,
    pub user_id: String,
    pub game_id: Option<i64>,
    /// added, started, completed, rated, reviewed
    #[serde(rename = "type")]
    pub activity_type: String,
    pub metadata: Option<Json<serde_json::Value>>,
    pub created_at: DateTime<Utc>,
}

/// Activity types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityType {
    Added,
    Started,
    Completed,
    Rated,
    Reviewed,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Rated => "rated",
            Self::Reviewed => "reviewed",
        }
    }
}

/// Fields for appending an activity
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: String,
    pub game_id: Option<i64>,
    pub activity_type: ActivityType,
    pub metadata: Option<serde_json::Value>,
}

/// Activity joined with its user and (optionally) game for feed display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityWithDetails {
    #[serde(flatten)]
    pub activity: Activity,
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<Game>,
}

// =============================================================================
// Follows
// =============================================================================

/// Directed follower edge between two users
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub id: i64,
    pub follower_id: String,
    pub following_id: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Posts
// =============================================================================

/// A user post about a game, independent of reviews
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GamePost {
    pub id: i64,
    pub user_id: String,
    pub game_id: i64,
    pub content: String,
    pub image_urls: Option<Json<Vec<String>>>,
    /// text, image, screenshot, media
    pub post_type: String,
    pub created_at: DateTime<Utc>,
}

/// Post type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostType {
    Text,
    Image,
    Screenshot,
    Media,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Screenshot => "screenshot",
            Self::Media => "media",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "screenshot" => Some(Self::Screenshot),
            "media" => Some(Self::Media),
            _ => None,
        }
    }
}

/// Fields for creating a post
#[derive(Debug, Clone)]
pub struct NewGamePost {
    pub user_id: String,
    pub game_id: i64,
    pub content: String,
    pub image_urls: Vec<String>,
    pub post_type: PostType,
}

// =============================================================================
// Favorites
// =============================================================================

/// One of four pinned profile slots
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteGame {
    pub id: i64,
    pub user_id: String,
    pub game_id: i64,
    /// Slot position 1-4
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// Favorite slot joined with its game
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteGameWithGame {
    #[serde(flatten)]
    pub favorite: FavoriteGame,
    pub game: Game,
}

// =============================================================================
// Reactions and comments
// =============================================================================

/// A user's single reaction to a post (replace-on-change)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PostReaction {
    pub id: i64,
    pub user_id: String,
    pub post_id: i64,
    /// like, heart, laugh, sad, wow, angry
    pub reaction_type: String,
    pub created_at: DateTime<Utc>,
}

/// Reaction types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionType {
    Like,
    Heart,
    Laugh,
    Sad,
    Wow,
    Angry,
}

impl ReactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Heart => "heart",
            Self::Laugh => "laugh",
            Self::Sad => "sad",
            Self::Wow => "wow",
            Self::Angry => "angry",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(Self::Like),
            "heart" => Some(Self::Heart),
            "laugh" => Some(Self::Laugh),
            "sad" => Some(Self::Sad),
            "wow" => Some(Self::Wow),
            "angry" => Some(Self::Angry),
            _ => None,
        }
    }
}

/// A comment on a post
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PostComment {
    pub id: i64,
    pub user_id: String,
    pub post_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Reaction joined with its user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionWithUser {
    #[serde(flatten)]
    pub reaction: PostReaction,
    pub user: User,
}

/// Comment joined with its user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentWithUser {
    #[serde(flatten)]
    pub comment: PostComment,
    pub user: User,
}

/// Per-type reaction tallies for a post
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReactionCounts {
    pub like: i64,
    pub heart: i64,
    pub laugh: i64,
    pub sad: i64,
    pub wow: i64,
    pub angry: i64,
}

/// Post with everything the feed needs in one projection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostWithDetails {
    #[serde(flatten)]
    pub post: GamePost,
    pub user: User,
    pub game: Game,
    pub reactions: Vec<ReactionWithUser>,
    pub comments: Vec<CommentWithUser>,
    pub reaction_counts: ReactionCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_reaction: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_status_round_trip() {
        for status in [
            LibraryStatus::WantToPlay,
            LibraryStatus::CurrentlyPlaying,
            LibraryStatus::Completed,
            LibraryStatus::Dnf,
        ] {
            assert_eq!(LibraryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(LibraryStatus::parse("paused"), None);
    }

    #[test]
    fn reaction_type_rejects_unknown() {
        assert_eq!(ReactionType::parse("like"), Some(ReactionType::Like));
        assert_eq!(ReactionType::parse("thumbsdown"), None);
    }
}
