//! Common test utilities for E2E tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use playshelf::catalog::{CatalogGame, CatalogProvider, CatalogSearchResult};
use playshelf::error::AppError;
use playshelf::{AppState, config, data};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Scripted catalog used instead of the real IGDB client.
///
/// Tests preload games and shelf entries; every browse endpoint serves
/// from the same shelf list.
#[derive(Default)]
pub struct StubCatalog {
    pub games: Mutex<HashMap<i64, CatalogGame>>,
    pub shelf: Mutex<Vec<CatalogSearchResult>>,
}

impl StubCatalog {
    pub fn insert_game(&self, game: CatalogGame) {
        self.games.lock().unwrap().insert(game.id, game);
    }

    pub fn push_shelf(&self, result: CatalogSearchResult) {
        self.shelf.lock().unwrap().push(result);
    }
}

#[axum::async_trait]
impl CatalogProvider for StubCatalog {
    async fn search_games(
        &self,
        query: &str,
        limit: i64,
    ) -> Result<Vec<CatalogSearchResult>, AppError> {
        let query = query.to_lowercase();
        Ok(self
            .shelf
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.name.to_lowercase().contains(&query))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn game_details(&self, catalog_id: i64) -> Result<Option<CatalogGame>, AppError> {
        Ok(self.games.lock().unwrap().get(&catalog_id).cloned())
    }

    async fn trending_games(&self, limit: i64) -> Result<Vec<CatalogSearchResult>, AppError> {
        Ok(self
            .shelf
            .lock()
            .unwrap()
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn top_rated_games(&self, limit: i64) -> Result<Vec<CatalogSearchResult>, AppError> {
        self.trending_games(limit).await
    }

    async fn new_releases(&self, limit: i64) -> Result<Vec<CatalogSearchResult>, AppError> {
        self.trending_games(limit).await
    }

    async fn games_by_genre(
        &self,
        _genre: &str,
        limit: i64,
    ) -> Result<Vec<CatalogSearchResult>, AppError> {
        self.trending_games(limit).await
    }
}

/// Build a full catalog game for stub preloading.
pub fn sample_catalog_game(id: i64, name: &str) -> CatalogGame {
    CatalogGame {
        id,
        name: name.to_string(),
        summary: Some(format!("{} summary", name)),
        cover_url: Some(format!("//img/t_cover_big/co{}.jpg", id)),
        screenshot_urls: vec![format!("//img/t_screenshot_big/sc{}.jpg", id)],
        genres: vec!["Adventure".to_string(), "RPG".to_string()],
        platforms: vec!["PC".to_string(), "Switch".to_string()],
        developer: Some("Example Studio".to_string()),
        publisher: Some("Example Publishing".to_string()),
        first_release_date: Some(1_600_000_000),
        rating: Some(85.0),
        rating_count: Some(250),
        aggregated_rating: Some(82.0),
        aggregated_rating_count: Some(12),
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub catalog: Arc<StubCatalog>,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Register metrics (idempotent across test servers)
        playshelf::metrics::init_metrics();

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "localhost".to_string(),
                protocol: "http".to_string(),
            },
            database: config::DatabaseConfig {
                path: db_path.clone(),
            },
            auth: config::AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
                session_max_age: 604800,
                provider: config::IdentityProviderConfig {
                    client_id: "test-client-id".to_string(),
                    client_secret: "test-client-secret".to_string(),
                    authorize_url: "https://id.test.example.com/authorize".to_string(),
                    token_url: "https://id.test.example.com/token".to_string(),
                    userinfo_url: "https://id.test.example.com/userinfo".to_string(),
                },
            },
            catalog: config::CatalogConfig {
                client_id: "catalog-client-id".to_string(),
                client_secret: "catalog-client-secret".to_string(),
                token_url: "https://id.test.example.com/oauth2/token".to_string(),
                api_url: "https://catalog.test.example.com/v4".to_string(),
            },
            media: config::MediaConfig {
                max_upload_bytes: 1024 * 1024,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Build state by hand so the catalog is the scripted stub
        let db = data::Database::connect(&db_path).await.unwrap();
        let catalog = Arc::new(StubCatalog::default());
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        let state = AppState {
            config: Arc::new(config),
            db: Arc::new(db),
            catalog: catalog.clone(),
            http_client: Arc::new(http_client.clone()),
        };

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router
        let app = playshelf::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            catalog,
            _temp_dir: temp_dir,
            client: http_client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create a test user with a username set
    pub async fn create_test_user(&self, id: &str, username: &str) -> data::User {
        self.state
            .db
            .upsert_user(&data::UpsertUser {
                id: id.to_string(),
                email: Some(format!("{}@test.example.com", username)),
                first_name: Some("Test".to_string()),
                last_name: Some("User".to_string()),
                profile_image_url: None,
            })
            .await
            .unwrap();

        self.state
            .db
            .update_user_profile(
                id,
                &data::UserProfilePatch {
                    username: Some(username.to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    /// Create a signed session token for a user
    pub fn auth_token(&self, user_id: &str) -> String {
        use playshelf::auth::{Session, create_session_token};

        let session = Session::new(user_id.to_string(), self.state.config.auth.session_max_age);
        create_session_token(&session, &self.state.config.auth.session_secret)
            .expect("Failed to create test token")
    }

    /// Seed a game directly into the local catalog
    pub async fn seed_game(&self, title: &str) -> data::Game {
        self.state
            .db
            .create_game(&data::NewGame {
                title: title.to_string(),
                genre: Some("Adventure".to_string()),
                platform: Some("PC".to_string()),
                ..Default::default()
            })
            .await
            .unwrap()
    }
}
