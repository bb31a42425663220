//! External game catalog client (IGDB)
//!
//! Queries are written in IGDB's Apicalypse syntax and POSTed to the
//! v4 API. Authentication uses a Twitch client-credentials token cached
//! in [`TokenCache`].

use axum::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::token::{FreshToken, TokenCache};
use crate::config::CatalogConfig;
use crate::error::AppError;
use crate::metrics::{
    CATALOG_REQUESTS_TOTAL, CATALOG_REQUEST_DURATION_SECONDS, CATALOG_TOKEN_REFRESHES_TOTAL,
};

/// A lightweight hit from catalog browse and search queries.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSearchResult {
    pub id: i64,
    pub name: String,
    pub cover_url: Option<String>,
    /// Unix seconds
    pub first_release_date: Option<i64>,
    /// Raw catalog rating on a 0-100 scale
    pub rating: Option<f64>,
}

/// Full catalog metadata for a single game.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogGame {
    pub id: i64,
    pub name: String,
    pub summary: Option<String>,
    pub cover_url: Option<String>,
    pub screenshot_urls: Vec<String>,
    pub genres: Vec<String>,
    pub platforms: Vec<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    /// Unix seconds
    pub first_release_date: Option<i64>,
    /// Raw catalog rating on a 0-100 scale
    pub rating: Option<f64>,
    pub rating_count: Option<i64>,
    pub aggregated_rating: Option<f64>,
    pub aggregated_rating_count: Option<i64>,
}

/// Capability seam over the external catalog.
///
/// Handlers and services depend on this trait, never on the concrete
/// HTTP client, so tests can substitute a scripted catalog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn search_games(&self, query: &str, limit: i64)
        -> Result<Vec<CatalogSearchResult>, AppError>;

    async fn game_details(&self, catalog_id: i64) -> Result<Option<CatalogGame>, AppError>;

    async fn trending_games(&self, limit: i64) -> Result<Vec<CatalogSearchResult>, AppError>;

    async fn top_rated_games(&self, limit: i64) -> Result<Vec<CatalogSearchResult>, AppError>;

    async fn new_releases(&self, limit: i64) -> Result<Vec<CatalogSearchResult>, AppError>;

    async fn games_by_genre(
        &self,
        genre: &str,
        limit: i64,
    ) -> Result<Vec<CatalogSearchResult>, AppError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawCompanyRef {
    company: RawNamed,
    #[serde(default)]
    developer: bool,
    #[serde(default)]
    publisher: bool,
}

#[derive(Debug, Deserialize)]
struct RawGame {
    id: i64,
    name: String,
    summary: Option<String>,
    cover: Option<RawImage>,
    #[serde(default)]
    screenshots: Vec<RawImage>,
    #[serde(default)]
    genres: Vec<RawNamed>,
    #[serde(default)]
    platforms: Vec<RawNamed>,
    #[serde(default)]
    involved_companies: Vec<RawCompanyRef>,
    first_release_date: Option<i64>,
    rating: Option<f64>,
    rating_count: Option<i64>,
    aggregated_rating: Option<f64>,
    aggregated_rating_count: Option<i64>,
}

/// Rewrite a thumbnail URL to the requested image size.
///
/// The catalog returns every image as a `t_thumb` variant; other sizes
/// are addressed by swapping the size tag in the path.
fn format_image_url(url: &str, size: &str) -> String {
    url.replace("t_thumb", &format!("t_{}", size))
}

fn search_result_from_raw(game: RawGame) -> CatalogSearchResult {
    CatalogSearchResult {
        id: game.id,
        name: game.name,
        cover_url: game
            .cover
            .and_then(|c| c.url)
            .map(|url| format_image_url(&url, "cover_big")),
        first_release_date: game.first_release_date,
        rating: game.rating,
    }
}

/// IGDB-backed catalog client.
pub struct IgdbClient {
    http_client: reqwest::Client,
    config: CatalogConfig,
    token: TokenCache,
}

impl IgdbClient {
    pub fn new(config: CatalogConfig, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            config,
            token: TokenCache::new(),
        }
    }

    /// Fetch the cached bearer token, minting a new one when needed.
    async fn access_token(&self) -> Result<String, AppError> {
        self.token
            .get_or_refresh(|| async {
                let response = self
                    .http_client
                    .post(&self.config.token_url)
                    .form(&[
                        ("client_id", self.config.client_id.as_str()),
                        ("client_secret", self.config.client_secret.as_str()),
                        ("grant_type", "client_credentials"),
                    ])
                    .send()
                    .await?;

                if !response.status().is_success() {
                    CATALOG_TOKEN_REFRESHES_TOTAL
                        .with_label_values(&["error"])
                        .inc();
                    return Err(AppError::Catalog(format!(
                        "token endpoint returned status {}",
                        response.status()
                    )));
                }

                let token: TokenResponse = response.json().await?;
                CATALOG_TOKEN_REFRESHES_TOTAL
                    .with_label_values(&["success"])
                    .inc();
                tracing::debug!("Refreshed catalog access token");

                Ok(FreshToken {
                    access_token: token.access_token,
                    expires_in: token.expires_in,
                })
            })
            .await
    }

    /// POST an Apicalypse query to a catalog endpoint.
    async fn request(&self, endpoint: &str, body: String) -> Result<Vec<RawGame>, AppError> {
        let token = self.access_token().await?;
        let started = Instant::now();

        let response = self
            .http_client
            .post(format!("{}/{}", self.config.api_url, endpoint))
            .header("Client-ID", &self.config.client_id)
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await;

        CATALOG_REQUEST_DURATION_SECONDS
            .with_label_values(&[endpoint])
            .observe(started.elapsed().as_secs_f64());

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                CATALOG_REQUESTS_TOTAL
                    .with_label_values(&[endpoint, "error"])
                    .inc();
                return Err(error.into());
            }
        };

        if !response.status().is_success() {
            CATALOG_REQUESTS_TOTAL
                .with_label_values(&[endpoint, "error"])
                .inc();
            return Err(AppError::Catalog(format!(
                "catalog request to {} returned status {}",
                endpoint,
                response.status()
            )));
        }

        CATALOG_REQUESTS_TOTAL
            .with_label_values(&[endpoint, "success"])
            .inc();
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CatalogProvider for IgdbClient {
    async fn search_games(
        &self,
        query: &str,
        limit: i64,
    ) -> Result<Vec<CatalogSearchResult>, AppError> {
        // Quotes would escape the Apicalypse string literal.
        let query = query.replace('"', "");
        let body = format!(
            r#"search "{}"; fields name, cover.url, first_release_date, rating; where rating_count > 5 & category = 0; limit {};"#,
            query, limit
        );

        let results = self.request("games", body).await?;
        Ok(results.into_iter().map(search_result_from_raw).collect())
    }

    async fn game_details(&self, catalog_id: i64) -> Result<Option<CatalogGame>, AppError> {
        let body = format!(
            "fields name, summary, cover.url, screenshots.url, genres.name, platforms.name, \
             involved_companies.company.name, involved_companies.developer, \
             involved_companies.publisher, first_release_date, rating, rating_count, \
             aggregated_rating, aggregated_rating_count; where id = {};",
            catalog_id
        );

        let mut results = self.request("games", body).await?;
        if results.is_empty() {
            return Ok(None);
        }
        let game = results.remove(0);

        let developer = game
            .involved_companies
            .iter()
            .find(|c| c.developer)
            .map(|c| c.company.name.clone());
        let publisher = game
            .involved_companies
            .iter()
            .find(|c| c.publisher)
            .map(|c| c.company.name.clone());

        Ok(Some(CatalogGame {
            id: game.id,
            name: game.name,
            summary: game.summary,
            cover_url: game
                .cover
                .and_then(|c| c.url)
                .map(|url| format_image_url(&url, "cover_big")),
            screenshot_urls: game
                .screenshots
                .into_iter()
                .filter_map(|s| s.url)
                .map(|url| format_image_url(&url, "screenshot_big"))
                .collect(),
            genres: game.genres.into_iter().map(|g| g.name).collect(),
            platforms: game.platforms.into_iter().map(|p| p.name).collect(),
            developer,
            publisher,
            first_release_date: game.first_release_date,
            rating: game.rating,
            rating_count: game.rating_count,
            aggregated_rating: game.aggregated_rating,
            aggregated_rating_count: game.aggregated_rating_count,
        }))
    }

    async fn trending_games(&self, limit: i64) -> Result<Vec<CatalogSearchResult>, AppError> {
        let body = format!(
            "fields name, cover.url, first_release_date, rating, rating_count; \
             where rating_count > 50 & rating > 70 & category = 0; \
             sort rating_count desc; limit {};",
            limit
        );

        let results = self.request("games", body).await?;
        Ok(results.into_iter().map(search_result_from_raw).collect())
    }

    async fn top_rated_games(&self, limit: i64) -> Result<Vec<CatalogSearchResult>, AppError> {
        let body = format!(
            "fields name, cover.url, first_release_date, rating, rating_count; \
             where rating > 80 & rating_count > 100 & category = 0; \
             sort rating desc; limit {};",
            limit
        );

        let results = self.request("games", body).await?;
        Ok(results.into_iter().map(search_result_from_raw).collect())
    }

    async fn new_releases(&self, limit: i64) -> Result<Vec<CatalogSearchResult>, AppError> {
        let one_year_ago = chrono::Utc::now().timestamp() - 365 * 24 * 60 * 60;
        let body = format!(
            "fields name, cover.url, first_release_date, rating; \
             where first_release_date > {} & rating_count > 10 & category = 0; \
             sort first_release_date desc; limit {};",
            one_year_ago, limit
        );

        let results = self.request("games", body).await?;
        Ok(results.into_iter().map(search_result_from_raw).collect())
    }

    async fn games_by_genre(
        &self,
        genre: &str,
        limit: i64,
    ) -> Result<Vec<CatalogSearchResult>, AppError> {
        let genre = genre.replace('"', "");
        let body = format!(
            r#"fields name, cover.url, first_release_date, rating; where genres.name = "{}" & rating_count > 10 & category = 0; sort rating desc; limit {};"#,
            genre, limit
        );

        let results = self.request("games", body).await?;
        Ok(results.into_iter().map(search_result_from_raw).collect())
    }
}
