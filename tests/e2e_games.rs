//! E2E tests for the local game catalog and catalog import

mod common;

use common::{sample_catalog_game, TestServer};
use serde_json::Value;

#[tokio::test]
async fn test_create_game_requires_auth() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(&server.url("/api/games"))
        .json(&serde_json::json!({ "title": "Anonymous Game" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_create_and_get_game() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let token = server.auth_token("user-1");

    let response = server
        .client
        .post(&server.url("/api/games"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "title": "Chrono Voyage",
            "genre": "RPG",
            "platform": "PC",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["title"], "Chrono Voyage");
    let id = created["id"].as_i64().unwrap();

    let response = server
        .client
        .get(&server.url(&format!("/api/games/{}", id)))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched["title"], "Chrono Voyage");
    assert_eq!(fetched["reviewCount"], 0);
    // Anonymous callers get no library entry
    assert!(fetched["userGame"].is_null());
}

#[tokio::test]
async fn test_create_game_rejects_empty_title() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let token = server.auth_token("user-1");

    let response = server
        .client
        .post(&server.url("/api/games"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "title": "   " }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_get_unknown_game_returns_404() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/api/games/9999"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_search_local_games() {
    let server = TestServer::new().await;
    server.seed_game("Stellar Drift").await;
    server.seed_game("Dungeon Crawler").await;

    let response = server
        .client
        .get(&server.url("/api/games/search?q=stellar"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let results: Vec<Value> = response.json().await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["title"], "Stellar Drift");
}

#[tokio::test]
async fn test_search_external_catalog() {
    let server = TestServer::new().await;
    server.catalog.push_shelf(playshelf::catalog::CatalogSearchResult {
        id: 42,
        name: "Galaxy Quest".to_string(),
        cover_url: Some("//img/t_cover_big/co42.jpg".to_string()),
        first_release_date: Some(1_600_000_000),
        rating: Some(90.0),
    });

    let response = server
        .client
        .get(&server.url("/api/games/search-igdb?q=galaxy"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let results: Vec<Value> = response.json().await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], 42);
    assert_eq!(results[0]["name"], "Galaxy Quest");
}

#[tokio::test]
async fn test_import_from_catalog_is_idempotent() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let token = server.auth_token("user-1");
    server.catalog.insert_game(sample_catalog_game(42, "Galaxy Quest"));

    let response = server
        .client
        .post(&server.url("/api/games/from-igdb"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "igdbId": 42 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    let imported: Value = response.json().await.unwrap();
    assert_eq!(imported["title"], "Galaxy Quest");
    assert_eq!(imported["igdbId"], 42);
    // Only the first genre is kept; platforms are joined
    assert_eq!(imported["genre"], "Adventure");
    assert_eq!(imported["platform"], "PC, Switch");
    // Catalog 0-100 rating becomes a 0-5 scale
    assert_eq!(imported["igdbRating"].as_f64().unwrap(), 4.25);

    // Importing the same catalog id again returns the existing row
    let response = server
        .client
        .post(&server.url("/api/games/from-igdb"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "igdbId": 42 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let again: Value = response.json().await.unwrap();
    assert_eq!(again["id"], imported["id"]);
}

#[tokio::test]
async fn test_import_unknown_catalog_id_returns_404() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let token = server.auth_token("user-1");

    let response = server
        .client
        .post(&server.url("/api/games/from-igdb"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "igdbId": 777 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_retro_shelf_serves_local_games() {
    let server = TestServer::new().await;

    server
        .state
        .db
        .create_game(&playshelf::data::NewGame {
            title: "Pixel Knight".to_string(),
            is_retro: true,
            ..Default::default()
        })
        .await
        .unwrap();
    server.seed_game("Modern Title").await;

    let response = server
        .client
        .get(&server.url("/api/games/retro"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let results: Vec<Value> = response.json().await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["title"], "Pixel Knight");
}

#[tokio::test]
async fn test_trending_shelf_ranks_by_library_adds() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let token = server.auth_token("user-1");

    let quiet = server.seed_game("Quiet Game").await;
    let popular = server.seed_game("Popular Game").await;

    // One library add makes the second game rank first
    server
        .client
        .post(&server.url("/api/library"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "gameId": popular.id, "status": "want_to_play" }))
        .send()
        .await
        .unwrap();

    let response = server
        .client
        .get(&server.url("/api/games/trending"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let results: Vec<Value> = response.json().await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["id"], popular.id);
    assert_eq!(results[1]["id"], quiet.id);
}
