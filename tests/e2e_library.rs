//! E2E tests for library management and activity side-effects

mod common;

use common::TestServer;
use serde_json::Value;

#[tokio::test]
async fn test_library_requires_auth() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/api/library"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_add_game_to_library_logs_activity() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let token = server.auth_token("user-1");
    let game = server.seed_game("Chrono Voyage").await;

    let response = server
        .client
        .post(&server.url("/api/library"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "gameId": game.id,
            "status": "want_to_play",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    let entry: Value = response.json().await.unwrap();
    assert_eq!(entry["status"], "want_to_play");
    assert_eq!(entry["progress"], 0);

    // The add is visible in the caller's activity feed
    let response = server
        .client
        .get(&server.url("/api/activities"))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let feed: Vec<Value> = response.json().await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["type"], "added");
    assert_eq!(feed[0]["game"]["title"], "Chrono Voyage");
}

#[tokio::test]
async fn test_add_duplicate_game_returns_409() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let token = server.auth_token("user-1");
    let game = server.seed_game("Chrono Voyage").await;

    let body = serde_json::json!({ "gameId": game.id, "status": "want_to_play" });

    let first = server
        .client
        .post(&server.url("/api/library"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 201);

    let second = server
        .client
        .post(&server.url("/api/library"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 409);
}

#[tokio::test]
async fn test_add_unknown_game_returns_404() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let token = server.auth_token("user-1");

    let response = server
        .client
        .post(&server.url("/api/library"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "gameId": 9999, "status": "want_to_play" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_add_rejects_invalid_status() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let token = server.auth_token("user-1");
    let game = server.seed_game("Chrono Voyage").await;

    let response = server
        .client
        .post(&server.url("/api/library"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "gameId": game.id, "status": "abandoned" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_completing_game_stamps_completed_at() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let token = server.auth_token("user-1");
    let game = server.seed_game("Chrono Voyage").await;

    let response = server
        .client
        .post(&server.url("/api/library"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "gameId": game.id, "status": "currently_playing" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let entry: Value = response.json().await.unwrap();
    let entry_id = entry["id"].as_i64().unwrap();
    // Starting a game stamps started_at
    assert!(!entry["startedAt"].is_null());
    assert!(entry["completedAt"].is_null());

    let response = server
        .client
        .patch(&server.url(&format!("/api/library/{}", entry_id)))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "status": "completed", "rating": 4.5 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["status"], "completed");
    assert!(!updated["completedAt"].is_null());
    assert_eq!(updated["rating"].as_f64().unwrap(), 4.5);

    // Both the add and the completion appear in the feed, newest first
    let response = server
        .client
        .get(&server.url("/api/activities"))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    let feed: Vec<Value> = response.json().await.unwrap();
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0]["type"], "completed");
    assert_eq!(feed[1]["type"], "added");
}

#[tokio::test]
async fn test_cannot_update_another_users_entry() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    server.create_test_user("user-2", "bob").await;
    let alice = server.auth_token("user-1");
    let bob = server.auth_token("user-2");
    let game = server.seed_game("Chrono Voyage").await;

    let response = server
        .client
        .post(&server.url("/api/library"))
        .header("Authorization", format!("Bearer {}", alice))
        .json(&serde_json::json!({ "gameId": game.id, "status": "want_to_play" }))
        .send()
        .await
        .unwrap();
    let entry: Value = response.json().await.unwrap();
    let entry_id = entry["id"].as_i64().unwrap();

    let response = server
        .client
        .patch(&server.url(&format!("/api/library/{}", entry_id)))
        .header("Authorization", format!("Bearer {}", bob))
        .json(&serde_json::json!({ "progress": 50 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_remove_game_from_library() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let token = server.auth_token("user-1");
    let game = server.seed_game("Chrono Voyage").await;

    server
        .client
        .post(&server.url("/api/library"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "gameId": game.id, "status": "want_to_play" }))
        .send()
        .await
        .unwrap();

    // DELETE addresses the game id
    let response = server
        .client
        .delete(&server.url(&format!("/api/library/{}", game.id)))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = server
        .client
        .get(&server.url("/api/library"))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    let entries: Vec<Value> = response.json().await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_library_status_filter() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let token = server.auth_token("user-1");
    let first = server.seed_game("First Game").await;
    let second = server.seed_game("Second Game").await;

    for (game_id, status) in [(first.id, "want_to_play"), (second.id, "completed")] {
        server
            .client
            .post(&server.url("/api/library"))
            .header("Authorization", format!("Bearer {}", token))
            .json(&serde_json::json!({ "gameId": game_id, "status": status }))
            .send()
            .await
            .unwrap();
    }

    let response = server
        .client
        .get(&server.url("/api/library?status=completed"))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let entries: Vec<Value> = response.json().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["game"]["title"], "Second Game");
}
