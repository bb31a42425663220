//! E2E tests for profiles, follows, the following feed, and favorites

mod common;

use common::TestServer;
use serde_json::Value;

#[tokio::test]
async fn test_current_user_with_stats() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let token = server.auth_token("user-1");

    let response = server
        .client
        .get(&server.url("/api/auth/user"))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let user: Value = response.json().await.unwrap();
    assert_eq!(user["username"], "alice");
    assert_eq!(user["stats"]["gamesCompleted"], 0);
    assert_eq!(user["stats"]["totalHoursPlayed"], 0);
}

#[tokio::test]
async fn test_update_profile() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let token = server.auth_token("user-1");

    let response = server
        .client
        .patch(&server.url("/api/users/profile"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "bio": "Collector of long RPGs",
            "steamUsername": "alice_plays",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let user: Value = response.json().await.unwrap();
    assert_eq!(user["bio"], "Collector of long RPGs");
    assert_eq!(user["steamUsername"], "alice_plays");
    // Untouched fields survive the patch
    assert_eq!(user["username"], "alice");
}

#[tokio::test]
async fn test_username_conflict_returns_409() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    server.create_test_user("user-2", "bob").await;
    let bob = server.auth_token("user-2");

    let response = server
        .client
        .patch(&server.url("/api/users/profile"))
        .header("Authorization", format!("Bearer {}", bob))
        .json(&serde_json::json!({ "username": "alice" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn test_search_users() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    server.create_test_user("user-2", "alfred").await;
    server.create_test_user("user-3", "bob").await;

    let response = server
        .client
        .get(&server.url("/api/users/search?q=al"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let users: Vec<Value> = response.json().await.unwrap();
    assert_eq!(users.len(), 2);

    // An empty query returns nothing rather than everyone
    let response = server
        .client
        .get(&server.url("/api/users/search?q="))
        .send()
        .await
        .unwrap();
    let users: Vec<Value> = response.json().await.unwrap();
    assert!(users.is_empty());
}

#[tokio::test]
async fn test_follow_and_unfollow() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    server.create_test_user("user-2", "bob").await;
    let alice = server.auth_token("user-1");

    let response = server
        .client
        .post(&server.url("/api/users/user-2/follow"))
        .header("Authorization", format!("Bearer {}", alice))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    // Following twice is a conflict
    let response = server
        .client
        .post(&server.url("/api/users/user-2/follow"))
        .header("Authorization", format!("Bearer {}", alice))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    let response = server
        .client
        .get(&server.url("/api/users/user-2/followers"))
        .send()
        .await
        .unwrap();
    let followers: Vec<Value> = response.json().await.unwrap();
    assert_eq!(followers.len(), 1);
    assert_eq!(followers[0]["username"], "alice");

    let response = server
        .client
        .delete(&server.url("/api/users/user-2/follow"))
        .header("Authorization", format!("Bearer {}", alice))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = server
        .client
        .get(&server.url("/api/users/user-2/followers"))
        .send()
        .await
        .unwrap();
    let followers: Vec<Value> = response.json().await.unwrap();
    assert!(followers.is_empty());
}

#[tokio::test]
async fn test_cannot_follow_self() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let alice = server.auth_token("user-1");

    let response = server
        .client
        .post(&server.url("/api/users/user-1/follow"))
        .header("Authorization", format!("Bearer {}", alice))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_follow_unknown_user_returns_404() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let alice = server.auth_token("user-1");

    let response = server
        .client
        .post(&server.url("/api/users/nobody/follow"))
        .header("Authorization", format!("Bearer {}", alice))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_following_feed_shows_followed_users_only() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    server.create_test_user("user-2", "bob").await;
    server.create_test_user("user-3", "carol").await;
    let alice = server.auth_token("user-1");
    let bob = server.auth_token("user-2");
    let carol = server.auth_token("user-3");
    let game = server.seed_game("Chrono Voyage").await;

    // Alice follows Bob but not Carol
    server
        .client
        .post(&server.url("/api/users/user-2/follow"))
        .header("Authorization", format!("Bearer {}", alice))
        .send()
        .await
        .unwrap();

    for token in [&bob, &carol] {
        server
            .client
            .post(&server.url("/api/library"))
            .header("Authorization", format!("Bearer {}", token))
            .json(&serde_json::json!({ "gameId": game.id, "status": "want_to_play" }))
            .send()
            .await
            .unwrap();
    }

    let response = server
        .client
        .get(&server.url("/api/activities/following"))
        .header("Authorization", format!("Bearer {}", alice))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let feed: Vec<Value> = response.json().await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["user"]["username"], "bob");
    assert_eq!(feed[0]["type"], "added");
}

#[tokio::test]
async fn test_favorites_slots() {
    let server = TestServer::new().await;
    server.create_test_user("user-1", "alice").await;
    let token = server.auth_token("user-1");
    let first = server.seed_game("First Game").await;
    let second = server.seed_game("Second Game").await;

    let response = server
        .client
        .post(&server.url("/api/favorites"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "gameId": first.id, "position": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // A slot out of the 1..=4 range is rejected
    let response = server
        .client
        .post(&server.url("/api/favorites"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "gameId": first.id, "position": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Pinning into an occupied slot replaces the previous game
    server
        .client
        .post(&server.url("/api/favorites"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "gameId": second.id, "position": 1 }))
        .send()
        .await
        .unwrap();

    let response = server
        .client
        .get(&server.url("/api/users/user-1/favorites"))
        .send()
        .await
        .unwrap();
    let favorites: Vec<Value> = response.json().await.unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0]["game"]["title"], "Second Game");

    let response = server
        .client
        .delete(&server.url("/api/favorites/1"))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = server
        .client
        .get(&server.url("/api/users/user-1/favorites"))
        .send()
        .await
        .unwrap();
    let favorites: Vec<Value> = response.json().await.unwrap();
    assert!(favorites.is_empty());
}
