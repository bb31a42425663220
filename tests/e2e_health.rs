//! E2E tests for health and metrics endpoints

mod common;

use common::TestServer;

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = TestServer::new().await;

    // Trigger an error counter so at least one sample is exported
    server
        .client
        .get(&server.url("/api/auth/user"))
        .send()
        .await
        .unwrap();

    let response = server
        .client
        .get(&server.url("/metrics"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("playshelf_errors_total"));
}

#[tokio::test]
async fn test_http_metrics_record_handled_requests() {
    let server = TestServer::new().await;
    let game = server.seed_game("Metered Game").await;

    let response = server
        .client
        .get(&server.url(&format!("/api/games/{}", game.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body = server
        .client
        .get(&server.url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    // The request counter and duration histogram both gain samples once a
    // handled request passes through an instrumented handler.
    assert!(body.contains("playshelf_http_requests_total"));
    assert!(body.contains(r#"endpoint="/api/games/:id""#));
    assert!(body.contains("playshelf_http_request_duration_seconds_bucket"));
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/api/does-not-exist"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}
