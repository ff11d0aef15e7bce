//! Integration tests for the liveness endpoint

use std::net::TcpListener;
use std::sync::Arc;
use chirpy::auth::SessionService;
use chirpy::configuration::{JwtSettings, PasswordSettings};
use chirpy::startup::run;
use chirpy::storage::{InMemoryRefreshTokenRepository, InMemoryUserStore};

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let jwt = JwtSettings {
        secret: "health-check-secret".to_string(),
        access_token_expiry: 3600,
        refresh_token_expiry: 5_184_000,
        issuer: "Chirpy".to_string(),
    };
    let sessions = SessionService::from_settings(
        &jwt,
        &PasswordSettings { bcrypt_cost: 4 },
        Arc::new(InMemoryUserStore::new()),
        Arc::new(InMemoryRefreshTokenRepository::new()),
    )
    .expect("Failed to build session service");

    let server = run(listener, sessions)
        .expect("Failed to create server");

    let _ = tokio::spawn(async move {
        let _ = server.await;
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/api/healthz", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/api/chirps/nope", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}
