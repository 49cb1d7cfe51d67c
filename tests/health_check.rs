//! Integration tests for the health endpoint

use std::net::TcpListener;

use staybook::configuration::{
    ApplicationSettings, DatabaseSettings, JwtSettings, Settings, StorageBackend,
};
use staybook::startup::{run, AppState};
use staybook::store::Repositories;

fn spawn_app() -> String {
    let settings = Settings {
        database: DatabaseSettings {
            username: "postgres".to_string(),
            password: "password".to_string(),
            port: 5432,
            host: "127.0.0.1".to_string(),
            database_name: "unused".to_string(),
            max_connections: 1,
        },
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            storage: StorageBackend::Memory,
            password_hash_cost: 4,
        },
        jwt: JwtSettings {
            secret: "health-secret".to_string(),
            algorithm: "HS256".to_string(),
            access_token_expire_minutes: "30".to_string(),
            refresh_token_expire_days: "7".to_string(),
        },
    };

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let state = AppState::new(&settings, Repositories::in_memory()).expect("Failed to build state");
    let server = run(listener, state).expect("Failed to create server");

    let _ = tokio::spawn(async move {
        let _ = server.await;
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn health_check_is_outside_the_api_prefix() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/rest/v1/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}
