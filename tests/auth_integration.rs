use std::net::TcpListener;
use std::sync::Arc;

use serde_json::{json, Value};
use staybook::configuration::{
    ApplicationSettings, DatabaseSettings, JwtSettings, Settings, StorageBackend,
};
use staybook::startup::{run, AppState};
use staybook::store::{InMemoryStore, Repositories};

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
    pub client: reqwest::Client,
}

fn test_settings() -> Settings {
    Settings {
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
            secret: "integration-test-secret".to_string(),
            algorithm: "HS256".to_string(),
            access_token_expire_minutes: "30".to_string(),
            refresh_token_expire_days: "7".to_string(),
        },
    }
}

fn spawn_app_with(settings: Settings) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let store = Arc::new(InMemoryStore::new());
    let state = AppState::new(&settings, Repositories::from_store(store.clone()))
        .expect("Failed to build application state");
    let server = run(listener, state).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        client: reqwest::Client::new(),
    }
}

fn spawn_app() -> TestApp {
    spawn_app_with(test_settings())
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}/rest/v1{}", self.address, path)
    }

    async fn post(&self, path: &str, body: &Value, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request")
    }

    async fn signup(&self, email: &str, password: &str) -> reqwest::Response {
        self.post("/auth/signup", &json!({"email": email, "password": password}), None)
            .await
    }

    async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post("/auth/login", &json!({"email": email, "password": password}), None)
            .await
    }

    async fn access_token(&self, email: &str, password: &str) -> String {
        let body: Value = self.login(email, password).await.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn me(&self, authorization: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url("/user/users/me"));
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }
        request.send().await.expect("Failed to execute request")
    }
}

async fn error_code(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["code"].as_str().unwrap_or_default().to_string()
}

// --- Signup ---

#[tokio::test]
async fn signup_returns_200_with_user_id() {
    let app = spawn_app();

    let response = app.signup("a@x.com", "p").await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert!(body["user_id"].as_i64().unwrap() > 0);
    assert_eq!(body["msg"], "User created successfully");
}

#[tokio::test]
async fn signup_twice_with_same_email_returns_400() {
    let app = spawn_app();
    app.signup("a@x.com", "p").await;

    let response = app.signup("A@x.com", "other").await;

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "DUPLICATE_RESOURCE");
    assert_eq!(body["message"], "Email already registered");
    assert!(body["error_id"].as_str().is_some());
}

#[tokio::test]
async fn signup_rejects_invalid_input() {
    let app = spawn_app();
    let test_cases = vec![
        (json!({"email": "not-an-email", "password": "p"}), "invalid email"),
        (json!({"email": "a@x.com", "password": ""}), "empty password"),
        (json!({"email": "a@x.com"}), "missing password"),
        (
            json!({"email": "a@x.com", "password": "p", "username": "c@x.com"}),
            "email-shaped username",
        ),
    ];

    for (body, description) in test_cases {
        let response = app.post("/auth/signup", &body, None).await;
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request for {}.",
            description
        );
    }
}

#[tokio::test]
async fn chosen_username_does_not_block_another_signup() {
    let app = spawn_app();

    let first = app
        .post(
            "/auth/signup",
            &json!({"email": "b@x.com", "password": "p", "username": "bee"}),
            None,
        )
        .await;
    assert_eq!(200, first.status().as_u16());

    assert_eq!(200, app.signup("c@x.com", "p").await.status().as_u16());
    assert_eq!(200, app.signup("a--b@x.com", "p").await.status().as_u16());
}

// --- Login ---

#[tokio::test]
async fn login_returns_both_tokens() {
    let app = spawn_app();
    app.signup("a@x.com", "p").await;

    let response = app.login("a@x.com", "p").await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 1800);
    assert_eq!(body["is_admin"], false);
    assert_eq!(body["is_staff"], false);
    assert!(body["access_token"].as_str().is_some());
    assert!(body["refresh_token"].as_str().is_some());
    assert_ne!(body["access_token"], body["refresh_token"]);
}

#[tokio::test]
async fn login_reports_staff_flag_independently() {
    let app = spawn_app();
    let created: Value = app.signup("s@x.com", "p").await.json().await.unwrap();
    app.store
        .set_roles(created["user_id"].as_i64().unwrap(), false, true)
        .unwrap();

    let body: Value = app.login("s@x.com", "p").await.json().await.unwrap();

    assert_eq!(body["is_admin"], false);
    assert_eq!(body["is_staff"], true);
}

#[tokio::test]
async fn login_with_bad_credentials_returns_401() {
    let app = spawn_app();
    app.signup("a@x.com", "p").await;

    for (email, password) in [("a@x.com", "wrong"), ("nobody@x.com", "p")] {
        let response = app.login(email, password).await;
        assert_eq!(401, response.status().as_u16());
        assert_eq!(error_code(response).await, "INVALID_CREDENTIALS");
    }
}

#[tokio::test]
async fn login_with_malformed_ttl_returns_500() {
    let mut settings = test_settings();
    settings.jwt.access_token_expire_minutes = "thirty".to_string();
    let app = spawn_app_with(settings);
    app.signup("a@x.com", "p").await;

    let response = app.login("a@x.com", "p").await;

    assert_eq!(500, response.status().as_u16());
    assert_eq!(error_code(response).await, "CONFIG_ERROR");
}

#[tokio::test]
async fn trailing_slash_is_ignored() {
    let app = spawn_app();
    app.signup("a@x.com", "p").await;

    let response = app
        .client
        .post(format!("{}/rest/v1/auth/login/", app.address))
        .json(&json!({"email": "a@x.com", "password": "p"}))
        .send()
        .await
        .unwrap();

    assert_eq!(200, response.status().as_u16());
}

// --- Authorization gate ---

#[tokio::test]
async fn protected_route_requires_bearer_header() {
    let app = spawn_app();

    let missing = app.me(None).await;
    assert_eq!(401, missing.status().as_u16());
    assert_eq!(error_code(missing).await, "AUTH_MISSING");

    let wrong_scheme = app.me(Some("Token abc")).await;
    assert_eq!(401, wrong_scheme.status().as_u16());
    assert_eq!(error_code(wrong_scheme).await, "AUTH_MISSING");

    let unknown = app.me(Some("Bearer abc.def.ghi")).await;
    assert_eq!(401, unknown.status().as_u16());
    assert_eq!(error_code(unknown).await, "TOKEN_INVALID");
}

#[tokio::test]
async fn access_token_resolves_current_user() {
    let app = spawn_app();
    app.signup("a@x.com", "p").await;
    let token = app.access_token("a@x.com", "p").await;

    let response = app.me(Some(&format!("Bearer {}", token))).await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], "a@x.com");
    assert_eq!(body["username"], "a@x.com");
    assert_eq!(body["profile"]["preferred_language"], "en");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn relogin_revokes_previous_access_token() {
    let app = spawn_app();
    app.signup("a@x.com", "p").await;
    let first = app.access_token("a@x.com", "p").await;
    let second = app.access_token("a@x.com", "p").await;

    let stale = app.me(Some(&format!("Bearer {}", first))).await;
    assert_eq!(401, stale.status().as_u16());
    assert_eq!(error_code(stale).await, "TOKEN_INVALID");

    let fresh = app.me(Some(&format!("Bearer {}", second))).await;
    assert_eq!(200, fresh.status().as_u16());
}

// --- Logout ---

#[tokio::test]
async fn logout_succeeds_once() {
    let app = spawn_app();
    app.signup("a@x.com", "p").await;
    let token = app.access_token("a@x.com", "p").await;

    let first = app.post("/auth/logout", &json!({}), Some(&token)).await;
    assert_eq!(200, first.status().as_u16());
    let body: Value = first.json().await.unwrap();
    assert_eq!(body["msg"], "Successfully logged out");

    let second = app.post("/auth/logout", &json!({}), Some(&token)).await;
    assert_eq!(401, second.status().as_u16());
    assert_eq!(error_code(second).await, "TOKEN_INVALID");
}

#[tokio::test]
async fn logout_without_token_is_401() {
    let app = spawn_app();

    let response = app.post("/auth/logout", &json!({}), None).await;

    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_code(response).await, "AUTH_MISSING");
}

// --- Credentials ---

#[tokio::test]
async fn password_change_takes_effect_on_next_login() {
    let app = spawn_app();
    app.signup("a@x.com", "p").await;
    let token = app.access_token("a@x.com", "p").await;

    let response = app
        .client
        .put(app.url("/user/users/me"))
        .bearer_auth(&token)
        .json(&json!({"password": "new-secret"}))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    assert_eq!(401, app.login("a@x.com", "p").await.status().as_u16());
    assert_eq!(200, app.login("a@x.com", "new-secret").await.status().as_u16());
}
