//! Integration tests for Clementine.
//!
//! These tests exercise a running API server end to end over HTTP. They are
//! all marked `#[ignore]` so that a plain `cargo test` stays hermetic.
//!
//! # Running Tests
//!
//! ```bash
//! # Start Postgres and prepare the schema
//! clementine-cli migrate
//! clementine-cli seed
//!
//! # Start the API server, then:
//! cargo test -p clementine-integration-tests -- --ignored
//! ```
//!
//! # Environment
//!
//! - `CLEMENTINE_BASE_URL` - API base URL (default `http://localhost:4000`)
//! - `CLEMENTINE_ADMIN_EMAIL` / `CLEMENTINE_ADMIN_PASSWORD` - admin login
//!   used by the admin-flow tests
//! - `CLEMENTINE_WEBHOOK_SECRET` - must match the server's webhook secret
//!   for the payment webhook tests

#![cfg_attr(not(test), forbid(unsafe_code))]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL of the API server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("CLEMENTINE_BASE_URL").unwrap_or_else(|_| "http://localhost:4000".to_string())
}

/// A fresh email address that will not collide with earlier runs.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.test", Uuid::new_v4().simple())
}

/// Shared password used by accounts the tests create.
pub const TEST_PASSWORD: &str = "integration-pw-1";

/// A thin wrapper over `reqwest::Client` that knows the server's base URL
/// and speaks the `{success, message, data}` envelope.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: base_url(),
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Register a new customer account and return its bearer token.
    ///
    /// # Panics
    ///
    /// Panics if the server rejects the registration.
    pub async fn register_customer(&self, email: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                &json!({
                    "name": "Integration Customer",
                    "email": email,
                    "password": TEST_PASSWORD,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "registration failed: {body}");
        token_from(&body)
    }

    /// Log in with an existing account and return its bearer token.
    ///
    /// # Panics
    ///
    /// Panics if the credentials are rejected.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/login",
                None,
                &json!({"email": email, "password": password}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        token_from(&body)
    }

    /// Log in as the admin account named by the environment.
    ///
    /// # Panics
    ///
    /// Panics if the admin credentials are rejected.
    pub async fn admin_token(&self) -> String {
        let email = std::env::var("CLEMENTINE_ADMIN_EMAIL")
            .unwrap_or_else(|_| "admin@clementine.shop".to_string());
        let password = std::env::var("CLEMENTINE_ADMIN_PASSWORD")
            .unwrap_or_else(|_| "admin-password-1".to_string());
        self.login(&email, &password).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        send(req).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> (StatusCode, Value) {
        let mut req = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        send(req).await
    }

    pub async fn put(&self, path: &str, token: Option<&str>, body: &Value) -> (StatusCode, Value) {
        let mut req = self.client.put(self.url(path)).json(body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        send(req).await
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: &Value) -> (StatusCode, Value) {
        let mut req = self.client.patch(self.url(path)).json(body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        send(req).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.client.delete(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        send(req).await
    }
}

async fn send(req: reqwest::RequestBuilder) -> (StatusCode, Value) {
    let resp = req.send().await.expect("request failed");
    let status = resp.status();
    let body = resp
        .json::<Value>()
        .await
        .unwrap_or_else(|_| Value::Null);
    (status, body)
}

/// Assert a `success: true` envelope and return its `data` payload.
///
/// # Panics
///
/// Panics if the envelope reports failure or carries no data.
#[must_use]
pub fn data(body: &Value) -> &Value {
    assert_eq!(
        body.get("success").and_then(Value::as_bool),
        Some(true),
        "expected success envelope, got: {body}"
    );
    body.get("data")
        .unwrap_or_else(|| panic!("envelope has no data: {body}"))
}

/// Assert a `success: false` envelope and return its message.
///
/// # Panics
///
/// Panics if the envelope reports success.
#[must_use]
pub fn error_message(body: &Value) -> &str {
    assert_eq!(
        body.get("success").and_then(Value::as_bool),
        Some(false),
        "expected error envelope, got: {body}"
    );
    body.get("message")
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("error envelope has no message: {body}"))
}

fn token_from(body: &Value) -> String {
    data(body)
        .get("token")
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("session response has no token: {body}"))
        .to_string()
}
