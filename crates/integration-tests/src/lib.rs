//! Integration test helpers for Lumen Orders.
//!
//! The HTTP tests in `tests/` talk to a running admin server and are marked
//! `#[ignore]`. To run them:
//!
//! ```bash
//! lumen-cli migrate
//! lumen-cli user create -e owner@example.com -n "Owner" -r owner -p secret
//! cargo run -p lumen-admin &
//! LUMEN_TEST_USER_ID=1 cargo test -p lumen-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `LUMEN_BASE_URL` - server address (default `http://localhost:8000`)
//! - `LUMEN_TEST_USER_ID` - ID of an owner account to act as (default 1)

use lumen_admin::middleware::USER_ID_HEADER;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL of the admin server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("LUMEN_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

/// Account the tests act as unless they switch identity.
#[must_use]
pub fn owner_id() -> i64 {
    std::env::var("LUMEN_TEST_USER_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1)
}

/// Email address that will not collide with earlier runs.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@test.lumen.invalid", Uuid::new_v4().simple())
}

/// HTTP client that sends the identity header on every request.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    user_id: i64,
}

impl ApiClient {
    /// Client acting as the configured owner account.
    #[must_use]
    pub fn owner() -> Self {
        Self {
            client: Client::new(),
            base_url: base_url(),
            user_id: owner_id(),
        }
    }

    /// Same server, different identity.
    #[must_use]
    pub fn as_user(&self, user_id: i64) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            user_id,
        }
    }

    /// Request without the identity header.
    #[must_use]
    pub fn anonymous(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
    }

    #[must_use]
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.anonymous(method, path)
            .header(USER_ID_HEADER, self.user_id.to_string())
    }

    #[must_use]
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    #[must_use]
    pub fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    #[must_use]
    pub fn patch(&self, path: &str) -> RequestBuilder {
        self.request(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Create an active staff account with the given role and return its ID.
    ///
    /// # Panics
    ///
    /// Panics if the server rejects the request.
    pub async fn create_user(&self, role: &str) -> i64 {
        let resp = self
            .post("/api/users")
            .json(&json!({
                "name": format!("Test {role}"),
                "email": unique_email(role),
                "password": "integration-secret",
                "role": role,
            }))
            .send()
            .await
            .expect("create user request failed");
        assert_eq!(resp.status(), StatusCode::CREATED, "create {role} user");
        let body: Value = resp.json().await.expect("user body");
        body["id"].as_i64().expect("user id")
    }

    /// Delete a staff account created by a test, ignoring failures.
    pub async fn delete_user(&self, id: i64) {
        let _ = self.delete(&format!("/api/users/{id}")).send().await;
    }
}
