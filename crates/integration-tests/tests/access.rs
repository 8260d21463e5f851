//! Identity header and role checks.
//!
//! Requires a running admin server (see the crate docs).

#![allow(clippy::unwrap_used)]

use lumen_integration_tests::ApiClient;
use reqwest::{Method, StatusCode};
use serde_json::Value;

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_health_endpoints() {
    let api = ApiClient::owner();

    let resp = api.anonymous(Method::GET, "/health").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");

    let resp = api
        .anonymous(Method::GET, "/health/ready")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_missing_identity_is_unauthorized() {
    let api = ApiClient::owner();
    let resp = api
        .anonymous(Method::GET, "/api/orders")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Missing user identity");
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_unknown_user_is_unauthorized() {
    let api = ApiClient::owner().as_user(i64::from(i32::MAX));
    let resp = api.get("/api/dashboard/stats").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_packer_cannot_manage_users() {
    let owner = ApiClient::owner();
    let packer_id = owner.create_user("PACKER").await;
    let packer = owner.as_user(packer_id);

    let resp = packer.get("/api/users").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = packer.get("/api/attendance/active").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Open to every active account
    let resp = packer.get("/api/dashboard/stats").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    owner.delete_user(packer_id).await;
}
