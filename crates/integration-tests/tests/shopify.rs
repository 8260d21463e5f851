//! Shopify connection management.
//!
//! Requires a running admin server (see the crate docs). These tests remove
//! any stored store connection, so run them against a disposable database.

#![allow(clippy::unwrap_used)]

use lumen_integration_tests::ApiClient;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_disconnect_clears_sync_status() {
    let api = ApiClient::owner();

    let resp = api.delete("/api/shopify/config").send().await.unwrap();
    assert!(matches!(resp.status(), StatusCode::OK | StatusCode::NOT_FOUND));

    let resp = api.delete("/api/shopify/config").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = api.get("/api/shopify/sync-status").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let status: Value = resp.json().await.unwrap();
    assert_eq!(status["status"], "pending");
    assert_eq!(status["orders_synced"], 0);
    assert!(status["last_sync"].is_null());
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_packer_cannot_disconnect() {
    let owner = ApiClient::owner();
    let packer_id = owner.create_user("PACKER").await;

    let resp = owner
        .as_user(packer_id)
        .delete("/api/shopify/config")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    owner.delete_user(packer_id).await;
}
