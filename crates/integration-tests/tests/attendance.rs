//! Check in / check out flow.
//!
//! Requires a running admin server (see the crate docs).

#![allow(clippy::unwrap_used)]

use lumen_integration_tests::ApiClient;
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn detail(resp: reqwest::Response) -> String {
    let body: Value = resp.json().await.unwrap();
    body["detail"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_check_in_and_out() {
    let owner = ApiClient::owner();
    let employee_id = owner.create_user("EMPLOYEE").await;
    let employee = owner.as_user(employee_id);

    let resp = employee
        .post("/api/attendance/check_out")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(detail(resp).await, "Not checked in yet.");

    let resp = employee
        .post("/api/attendance/check_in")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = employee
        .post("/api/attendance/check_in")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(detail(resp).await, "Already checked in.");

    let resp = owner.get("/api/attendance/active").send().await.unwrap();
    let active: Vec<Value> = resp.json().await.unwrap();
    assert!(active.iter().any(|a| a["employee_id"] == employee_id));

    let resp = employee
        .post("/api/attendance/check_out")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = employee
        .post("/api/attendance/check_out")
        .send()
        .await
        .unwrap();
    assert_eq!(detail(resp).await, "Already checked out.");

    owner.delete_user(employee_id).await;
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_employee_cannot_check_in_others() {
    let owner = ApiClient::owner();
    let employee_id = owner.create_user("EMPLOYEE").await;

    let resp = owner
        .as_user(employee_id)
        .post("/api/attendance/check_in")
        .json(&json!({ "employee_id": lumen_integration_tests::owner_id() }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = owner
        .get("/api/attendance/overtime?threshold_hours=-1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    owner.delete_user(employee_id).await;
}
