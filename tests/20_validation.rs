//! Validation rejections happen before any remote call, so every case here
//! must pass with or without a reachable database.

mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn booking_with_missing_fields_is_rejected_up_front() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/appointments", server.base_url))
        .bearer_auth(common::token_for("admin"))
        .json(&json!({ "client_name": "Ana Lopez" }))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], json!(false));
    assert!(body["field_errors"].get("client_email").is_some());
    assert!(body["field_errors"].get("property_name").is_some());
    assert!(body["field_errors"].get("client_name").is_none());
    Ok(())
}

#[tokio::test]
async fn invalid_inquiry_status_lists_the_valid_values() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .patch(format!(
            "{}/api/inquiries/{}",
            server.base_url,
            uuid::Uuid::new_v4()
        ))
        .bearer_auth(common::token_for("admin"))
        .json(&json!({ "status": "resolved" }))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    let error = body["error"].as_str().unwrap();
    for valid in ["pending", "approved", "declined", "in_progress", "responded", "closed"] {
        assert!(error.contains(valid), "error should list '{}': {}", valid, error);
    }
    Ok(())
}

#[tokio::test]
async fn unknown_appointment_transition_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .patch(format!(
            "{}/api/appointments/{}",
            server.base_url,
            uuid::Uuid::new_v4()
        ))
        .bearer_auth(common::token_for("admin"))
        .json(&json!({ "status": "done" }))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn appointment_rejection_requires_a_reason() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .patch(format!(
            "{}/api/appointments/{}",
            server.base_url,
            uuid::Uuid::new_v4()
        ))
        .bearer_auth(common::token_for("admin"))
        .json(&json!({ "status": "rejected" }))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert!(body["error"].as_str().unwrap().contains("reason"));
    Ok(())
}

#[tokio::test]
async fn otp_request_requires_a_valid_email() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/auth/otp/request", server.base_url))
        .json(&json!({ "email": "not-an-email" }))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn contract_creation_validates_the_total_amount() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/contracts", server.base_url))
        .bearer_auth(common::token_for("admin"))
        .json(&json!({
            "property_name": "Elm House",
            "owner_name": "Bo Vine",
            "owner_email": "bo@example.com",
            "client_name": "Ana Lopez",
            "client_email": "ana@example.com",
            "total_amount": "-5.00",
            "installments": 12,
            "first_due_date": "2026-09-01",
        }))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert!(body["error"].as_str().unwrap().contains("total_amount"));
    Ok(())
}
