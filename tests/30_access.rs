//! Authentication and role-gate behavior. Gate denials resolve before any
//! handler logic, so these pass with or without a reachable database.

mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn missing_token_is_unauthorized() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/appointments", server.base_url))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn garbage_token_is_unauthorized() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/appointments", server.base_url))
        .bearer_auth("not.a.jwt")
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn clients_are_gated_out_of_contracts() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/contracts", server.base_url))
        .bearer_auth(common::token_for("client"))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = res.json::<Value>().await?;
    assert!(body["error"].as_str().unwrap().contains("client"));
    Ok(())
}

#[tokio::test]
async fn sales_may_not_perform_the_customer_service_step() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .patch(format!(
            "{}/api/appointments/{}",
            server.base_url,
            uuid::Uuid::new_v4()
        ))
        .bearer_auth(common::token_for("sales representative"))
        .json(&json!({ "status": "cs_approved" }))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn customer_service_may_not_decide_reservations() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .patch(format!(
            "{}/api/reservations/{}",
            server.base_url,
            uuid::Uuid::new_v4()
        ))
        .bearer_auth(common::token_for("customer service"))
        .json(&json!({ "status": "approved" }))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn clients_may_not_update_inquiry_status() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .patch(format!(
            "{}/api/inquiries/{}",
            server.base_url,
            uuid::Uuid::new_v4()
        ))
        .bearer_auth(common::token_for("client"))
        .json(&json!({ "status": "closed" }))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn route_access_listing_matches_the_gate() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    // Admin may go everywhere the table names
    let res = client
        .get(format!("{}/api/routes/access", server.base_url))
        .bearer_auth(common::token_for("admin"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    for entry in body["data"].as_array().unwrap() {
        assert_eq!(entry["allowed"], json!(true), "admin denied {:?}", entry["prefix"]);
    }

    // Clients see contracts marked off-limits
    let res = client
        .get(format!("{}/api/routes/access", server.base_url))
        .bearer_auth(common::token_for("client"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    let contracts = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["prefix"] == json!("/api/contracts"))
        .expect("contracts prefix listed");
    assert_eq!(contracts["allowed"], json!(false));
    Ok(())
}

#[tokio::test]
async fn unknown_roles_are_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/appointments", server.base_url))
        .bearer_auth(common::token_for("janitor"))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}
