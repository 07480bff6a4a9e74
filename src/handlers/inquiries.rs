use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::services::notifier::{self, Notification, Priority};
use crate::state::AppState;
use crate::types::Role;

use super::{
    fetch_listing, fetch_row, filtered_listing, opt_str_field, require_fields, str_field,
    valid_email,
};

/// The closed set of inquiry statuses; anything else is rejected up front.
pub const VALID_STATUSES: &[&str] = &[
    "pending",
    "approved",
    "declined",
    "in_progress",
    "responded",
    "closed",
];

#[derive(Debug, Deserialize)]
pub struct InquiryQuery {
    pub client_email: Option<String>,
    pub status: Option<String>,
}

/// GET /api/inquiries
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<InquiryQuery>,
) -> Result<Json<Value>, ApiError> {
    let client_email = if user.role == Role::Client {
        Some(user.email.clone())
    } else {
        query.client_email
    };

    let (sql, args) = filtered_listing(
        "inquiries",
        &[("client_email", client_email), ("status", query.status)],
        "created_at DESC",
    );
    let data = fetch_listing(&state.db, &sql, &args).await?;

    Ok(Json(json!({ "success": true, "data": data })))
}

/// GET /api/inquiries/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let row = fetch_row(&state.db, "inquiries", "inquiry_id", id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("inquiry {} not found", id)))?;

    if user.role == Role::Client
        && row.get("client_email").and_then(Value::as_str) != Some(user.email.as_str())
    {
        return Err(ApiError::not_found(format!("inquiry {} not found", id)));
    }

    Ok(Json(json!({ "success": true, "data": row })))
}

/// POST /api/inquiries - submit a question about a property
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let client_name = str_field(&payload, "client_name");
    let client_email = str_field(&payload, "client_email");
    let subject = str_field(&payload, "subject");
    let message = str_field(&payload, "message");

    require_fields(&[
        ("client_name", &client_name),
        ("client_email", &client_email),
        ("subject", &subject),
        ("message", &message),
    ])?;
    if !valid_email(&client_email) {
        return Err(ApiError::bad_request("client_email is not a valid email address"));
    }

    state
        .verifier
        .check(opt_str_field(&payload, "verification_token").as_deref())
        .await?;

    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO inquiries \
         (inquiry_id, client_name, client_email, property_name, subject, message, \
          status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $7)",
    )
    .bind(id)
    .bind(&client_name)
    .bind(&client_email)
    .bind(opt_str_field(&payload, "property_name"))
    .bind(&subject)
    .bind(&message)
    .bind(now)
    .execute(&state.db)
    .await?;

    let note = Notification {
        message: format!("New inquiry from {}: {}", client_name, subject),
        icon: "mail".to_string(),
        priority: Priority::Normal,
        link: format!("/inquiries/{}", id),
    };
    if let Err(e) =
        notifier::notify_staff(&state.db, &[Role::Admin, Role::CustomerService], &note).await
    {
        tracing::warn!("inquiry {} staff notification failed (non-critical): {}", id, e);
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": { "inquiry_id": id, "status": "pending" },
            "message": "inquiry received",
        })),
    ))
}

/// PATCH /api/inquiries/:id - move an inquiry through its lifecycle
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    if user.role == Role::Client {
        return Err(ApiError::forbidden("role 'client' may not update inquiry status"));
    }

    let status = str_field(&payload, "status");
    if !VALID_STATUSES.contains(&status.as_str()) {
        return Err(ApiError::bad_request(format!(
            "invalid status '{}'; valid values: {}",
            status,
            VALID_STATUSES.join(", ")
        )));
    }

    let result = sqlx::query(
        "UPDATE inquiries SET status = $2, updated_at = $3 WHERE inquiry_id = $1",
    )
    .bind(id)
    .bind(&status)
    .bind(Utc::now())
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("inquiry {} not found", id)));
    }

    Ok(Json(json!({
        "success": true,
        "data": { "inquiry_id": id, "status": status },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_six_statuses_are_valid() {
        assert_eq!(VALID_STATUSES.len(), 6);
        for status in ["pending", "approved", "declined", "in_progress", "responded", "closed"] {
            assert!(VALID_STATUSES.contains(&status));
        }
    }

    #[test]
    fn near_misses_are_not_valid() {
        for status in ["Pending", "in progress", "resolved", "open", ""] {
            assert!(!VALID_STATUSES.contains(&status));
        }
    }
}
