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

use crate::database::CasOutcome;
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::services::notifier::{self, Notification, Priority};
use crate::services::receipts;
use crate::state::AppState;
use crate::types::Role;

use super::{
    decimal_field, fetch_listing, fetch_row, filtered_listing, find_transition, opt_str_field,
    require_fields, str_field, valid_email, TransitionRule,
};

/// Reservation flow: one approval step, plus an admin-only revert that
/// returns a decided reservation to review.
pub const TRANSITIONS: &[TransitionRule] = &[
    TransitionRule {
        target: "approved",
        expected: &["pending"],
        allowed: &[Role::Admin, Role::SalesRepresentative],
        requires_reason: false,
    },
    TransitionRule {
        target: "rejected",
        expected: &["pending"],
        allowed: &[Role::Admin, Role::SalesRepresentative],
        requires_reason: true,
    },
    TransitionRule {
        target: "pending",
        expected: &["approved", "rejected"],
        allowed: &[Role::Admin],
        requires_reason: false,
    },
];

#[derive(Debug, Deserialize)]
pub struct ReservationQuery {
    pub client_email: Option<String>,
    pub status: Option<String>,
}

/// GET /api/reservations - list reservations with optional filters
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ReservationQuery>,
) -> Result<Json<Value>, ApiError> {
    let client_email = if user.role == Role::Client {
        Some(user.email.clone())
    } else {
        query.client_email
    };

    let (sql, args) = filtered_listing(
        "reservations",
        &[("client_email", client_email), ("status", query.status)],
        "created_at DESC",
    );
    let data = fetch_listing(&state.db, &sql, &args).await?;

    Ok(Json(json!({ "success": true, "data": data })))
}

/// GET /api/reservations/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let row = fetch_row(&state.db, "reservations", "reservation_id", id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("reservation {} not found", id)))?;

    if user.role == Role::Client
        && row.get("client_email").and_then(Value::as_str) != Some(user.email.as_str())
    {
        return Err(ApiError::not_found(format!("reservation {} not found", id)));
    }

    Ok(Json(json!({ "success": true, "data": row })))
}

/// POST /api/reservations - place a reservation on a property
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let property_name = str_field(&payload, "property_name");
    let client_name = str_field(&payload, "client_name");
    let client_email = str_field(&payload, "client_email");

    require_fields(&[
        ("property_name", &property_name),
        ("client_name", &client_name),
        ("client_email", &client_email),
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
        "INSERT INTO reservations \
         (reservation_id, property_name, client_name, client_email, client_phone, notes, \
          status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $7)",
    )
    .bind(id)
    .bind(&property_name)
    .bind(&client_name)
    .bind(&client_email)
    .bind(opt_str_field(&payload, "client_phone"))
    .bind(opt_str_field(&payload, "notes"))
    .bind(now)
    .execute(&state.db)
    .await?;

    tracing::info!(reservation = %id, client = %client_email, by = %user.email, "reservation placed");

    let note = Notification {
        message: format!("New reservation for {} from {}", property_name, client_name),
        icon: "bookmark".to_string(),
        priority: Priority::Normal,
        link: format!("/reservations/{}", id),
    };
    if let Err(e) =
        notifier::notify_staff(&state.db, &[Role::Admin, Role::SalesRepresentative], &note).await
    {
        tracing::warn!("reservation {} staff notification failed (non-critical): {}", id, e);
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": { "reservation_id": id, "status": "pending" },
            "message": "reservation placed",
        })),
    ))
}

/// PATCH /api/reservations/:id - approve, reject, or revert to pending
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let target = str_field(&payload, "status");
    let reason = opt_str_field(&payload, "reason");

    let rule = find_transition(TRANSITIONS, &target).ok_or_else(|| {
        ApiError::bad_request(format!(
            "unknown target status '{}'; expected one of approved, rejected, pending",
            target
        ))
    })?;

    if !rule.allowed.contains(&user.role) {
        return Err(ApiError::forbidden(format!(
            "role '{}' may not set a reservation to {}",
            user.role, target
        )));
    }
    if rule.requires_reason && reason.is_none() {
        return Err(ApiError::bad_request(
            "a non-empty reason is required to reject a reservation",
        ));
    }

    match rule.target {
        "approved" => approve(&state, id, &user, &payload).await,
        "rejected" => reject(&state, id, &user, reason.as_deref().unwrap_or("")).await,
        _ => revert(&state, id).await,
    }
}

async fn approve(
    state: &AppState,
    id: Uuid,
    user: &AuthUser,
    payload: &Value,
) -> Result<Json<Value>, ApiError> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE reservations SET status = 'approved', approved_by = $2, approved_at = $3, \
         updated_at = $3 WHERE reservation_id = $1 AND status = 'pending'",
    )
    .bind(id)
    .bind(user.user_id)
    .bind(now)
    .execute(&state.db)
    .await?;

    if !CasOutcome::from_rows_affected(result.rows_affected()).applied() {
        return Err(ApiError::state_conflict(format!(
            "reservation {} not found or already processed",
            id
        )));
    }

    // The fee transaction is part of the approval itself, not a side effect.
    let amount =
        decimal_field(payload, "fee_amount").unwrap_or(state.config.billing.reservation_fee);
    let receipt = receipts::receipt_number(id, now);
    let due_date = receipts::fee_due_date(now);
    sqlx::query(
        "INSERT INTO transactions \
         (transaction_id, reservation_id, receipt_number, amount, transaction_type, \
          payment_status, due_date, created_at) \
         VALUES ($1, $2, $3, $4, 'reservation_fee', 'pending', $5, $6)",
    )
    .bind(Uuid::new_v4())
    .bind(id)
    .bind(&receipt)
    .bind(amount)
    .bind(due_date)
    .bind(now)
    .execute(&state.db)
    .await
    .map_err(|e| {
        tracing::error!("reservation {} approved but fee transaction insert failed: {}", id, e);
        ApiError::from(e)
    })?;

    notify_client(state, id, "Your reservation was approved; a fee payment is now due").await;

    Ok(Json(json!({
        "success": true,
        "data": {
            "reservation_id": id,
            "status": "approved",
            "receipt_number": receipt,
            "due_date": due_date,
        },
    })))
}

async fn reject(
    state: &AppState,
    id: Uuid,
    user: &AuthUser,
    reason: &str,
) -> Result<Json<Value>, ApiError> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE reservations SET status = 'rejected', rejected_by = $2, rejected_at = $3, \
         rejection_reason = $4, updated_at = $3 WHERE reservation_id = $1 AND status = 'pending'",
    )
    .bind(id)
    .bind(user.user_id)
    .bind(now)
    .bind(reason)
    .execute(&state.db)
    .await?;

    if !CasOutcome::from_rows_affected(result.rows_affected()).applied() {
        return Err(ApiError::state_conflict(format!(
            "reservation {} not found or already processed",
            id
        )));
    }

    notify_client(state, id, "Your reservation was declined").await;

    Ok(Json(json!({
        "success": true,
        "data": { "reservation_id": id, "status": "rejected" },
    })))
}

async fn revert(state: &AppState, id: Uuid) -> Result<Json<Value>, ApiError> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE reservations SET status = 'pending', approved_by = NULL, approved_at = NULL, \
         rejected_by = NULL, rejected_at = NULL, rejection_reason = NULL, updated_at = $2 \
         WHERE reservation_id = $1 AND status IN ('approved', 'rejected')",
    )
    .bind(id)
    .bind(now)
    .execute(&state.db)
    .await?;

    if !CasOutcome::from_rows_affected(result.rows_affected()).applied() {
        return Err(ApiError::state_conflict(format!(
            "reservation {} is not in a decided state",
            id
        )));
    }

    // Only fee transactions nobody has paid are withdrawn; completed ones stand.
    match sqlx::query(
        "DELETE FROM transactions WHERE reservation_id = $1 AND payment_status = 'pending'",
    )
    .bind(id)
    .execute(&state.db)
    .await
    {
        Ok(res) => {
            tracing::info!(reservation = %id, removed = res.rows_affected(), "pending fee transactions withdrawn");
        }
        Err(e) => {
            tracing::warn!("reservation {} transaction cleanup failed (non-critical): {}", id, e);
        }
    }

    notify_client(state, id, "Your reservation has returned to pending review").await;

    Ok(Json(json!({
        "success": true,
        "data": { "reservation_id": id, "status": "pending" },
    })))
}

/// Best-effort client notification; failures are logged, never propagated.
async fn notify_client(state: &AppState, id: Uuid, message: &str) {
    let email: Option<(String,)> =
        match sqlx::query_as("SELECT client_email FROM reservations WHERE reservation_id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await
        {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!("reservation {} notification skipped: {}", id, e);
                return;
            }
        };
    let Some((email,)) = email else { return };

    let note = Notification {
        message: message.to_string(),
        icon: "bookmark".to_string(),
        priority: Priority::High,
        link: format!("/reservations/{}", id),
    };
    if let Err(e) = notifier::notify_client(&state.db, &email, &note).await {
        tracing::warn!("reservation {} notification failed (non-critical): {}", id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_and_rejection_start_from_pending() {
        let approve = find_transition(TRANSITIONS, "approved").unwrap();
        let reject = find_transition(TRANSITIONS, "rejected").unwrap();
        assert_eq!(approve.expected, &["pending"]);
        assert_eq!(reject.expected, &["pending"]);
        assert!(reject.requires_reason);
    }

    #[test]
    fn revert_is_admin_only_and_leaves_terminal_states() {
        let revert = find_transition(TRANSITIONS, "pending").unwrap();
        assert_eq!(revert.allowed, &[Role::Admin]);
        assert!(revert.expected.contains(&"approved"));
        assert!(revert.expected.contains(&"rejected"));
    }

    #[test]
    fn customer_service_cannot_decide_reservations() {
        for target in ["approved", "rejected"] {
            let rule = find_transition(TRANSITIONS, target).unwrap();
            assert!(!rule.allowed.contains(&Role::CustomerService));
        }
    }
}
