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
use crate::state::AppState;
use crate::types::Role;

use super::{
    date_field, fetch_listing, fetch_row, filtered_listing, find_transition, opt_str_field,
    require_fields, str_field, valid_email, TransitionRule,
};

/// Tour approval flow: customer service screens first, sales confirms, and
/// any of the three staff roles can reject while the booking is still open.
pub const TRANSITIONS: &[TransitionRule] = &[
    TransitionRule {
        target: "cs_approved",
        expected: &["pending"],
        allowed: &[Role::Admin, Role::CustomerService],
        requires_reason: false,
    },
    TransitionRule {
        target: "sales_approved",
        expected: &["cs_approved"],
        allowed: &[Role::Admin, Role::SalesRepresentative],
        requires_reason: false,
    },
    TransitionRule {
        target: "rejected",
        expected: &["pending", "cs_approved"],
        allowed: &[
            Role::Admin,
            Role::CustomerService,
            Role::SalesRepresentative,
        ],
        requires_reason: true,
    },
];

#[derive(Debug, Deserialize)]
pub struct AppointmentQuery {
    pub client_email: Option<String>,
    pub status: Option<String>,
}

/// GET /api/appointments - list tour bookings with optional filters
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Value>, ApiError> {
    // Clients only ever see their own bookings.
    let client_email = if user.role == Role::Client {
        Some(user.email.clone())
    } else {
        query.client_email
    };

    let (sql, args) = filtered_listing(
        "appointments",
        &[("client_email", client_email), ("status", query.status)],
        "created_at DESC",
    );
    let data = fetch_listing(&state.db, &sql, &args).await?;

    Ok(Json(json!({ "success": true, "data": data })))
}

/// GET /api/appointments/:id - fetch a single booking
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let row = fetch_row(&state.db, "appointments", "appointment_id", id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("appointment {} not found", id)))?;

    if user.role == Role::Client
        && row.get("client_email").and_then(Value::as_str) != Some(user.email.as_str())
    {
        return Err(ApiError::not_found(format!("appointment {} not found", id)));
    }

    Ok(Json(json!({ "success": true, "data": row })))
}

/// POST /api/appointments - book a property tour
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let property_name = str_field(&payload, "property_name");
    let client_name = str_field(&payload, "client_name");
    let client_email = str_field(&payload, "client_email");
    let preferred_time = str_field(&payload, "preferred_time");

    require_fields(&[
        ("property_name", &property_name),
        ("client_name", &client_name),
        ("client_email", &client_email),
        ("preferred_time", &preferred_time),
    ])?;
    if !valid_email(&client_email) {
        return Err(ApiError::bad_request("client_email is not a valid email address"));
    }
    let preferred_date = date_field(&payload, "preferred_date")
        .ok_or_else(|| ApiError::bad_request("preferred_date must be a YYYY-MM-DD date"))?;

    state
        .verifier
        .check(opt_str_field(&payload, "verification_token").as_deref())
        .await?;

    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO appointments \
         (appointment_id, property_name, client_name, client_email, client_phone, \
          preferred_date, preferred_time, notes, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9, $9)",
    )
    .bind(id)
    .bind(&property_name)
    .bind(&client_name)
    .bind(&client_email)
    .bind(opt_str_field(&payload, "client_phone"))
    .bind(preferred_date)
    .bind(&preferred_time)
    .bind(opt_str_field(&payload, "notes"))
    .bind(now)
    .execute(&state.db)
    .await?;

    tracing::info!(appointment = %id, client = %client_email, by = %user.email, "tour booked");

    // Non-critical: the booking stands even if the staff feed misses it.
    let note = Notification {
        message: format!("New tour request for {} from {}", property_name, client_name),
        icon: "calendar".to_string(),
        priority: Priority::Normal,
        link: format!("/appointments/{}", id),
    };
    if let Err(e) =
        notifier::notify_staff(&state.db, &[Role::Admin, Role::CustomerService], &note).await
    {
        tracing::warn!("appointment {} staff notification failed (non-critical): {}", id, e);
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": { "appointment_id": id, "status": "pending" },
            "message": "tour appointment requested",
        })),
    ))
}

/// PATCH /api/appointments/:id - advance or reject the approval flow
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
            "unknown target status '{}'; expected one of cs_approved, sales_approved, rejected",
            target
        ))
    })?;

    if !rule.allowed.contains(&user.role) {
        return Err(ApiError::forbidden(format!(
            "role '{}' may not set an appointment to {}",
            user.role, target
        )));
    }
    if rule.requires_reason && reason.is_none() {
        return Err(ApiError::bad_request(
            "a non-empty reason is required to reject an appointment",
        ));
    }

    let now = Utc::now();
    // The UPDATE filters by id and the expected current status, so of two
    // near-simultaneous duplicate requests only one matches a row.
    let result = match rule.target {
        "cs_approved" => {
            sqlx::query(
                "UPDATE appointments SET status = 'cs_approved', cs_approved_by = $2, \
                 cs_approved_at = $3, updated_at = $3 \
                 WHERE appointment_id = $1 AND status = 'pending'",
            )
            .bind(id)
            .bind(user.user_id)
            .bind(now)
            .execute(&state.db)
            .await?
        }
        "sales_approved" => {
            sqlx::query(
                "UPDATE appointments SET status = 'sales_approved', sales_approved_by = $2, \
                 sales_approved_at = $3, updated_at = $3 \
                 WHERE appointment_id = $1 AND status = 'cs_approved'",
            )
            .bind(id)
            .bind(user.user_id)
            .bind(now)
            .execute(&state.db)
            .await?
        }
        _ => {
            sqlx::query(
                "UPDATE appointments SET status = 'rejected', rejected_by = $2, \
                 rejected_at = $3, rejection_reason = $4, updated_at = $3 \
                 WHERE appointment_id = $1 AND status IN ('pending', 'cs_approved')",
            )
            .bind(id)
            .bind(user.user_id)
            .bind(now)
            .bind(reason.as_deref())
            .execute(&state.db)
            .await?
        }
    };

    if !CasOutcome::from_rows_affected(result.rows_affected()).applied() {
        return Err(ApiError::state_conflict(format!(
            "appointment {} not found or already processed",
            id
        )));
    }

    notify_client_of_transition(&state, id, rule.target).await;

    Ok(Json(json!({
        "success": true,
        "data": { "appointment_id": id, "status": rule.target },
    })))
}

/// Best-effort client notification; failures are logged, never propagated.
async fn notify_client_of_transition(state: &AppState, id: Uuid, status: &str) {
    let email: Option<(String,)> =
        match sqlx::query_as("SELECT client_email FROM appointments WHERE appointment_id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await
        {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!("appointment {} notification skipped: {}", id, e);
                return;
            }
        };
    let Some((email,)) = email else { return };

    let wording = match status {
        "cs_approved" => "has passed customer-service review",
        "sales_approved" => "is confirmed",
        _ => "was declined",
    };
    let note = Notification {
        message: format!("Your tour appointment {}", wording),
        icon: "calendar".to_string(),
        priority: Priority::Normal,
        link: format!("/appointments/{}", id),
    };
    if let Err(e) = notifier::notify_client(&state.db, &email, &note).await {
        tracing::warn!("appointment {} notification failed (non-critical): {}", id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sales_approval_expects_cs_approved_not_pending() {
        let rule = find_transition(TRANSITIONS, "sales_approved").unwrap();
        assert_eq!(rule.expected, &["cs_approved"]);
        assert!(!rule.expected.contains(&"pending"));
    }

    #[test]
    fn first_step_belongs_to_customer_service() {
        let rule = find_transition(TRANSITIONS, "cs_approved").unwrap();
        assert!(rule.allowed.contains(&Role::Admin));
        assert!(rule.allowed.contains(&Role::CustomerService));
        assert!(!rule.allowed.contains(&Role::SalesRepresentative));
        assert!(!rule.allowed.contains(&Role::Client));
    }

    #[test]
    fn second_step_belongs_to_sales() {
        let rule = find_transition(TRANSITIONS, "sales_approved").unwrap();
        assert!(rule.allowed.contains(&Role::Admin));
        assert!(rule.allowed.contains(&Role::SalesRepresentative));
        assert!(!rule.allowed.contains(&Role::CustomerService));
    }

    #[test]
    fn rejection_needs_a_reason_and_all_staff_may_do_it() {
        let rule = find_transition(TRANSITIONS, "rejected").unwrap();
        assert!(rule.requires_reason);
        assert_eq!(rule.allowed.len(), 3);
        assert!(rule.expected.contains(&"pending"));
        assert!(rule.expected.contains(&"cs_approved"));
        assert!(!rule.expected.contains(&"sales_approved"));
    }

    #[test]
    fn terminal_states_have_no_outgoing_transition() {
        assert!(find_transition(TRANSITIONS, "pending").is_none());
        assert!(find_transition(TRANSITIONS, "done").is_none());
    }
}
