use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde_json::{json, Value};
use sqlx::Row;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// GET /api/notifications - the caller's feed, newest first
///
/// Role-wide rows have no recipient email; personal rows must match the
/// caller's address.
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let rows = sqlx::query(
        "SELECT row_to_json(t) AS row FROM \
         (SELECT * FROM notifications \
          WHERE recipient_role = $1 AND (recipient_email IS NULL OR recipient_email = $2) \
          ORDER BY created_at DESC LIMIT 100) t",
    )
    .bind(user.role.as_str())
    .bind(&user.email)
    .fetch_all(&state.db)
    .await?;

    let data: Vec<Value> = rows
        .iter()
        .map(|row| row.try_get("row").unwrap_or(Value::Null))
        .collect();

    Ok(Json(json!({ "success": true, "data": data })))
}

/// PATCH /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = true \
         WHERE notification_id = $1 AND recipient_role = $2 \
           AND (recipient_email IS NULL OR recipient_email = $3)",
    )
    .bind(id)
    .bind(user.role.as_str())
    .bind(&user.email)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("notification {} not found", id)));
    }

    Ok(Json(json!({
        "success": true,
        "data": { "notification_id": id, "is_read": true },
    })))
}

/// DELETE /api/notifications/:id
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let result = sqlx::query(
        "DELETE FROM notifications \
         WHERE notification_id = $1 AND recipient_role = $2 \
           AND (recipient_email IS NULL OR recipient_email = $3)",
    )
    .bind(id)
    .bind(user.role.as_str())
    .bind(&user.email)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("notification {} not found", id)));
    }

    Ok(Json(json!({ "success": true, "message": "notification deleted" })))
}
