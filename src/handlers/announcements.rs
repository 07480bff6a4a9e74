use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::types::Role;

use super::{fetch_listing, filtered_listing, opt_str_field, require_fields, str_field};

fn valid_audience(candidate: &str) -> bool {
    candidate == "all" || Role::parse(candidate).is_some()
}

/// GET /api/announcements - admin view, drafts included
pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let (sql, args) = filtered_listing("announcements", &[], "created_at DESC");
    let data = fetch_listing(&state.db, &sql, &args).await?;

    Ok(Json(json!({ "success": true, "data": data })))
}

/// GET /announcements - public feed of published announcements
pub async fn public_feed(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let sql = "SELECT row_to_json(t) AS row FROM \
               (SELECT * FROM announcements WHERE published = true \
                ORDER BY created_at DESC) t";
    let data = fetch_listing(&state.db, sql, &[]).await?;

    Ok(Json(json!({ "success": true, "data": data })))
}

/// POST /api/announcements
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let title = str_field(&payload, "title");
    let body = str_field(&payload, "body");
    require_fields(&[("title", &title), ("body", &body)])?;

    let audience = opt_str_field(&payload, "audience").unwrap_or_else(|| "all".to_string());
    if !valid_audience(&audience) {
        return Err(ApiError::bad_request(format!(
            "invalid audience '{}'; use a role name or 'all'",
            audience
        )));
    }
    let published = payload
        .get("published")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO announcements \
         (announcement_id, title, body, image_url, audience, published, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $7)",
    )
    .bind(id)
    .bind(&title)
    .bind(&body)
    .bind(opt_str_field(&payload, "image_url"))
    .bind(&audience)
    .bind(published)
    .bind(now)
    .execute(&state.db)
    .await?;

    Ok(ApiResponse::created(json!({ "announcement_id": id, "published": published }))
        .with_message("announcement created"))
}

/// PUT /api/announcements/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let mut sets = Vec::new();
    let mut args: Vec<String> = Vec::new();

    for column in ["title", "body", "image_url"] {
        if let Some(value) = opt_str_field(&payload, column) {
            args.push(value);
            sets.push(format!("{} = ${}", column, args.len() + 1));
        }
    }
    if let Some(audience) = opt_str_field(&payload, "audience") {
        if !valid_audience(&audience) {
            return Err(ApiError::bad_request(format!(
                "invalid audience '{}'; use a role name or 'all'",
                audience
            )));
        }
        args.push(audience);
        sets.push(format!("audience = ${}", args.len() + 1));
    }
    let published = payload.get("published").and_then(Value::as_bool);

    if sets.is_empty() && published.is_none() {
        return Err(ApiError::bad_request("no updatable fields provided"));
    }

    let mut sql = format!(
        "UPDATE announcements SET {}updated_at = now()",
        if sets.is_empty() {
            String::new()
        } else {
            format!("{}, ", sets.join(", "))
        }
    );
    if published.is_some() {
        sql.push_str(&format!(", published = ${}", args.len() + 2));
    }
    sql.push_str(" WHERE announcement_id = $1");

    let mut query = sqlx::query(&sql).bind(id);
    for arg in &args {
        query = query.bind(arg);
    }
    if let Some(published) = published {
        query = query.bind(published);
    }
    let result = query.execute(&state.db).await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("announcement {} not found", id)));
    }

    Ok(ApiResponse::success(json!({ "announcement_id": id })).with_message("announcement updated"))
}

/// DELETE /api/announcements/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Value> {
    let result = sqlx::query("DELETE FROM announcements WHERE announcement_id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("announcement {} not found", id)));
    }

    Ok(ApiResponse::success(json!({ "announcement_id": id })).with_message("announcement deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audience_accepts_roles_and_all() {
        assert!(valid_audience("all"));
        assert!(valid_audience("client"));
        assert!(valid_audience("customer service"));
        assert!(!valid_audience("everyone"));
        assert!(!valid_audience(""));
    }
}
