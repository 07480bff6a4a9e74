use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

use super::{fetch_listing, filtered_listing};

/// GET /api/roles - the flat role lookup table
pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let (sql, args) = filtered_listing("roles", &[], "rolename ASC");
    let data = fetch_listing(&state.db, &sql, &args).await?;

    Ok(Json(json!({ "success": true, "data": data })))
}
