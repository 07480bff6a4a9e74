use axum::{response::Json, Extension};
use serde_json::{json, Value};

use crate::middleware::auth::AuthUser;
use crate::middleware::route_access;

/// GET /api/routes/access - per-prefix access answers for the caller
///
/// Drives link visibility in the front end from the same table the gate
/// middleware enforces, so the two can never drift apart.
pub async fn my_access(Extension(user): Extension<AuthUser>) -> Json<Value> {
    let data: Vec<Value> = route_access::rules()
        .iter()
        .map(|rule| {
            json!({
                "prefix": rule.prefix,
                "allowed": rule.allowed.contains(&user.role),
            })
        })
        .collect();

    Json(json!({ "success": true, "data": data }))
}
