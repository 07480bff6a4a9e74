// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// Every error response uses the envelope `{ "success": false, "error": .. }`
/// so clients can branch on `success` without inspecting status codes.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    Validation {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    /// A conditional update matched no row: the target is missing or its
    /// status moved on since the caller last read it.
    StateConflict(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 502 Bad Gateway (mail relay, bot verification, other collaborators)
    Upstream(String),

    // 500 Internal Server Error
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Validation { .. } => 400,
            ApiError::StateConflict(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Upstream(_) => 502,
            ApiError::Internal(_) => 500,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Validation { message, .. } => message,
            ApiError::StateConflict(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Upstream(msg) => msg,
            ApiError::Internal(msg) => msg,
        }
    }

    /// Convert to the JSON error envelope
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::Validation {
                message,
                field_errors,
            } => {
                let mut response = json!({
                    "success": false,
                    "error": message,
                });
                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }
                response
            }
            _ => {
                json!({
                    "success": false,
                    "error": self.message(),
                })
            }
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::Validation {
            message: message.into(),
            field_errors,
        }
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        ApiError::StateConflict(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        ApiError::Upstream(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

// Convert other error types to ApiError
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::not_found("record not found"),
            other => {
                // Don't expose internal SQL errors to clients
                tracing::error!("database error: {}", other);
                ApiError::internal("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::services::mailer::MailError> for ApiError {
    fn from(err: crate::services::mailer::MailError) -> Self {
        tracing::error!("mail relay error: {}", err);
        ApiError::upstream("failed to deliver email; try again later")
    }
}

impl From<crate::services::verifier::VerifyError> for ApiError {
    fn from(err: crate::services::verifier::VerifyError) -> Self {
        use crate::services::verifier::VerifyError;
        match err {
            VerifyError::TokenMissing => {
                ApiError::bad_request("verification token is required")
            }
            VerifyError::LowScore { .. } => {
                ApiError::bad_request("verification failed; please retry the challenge")
            }
            VerifyError::Request(e) => {
                tracing::error!("bot verification request failed: {}", e);
                ApiError::upstream("verification service unavailable")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ApiError::bad_request("x").status_code(), 400);
        assert_eq!(ApiError::state_conflict("x").status_code(), 400);
        assert_eq!(ApiError::unauthorized("x").status_code(), 401);
        assert_eq!(ApiError::forbidden("x").status_code(), 403);
        assert_eq!(ApiError::not_found("x").status_code(), 404);
        assert_eq!(ApiError::upstream("x").status_code(), 502);
        assert_eq!(ApiError::internal("x").status_code(), 500);
    }

    #[test]
    fn envelope_is_success_false_with_error() {
        let v = ApiError::forbidden("role 'client' may not access /api/contracts").to_json();
        assert_eq!(v["success"], json!(false));
        assert!(v["error"].as_str().unwrap().contains("client"));
    }

    #[test]
    fn validation_envelope_carries_field_errors() {
        let mut fields = HashMap::new();
        fields.insert("client_email".to_string(), "This field is required".to_string());
        let v = ApiError::validation("Missing required fields", Some(fields)).to_json();
        assert_eq!(v["field_errors"]["client_email"], json!("This field is required"));
    }
}
