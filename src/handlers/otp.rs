use axum::{extract::State, response::Json};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::mailer::Mailer as _;
use crate::state::AppState;

use super::{str_field, valid_email};

const OTP_EXPIRY_MINUTES: i64 = 5;

/// 6-digit numeric code, zero-padded.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Why a present-but-unconsumed code did not verify.
#[derive(Debug, PartialEq, Eq)]
pub enum OtpRejection {
    AlreadyUsed,
    Expired,
    WrongCode,
}

impl OtpRejection {
    pub fn message(&self) -> &'static str {
        match self {
            OtpRejection::AlreadyUsed => "code already used",
            OtpRejection::Expired => "code has expired; request a new one",
            OtpRejection::WrongCode => "incorrect code",
        }
    }
}

/// Classify a failed attempt whose stored code matched the digits.
pub fn classify_rejection(
    verified: bool,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> OtpRejection {
    if verified {
        OtpRejection::AlreadyUsed
    } else if expires_at <= now {
        OtpRejection::Expired
    } else {
        OtpRejection::WrongCode
    }
}

/// POST /auth/otp/request - issue a fresh code by email
pub async fn request(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let email = normalize_email(&str_field(&payload, "email"));
    if !valid_email(&email) {
        return Err(ApiError::bad_request("a valid email address is required"));
    }

    // At most one live code per email: stale codes go before the new insert.
    sqlx::query("DELETE FROM otp_codes WHERE email = $1 AND verified = false")
        .bind(&email)
        .execute(&state.db)
        .await?;

    let code = generate_code();
    let now = Utc::now();
    let expires_at = now + Duration::minutes(OTP_EXPIRY_MINUTES);
    sqlx::query(
        "INSERT INTO otp_codes (otp_id, email, code, verified, expires_at, created_at) \
         VALUES ($1, $2, $3, false, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(&code)
    .bind(expires_at)
    .bind(now)
    .execute(&state.db)
    .await?;

    state
        .mailer
        .send(
            &email,
            "Your verification code",
            &format!(
                "Your one-time code is {}. It expires in {} minutes.",
                code, OTP_EXPIRY_MINUTES
            ),
        )
        .await?;

    Ok(Json(json!({ "success": true, "message": "verification code sent" })))
}

/// POST /auth/otp/verify - consume a code
pub async fn verify(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let email = normalize_email(&str_field(&payload, "email"));
    let code = str_field(&payload, "code");
    if email.is_empty() || code.is_empty() {
        return Err(ApiError::bad_request("email and code are required"));
    }

    let now = Utc::now();
    // The single-statement delete doubles as the single-use guard: of two
    // concurrent attempts, exactly one gets the row.
    let consumed = sqlx::query(
        "DELETE FROM otp_codes \
         WHERE email = $1 AND code = $2 AND verified = false AND expires_at > $3 \
         RETURNING otp_id",
    )
    .bind(&email)
    .bind(&code)
    .bind(now)
    .fetch_optional(&state.db)
    .await?;

    if consumed.is_some() {
        tracing::info!(%email, "OTP verified");
        return Ok(Json(json!({ "success": true, "message": "code verified" })));
    }

    // Wrong attempt: look at the latest candidate for this email to say why.
    let candidate: Option<(String, bool, DateTime<Utc>)> = sqlx::query_as(
        "SELECT code, verified, expires_at FROM otp_codes \
         WHERE email = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await?;

    match candidate {
        None => Err(ApiError::bad_request("invalid or unknown code")),
        Some((stored, verified, expires_at)) => {
            let rejection = if stored == code {
                classify_rejection(verified, expires_at, now)
            } else {
                OtpRejection::WrongCode
            };
            Err(ApiError::bad_request(rejection.message()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn emails_normalize_to_lowercase() {
        assert_eq!(normalize_email("  Ana.Lopez@Example.COM "), "ana.lopez@example.com");
    }

    #[test]
    fn rejection_classification_covers_all_three_reasons() {
        let now = Utc::now();
        let future = now + Duration::minutes(3);
        let past = now - Duration::minutes(1);

        assert_eq!(classify_rejection(true, future, now), OtpRejection::AlreadyUsed);
        assert_eq!(classify_rejection(false, past, now), OtpRejection::Expired);
        assert_eq!(classify_rejection(false, future, now), OtpRejection::WrongCode);
    }

    #[test]
    fn used_wins_over_expired() {
        let now = Utc::now();
        let past = now - Duration::minutes(10);
        assert_eq!(classify_rejection(true, past, now), OtpRejection::AlreadyUsed);
    }
}
