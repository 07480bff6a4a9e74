use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Aggregate configuration, loaded once in `main` and carried inside the
/// application state. Environment defaults first, specific env vars second.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub mail: MailConfig,
    pub verification: VerificationConfig,
    pub billing: BillingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Relay endpoint; when unset, outbound mail is logged instead of sent.
    pub relay_url: Option<String>,
    pub from_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    pub verify_url: String,
    /// When unset, bot verification is skipped entirely.
    pub secret: Option<String>,
    pub score_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Default reservation fee when the approval request does not name one.
    pub reservation_fee: Decimal,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("SERVER_PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("SERVER_ENABLE_CORS") {
            self.server.enable_cors = v.parse().unwrap_or(self.server.enable_cors);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_ACQUIRE_TIMEOUT_SECS") {
            self.database.acquire_timeout_secs =
                v.parse().unwrap_or(self.database.acquire_timeout_secs);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        // Mail overrides
        if let Ok(v) = env::var("MAIL_RELAY_URL") {
            self.mail.relay_url = if v.is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = env::var("MAIL_FROM_ADDRESS") {
            self.mail.from_address = v;
        }

        // Bot verification overrides
        if let Ok(v) = env::var("VERIFICATION_URL") {
            self.verification.verify_url = v;
        }
        if let Ok(v) = env::var("VERIFICATION_SECRET") {
            self.verification.secret = if v.is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = env::var("VERIFICATION_SCORE_THRESHOLD") {
            self.verification.score_threshold =
                v.parse().unwrap_or(self.verification.score_threshold);
        }

        // Billing overrides
        if let Ok(v) = env::var("BILLING_RESERVATION_FEE") {
            self.billing.reservation_fee =
                Decimal::from_str(&v).unwrap_or(self.billing.reservation_fee);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                enable_cors: true,
            },
            database: DatabaseConfig {
                max_connections: 10,
                acquire_timeout_secs: 30,
            },
            security: SecurityConfig {
                jwt_secret: "dev-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
            },
            mail: MailConfig {
                relay_url: None,
                from_address: "no-reply@domus.local".to_string(),
            },
            verification: VerificationConfig {
                verify_url: "https://challenge.example.com/api/siteverify".to_string(),
                secret: None,
                score_threshold: 0.5,
            },
            billing: BillingConfig {
                reservation_fee: Decimal::new(50000, 2), // 500.00
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                enable_cors: true,
            },
            database: DatabaseConfig {
                max_connections: 20,
                acquire_timeout_secs: 10,
            },
            security: SecurityConfig {
                // Must be provided via SECURITY_JWT_SECRET; empty disables auth outright
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
            },
            mail: MailConfig {
                relay_url: None,
                from_address: "no-reply@staging.domus.example.com".to_string(),
            },
            verification: VerificationConfig {
                verify_url: "https://challenge.example.com/api/siteverify".to_string(),
                secret: None,
                score_threshold: 0.5,
            },
            billing: BillingConfig {
                reservation_fee: Decimal::new(50000, 2),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                enable_cors: false,
            },
            database: DatabaseConfig {
                max_connections: 50,
                acquire_timeout_secs: 5,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
            },
            mail: MailConfig {
                relay_url: None,
                from_address: "no-reply@domus.example.com".to_string(),
            },
            verification: VerificationConfig {
                verify_url: "https://challenge.example.com/api/siteverify".to_string(),
                secret: None,
                score_threshold: 0.5,
            },
            billing: BillingConfig {
                reservation_fee: Decimal::new(50000, 2),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = AppConfig::development();
        assert_eq!(config.server.port, 3000);
        assert!(config.verification.secret.is_none());
        assert_eq!(config.verification.score_threshold, 0.5);
        assert_eq!(config.billing.reservation_fee, Decimal::new(50000, 2));
    }

    #[test]
    fn production_requires_explicit_secret() {
        let config = AppConfig::production();
        assert!(config.security.jwt_secret.is_empty());
        assert!(!config.server.enable_cors);
    }
}
