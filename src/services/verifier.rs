use serde::Deserialize;
use thiserror::Error;

use crate::config::VerificationConfig;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("verification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("verification token missing")]
    TokenMissing,

    #[error("verification score {score:.2} below threshold {threshold:.2}")]
    LowScore { score: f64, threshold: f64 },
}

/// Client for the third-party bot-verification scoring service, consulted
/// before accepting public form submissions. Disabled when no secret is
/// configured.
pub struct BotVerifier {
    http: reqwest::Client,
    verify_url: String,
    secret: Option<String>,
    threshold: f64,
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    success: bool,
    score: Option<f64>,
}

impl BotVerifier {
    pub fn new(config: &VerificationConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            verify_url: config.verify_url.clone(),
            secret: config.secret.clone(),
            threshold: config.score_threshold,
        }
    }

    /// Check a challenge token against the scoring service.
    ///
    /// No configured secret means verification is off and every submission
    /// passes; otherwise the token is required and its score must reach the
    /// configured threshold.
    pub async fn check(&self, token: Option<&str>) -> Result<(), VerifyError> {
        let Some(secret) = &self.secret else {
            return Ok(());
        };
        let token = token.ok_or(VerifyError::TokenMissing)?;

        let response: ScoreResponse = self
            .http
            .post(&self.verify_url)
            .form(&[("secret", secret.as_str()), ("response", token)])
            .send()
            .await?
            .json()
            .await?;

        let score = if response.success {
            response.score.unwrap_or(0.0)
        } else {
            0.0
        };

        if score < self.threshold {
            return Err(VerifyError::LowScore {
                score,
                threshold: self.threshold,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled_config() -> VerificationConfig {
        VerificationConfig {
            verify_url: "https://challenge.example.com/api/siteverify".to_string(),
            secret: None,
            score_threshold: 0.5,
        }
    }

    #[tokio::test]
    async fn disabled_verifier_passes_everything() {
        let verifier = BotVerifier::new(&disabled_config());
        assert!(verifier.check(None).await.is_ok());
        assert!(verifier.check(Some("anything")).await.is_ok());
    }

    #[tokio::test]
    async fn configured_verifier_requires_a_token() {
        let mut config = disabled_config();
        config.secret = Some("site-secret".to_string());
        let verifier = BotVerifier::new(&config);
        assert!(matches!(
            verifier.check(None).await,
            Err(VerifyError::TokenMissing)
        ));
    }
}
