use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail relay request failed: {0}")]
    Relay(#[from] reqwest::Error),

    #[error("mail relay rejected the message: {0}")]
    Rejected(String),
}

/// Outbound mail seam. The production implementation posts to the configured
/// relay; tests substitute a recording implementation.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// HTTP client for the external mail relay.
pub struct RelayMailer {
    http: reqwest::Client,
    relay_url: Option<String>,
    from_address: String,
}

impl RelayMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            relay_url: config.relay_url.clone(),
            from_address: config.from_address.clone(),
        }
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let Some(url) = &self.relay_url else {
            // No relay configured (local development): log instead of sending.
            tracing::info!(to, subject, "mail relay not configured; message logged only");
            return Ok(());
        };

        let response = self
            .http
            .post(url)
            .json(&json!({
                "from": self.from_address,
                "to": to,
                "subject": subject,
                "text": body,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MailError::Rejected(format!("status {}", response.status())));
        }

        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records sent messages for assertions instead of delivering them.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;

    #[tokio::test]
    async fn unconfigured_relay_logs_instead_of_failing() {
        let mailer = RelayMailer::new(&MailConfig {
            relay_url: None,
            from_address: "no-reply@domus.local".to_string(),
        });
        assert!(mailer.send("a@b.c", "subject", "body").await.is_ok());
    }

    #[tokio::test]
    async fn recording_mailer_captures_messages() {
        let mailer = RecordingMailer::default();
        mailer.send("a@b.c", "hello", "world").await.unwrap();
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "a@b.c");
    }
}
