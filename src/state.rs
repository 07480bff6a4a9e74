use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::database::{self, DatabaseError};
use crate::services::mailer::{Mailer, RelayMailer};
use crate::services::verifier::BotVerifier;

/// Shared application state, constructed once in `main` and cloned into each
/// handler through axum's `State`. External-service clients live here rather
/// than in module-level globals so their lifecycle is explicit.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub mailer: Arc<dyn Mailer>,
    pub verifier: Arc<BotVerifier>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, DatabaseError> {
        let db = database::connect(&config.database)?;
        let mailer: Arc<dyn Mailer> = Arc::new(RelayMailer::new(&config.mail));
        let verifier = Arc::new(BotVerifier::new(&config.verification));

        Ok(Self {
            db,
            config: Arc::new(config),
            mailer,
            verifier,
        })
    }
}
