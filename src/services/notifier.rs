use chrono::Utc;
use futures::future::join_all;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::Role;

/// One fan-out message. Rows land in the notifications table the front end
/// watches through the platform's realtime feed; nothing here polls.
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub icon: String,
    pub priority: Priority,
    pub link: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

/// Insert one notification row addressed to everyone holding a role.
///
/// Callers treat failures as non-critical: log with `warn!` and continue,
/// never fail the primary operation over a missing notification.
pub async fn notify_role(
    pool: &PgPool,
    role: Role,
    note: &Notification,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO notifications \
         (notification_id, recipient_role, recipient_email, message, icon, priority, link, is_read, created_at) \
         VALUES ($1, $2, NULL, $3, $4, $5, $6, false, $7)",
    )
    .bind(Uuid::new_v4())
    .bind(role.as_str())
    .bind(&note.message)
    .bind(&note.icon)
    .bind(note.priority.as_str())
    .bind(&note.link)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert one notification row addressed to a specific client email.
pub async fn notify_client(
    pool: &PgPool,
    email: &str,
    note: &Notification,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO notifications \
         (notification_id, recipient_role, recipient_email, message, icon, priority, link, is_read, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, false, $8)",
    )
    .bind(Uuid::new_v4())
    .bind(Role::Client.as_str())
    .bind(email)
    .bind(&note.message)
    .bind(&note.icon)
    .bind(note.priority.as_str())
    .bind(&note.link)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Fan a notification out to several staff roles concurrently. Returns the
/// first insert error, if any; partial delivery is acceptable to callers.
pub async fn notify_staff(
    pool: &PgPool,
    roles: &[Role],
    note: &Notification,
) -> Result<(), sqlx::Error> {
    let results = join_all(roles.iter().map(|role| notify_role(pool, *role, note))).await;
    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_names_are_lowercase() {
        assert_eq!(Priority::Low.as_str(), "low");
        assert_eq!(Priority::Normal.as_str(), "normal");
        assert_eq!(Priority::High.as_str(), "high");
    }
}
