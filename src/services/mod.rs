pub mod mailer;
pub mod notifier;
pub mod receipts;
pub mod verifier;
