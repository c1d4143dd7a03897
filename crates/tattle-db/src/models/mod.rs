//! Database models.

pub mod webhook;
pub mod webhook_log_entry;

pub use webhook::{CreateWebhook, Webhook};
pub use webhook_log_entry::{CreateWebhookLogEntry, ResponseArm, WebhookLogEntry};
