//! Persistence layer: webhook subscriptions and the delivery audit log.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use models::{CreateWebhook, CreateWebhookLogEntry, ResponseArm, Webhook, WebhookLogEntry};
pub use pool::DbPool;
