//! Webhook subscription model.
//!
//! A subscription binds an owner to a target URL and the set of event names
//! it wants delivered there. The target method, content type, and extra
//! headers are all subscriber-configured.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A webhook subscription.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Webhook {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Full event names (`"<base_name>.<kind>"`) this subscription matches.
    pub events: Vec<String>,
    pub target_url: String,
    /// Lowercase HTTP verb: one of `get`, `put`, `post`, `patch`, `delete`.
    pub target_method: String,
    /// Payload format: `application/json` or `application/xml`.
    pub target_content_type: String,
    /// Extra HTTP headers sent with every delivery (JSON object of
    /// string-to-string).
    pub target_headers: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a new webhook subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWebhook {
    pub owner_id: Uuid,
    pub events: Vec<String>,
    pub target_url: String,
    #[serde(default = "default_method")]
    pub target_method: String,
    #[serde(default = "default_content_type")]
    pub target_content_type: String,
    #[serde(default = "default_headers")]
    pub target_headers: serde_json::Value,
}

fn default_method() -> String {
    "post".to_string()
}

fn default_content_type() -> String {
    "application/json".to_string()
}

fn default_headers() -> serde_json::Value {
    serde_json::json!({})
}

impl Webhook {
    pub async fn create(pool: &sqlx::PgPool, req: CreateWebhook) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO webhooks
                (owner_id, events, target_url, target_method, target_content_type, target_headers)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(req.owner_id)
        .bind(&req.events)
        .bind(&req.target_url)
        .bind(&req.target_method)
        .bind(&req.target_content_type)
        .bind(&req.target_headers)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM webhooks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Ids of every subscription of `owner_id` matching `event`.
    ///
    /// This is the fan-out query: the dispatcher spawns one delivery per
    /// returned id and each delivery re-loads its subscription, so a
    /// subscription deleted mid-flight is simply skipped.
    pub async fn ids_for_event(
        pool: &sqlx::PgPool,
        owner_id: Uuid,
        event: &str,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM webhooks
            WHERE owner_id = $1 AND $2 = ANY(events)
            "#,
        )
        .bind(owner_id)
        .bind(event)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn list_by_owner(
        pool: &sqlx::PgPool,
        owner_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM webhooks
            WHERE owner_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }

    /// Delete a subscription. Returns false when it did not exist.
    pub async fn delete(pool: &sqlx::PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM webhooks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
