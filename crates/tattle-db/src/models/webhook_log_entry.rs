//! Delivery audit log.
//!
//! Every delivery attempt writes a pending row (request arm only) before the
//! HTTP request goes out, then settles it at most once with either the
//! response arm or the error arm. A crash mid-delivery leaves the pending
//! row as evidence. The row id is the envelope's event id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One delivery attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookLogEntry {
    /// The envelope's event id.
    pub id: Uuid,
    /// Nulled when the subscription is deleted; the entry itself survives.
    pub webhook_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub event: String,
    pub object_id: String,
    pub req_at: DateTime<Utc>,
    pub req_url: String,
    pub req_method: String,
    pub req_headers: Option<serde_json::Value>,
    /// Structured request body; populated for JSON payloads only.
    pub req_data: Option<serde_json::Value>,
    /// Request body exactly as sent.
    pub req_content: Option<String>,
    pub res_at: Option<DateTime<Utc>>,
    pub res_status: Option<i32>,
    pub res_headers: Option<serde_json::Value>,
    /// Response body as received, truncated.
    pub res_content: Option<String>,
    /// Response body parsed best-effort by content type.
    pub res_data: Option<serde_json::Value>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// Request to open a pending log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWebhookLogEntry {
    /// The envelope's event id.
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub owner_id: Uuid,
    pub event: String,
    pub object_id: String,
    pub req_url: String,
    pub req_method: String,
    pub req_headers: Option<serde_json::Value>,
    pub req_data: Option<serde_json::Value>,
    pub req_content: Option<String>,
}

/// The response arm of an attempt, recorded whether the status was a
/// success or a failure.
#[derive(Debug, Clone)]
pub struct ResponseArm {
    pub status: i32,
    pub headers: serde_json::Value,
    pub content: String,
    pub data: Option<serde_json::Value>,
}

impl WebhookLogEntry {
    /// Write the pending row. Called before the HTTP request is attempted.
    pub async fn create_pending(
        pool: &sqlx::PgPool,
        req: CreateWebhookLogEntry,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO webhook_log_entries
                (id, webhook_id, owner_id, event, object_id,
                 req_url, req_method, req_headers, req_data, req_content)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(req.id)
        .bind(req.webhook_id)
        .bind(req.owner_id)
        .bind(&req.event)
        .bind(&req.object_id)
        .bind(&req.req_url)
        .bind(&req.req_method)
        .bind(&req.req_headers)
        .bind(&req.req_data)
        .bind(&req.req_content)
        .fetch_one(pool)
        .await
    }

    /// Settle the entry with a successful response.
    pub async fn record_response(
        pool: &sqlx::PgPool,
        id: Uuid,
        response: ResponseArm,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_log_entries
            SET res_at = now(), res_status = $2, res_headers = $3,
                res_content = $4, res_data = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(response.status)
        .bind(&response.headers)
        .bind(&response.content)
        .bind(&response.data)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Settle the entry with an error. The response arm is still recorded
    /// when the failure was an HTTP status rather than a transport fault.
    pub async fn record_error(
        pool: &sqlx::PgPool,
        id: Uuid,
        error_code: &str,
        error_message: &str,
        response: Option<ResponseArm>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_log_entries
            SET error_code = $2, error_message = $3,
                res_at = CASE WHEN $4::int IS NULL THEN res_at ELSE now() END,
                res_status = $4, res_headers = $5, res_content = $6, res_data = $7
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error_code)
        .bind(error_message)
        .bind(response.as_ref().map(|r| r.status))
        .bind(response.as_ref().map(|r| &r.headers))
        .bind(response.as_ref().map(|r| &r.content))
        .bind(response.as_ref().and_then(|r| r.data.as_ref()))
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM webhook_log_entries
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_for_webhook(
        pool: &sqlx::PgPool,
        webhook_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM webhook_log_entries
            WHERE webhook_id = $1
            ORDER BY req_at
            "#,
        )
        .bind(webhook_id)
        .fetch_all(pool)
        .await
    }

    /// Drop entries whose request predates `cutoff`. Returns the number
    /// purged.
    pub async fn purge_older_than(
        pool: &sqlx::PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM webhook_log_entries
            WHERE req_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
