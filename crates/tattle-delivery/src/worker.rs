//! Delivery execution: one HTTP request per (event, subscription), with a
//! pending audit row written before the request and settled after.

use std::sync::Arc;

use reqwest::{Client, Method};
use sqlx::PgPool;
use tattle_core::DispatchRequest;
use uuid::Uuid;

use tattle_db::{CreateWebhookLogEntry, ResponseArm, Webhook, WebhookLogEntry};

use crate::config::DeliveryConfig;
use crate::envelope::Envelope;
use crate::error::DeliveryError;
use crate::loader::ViewLoader;
use crate::render::{parse_response_body, RendererRegistry};
use crate::validation;

/// Executes deliveries against subscription targets.
#[derive(Clone)]
pub struct DeliveryWorker {
    pool: PgPool,
    http: Client,
    renderers: RendererRegistry,
    loader: Arc<dyn ViewLoader>,
    config: DeliveryConfig,
}

impl DeliveryWorker {
    pub fn new(
        pool: PgPool,
        loader: Arc<dyn ViewLoader>,
        config: DeliveryConfig,
    ) -> Result<Self, DeliveryError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| DeliveryError::Request(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            pool,
            http,
            renderers: RendererRegistry::default(),
            loader,
            config,
        })
    }

    pub fn with_renderers(mut self, renderers: RendererRegistry) -> Self {
        self.renderers = renderers;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Deliver, re-rendering the payload through the request's view at
    /// dispatch time. Deletes (no view) go out with an empty object payload.
    ///
    /// Failures are logged and recorded in the audit row; they never
    /// propagate to the dispatcher.
    pub async fn dispatch_serializer_event(&self, webhook_id: Uuid, request: &DispatchRequest) {
        let payload = match &request.view {
            Some(view) => match self.loader.load(view, &request.object_id).await {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    // Object gone by the time the queue got here; nothing
                    // left to deliver.
                    tracing::warn!(
                        target: "tattle_delivery",
                        webhook_id = %webhook_id,
                        event = %request.event,
                        object_id = %request.object_id,
                        view = %view,
                        "Object no longer exists; dropping delivery"
                    );
                    return;
                }
                Err(e) => {
                    tracing::error!(
                        target: "tattle_delivery",
                        webhook_id = %webhook_id,
                        event = %request.event,
                        object_id = %request.object_id,
                        view = %view,
                        error = %e,
                        "Failed to load payload; dropping delivery"
                    );
                    return;
                }
            },
            None => serde_json::json!({}),
        };

        self.dispatch_event(webhook_id, request, payload).await;
    }

    /// Deliver with an explicit payload.
    pub async fn dispatch_event(
        &self,
        webhook_id: Uuid,
        request: &DispatchRequest,
        payload: serde_json::Value,
    ) {
        if let Err(e) = self.try_dispatch(webhook_id, request, payload).await {
            tracing::warn!(
                target: "tattle_delivery",
                webhook_id = %webhook_id,
                event = %request.event,
                object_id = %request.object_id,
                error = %e,
                "Webhook delivery failed"
            );
        }
    }

    async fn try_dispatch(
        &self,
        webhook_id: Uuid,
        request: &DispatchRequest,
        payload: serde_json::Value,
    ) -> Result<(), DeliveryError> {
        let Some(webhook) = Webhook::find_by_id(&self.pool, webhook_id).await? else {
            // Deleted between fan-out and execution; not an error.
            tracing::warn!(
                target: "tattle_delivery",
                webhook_id = %webhook_id,
                event = %request.event,
                "Subscription no longer exists; dropping delivery"
            );
            return Ok(());
        };

        // Re-validated on every delivery: the table may predate a tightening
        // of the rules, and DNS for a once-valid host can change.
        validation::validate_target_url(
            &webhook.target_url,
            self.config.allow_http,
            self.config.allow_internal_hosts,
        )?;
        let method = parse_method(&webhook.target_method)?;

        let renderer = self.renderers.get(&webhook.target_content_type).ok_or_else(|| {
            DeliveryError::Render(format!(
                "No renderer for content type {}",
                webhook.target_content_type
            ))
        })?;

        let envelope = Envelope::new(webhook.id, request, payload);
        let body = renderer.render(&envelope)?;

        // The exact headers that go on the wire, recorded alongside the body.
        let mut headers = serde_json::Map::new();
        headers.insert(
            "Content-Type".to_string(),
            serde_json::Value::from(renderer.content_type()),
        );
        if let Some(custom) = webhook.target_headers.as_object() {
            for (name, value) in custom {
                if name.eq_ignore_ascii_case("content-type") {
                    continue;
                }
                if let Some(value) = value.as_str() {
                    headers.insert(name.clone(), serde_json::Value::from(value));
                }
            }
        }

        // Structured copy of the body, for JSON payloads only.
        let req_data = if renderer.content_type() == "application/json" {
            serde_json::to_value(&envelope).ok()
        } else {
            None
        };

        let entry = WebhookLogEntry::create_pending(
            &self.pool,
            CreateWebhookLogEntry {
                id: envelope.event_id,
                webhook_id: webhook.id,
                owner_id: request.owner_id,
                event: request.event.clone(),
                object_id: request.object_id.clone(),
                req_url: webhook.target_url.clone(),
                req_method: webhook.target_method.clone(),
                req_headers: Some(serde_json::Value::Object(headers.clone())),
                req_data,
                req_content: Some(body.clone()),
            },
        )
        .await?;

        let mut http_request = self.http.request(method, &webhook.target_url);
        for (name, value) in &headers {
            if let Some(value) = value.as_str() {
                http_request = http_request.header(name.as_str(), value);
            }
        }

        let result = http_request.body(body).send().await;

        match result {
            Ok(response) => {
                let status = response.status();
                let res_content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let res_headers: serde_json::Map<String, serde_json::Value> = response
                    .headers()
                    .iter()
                    .map(|(k, v)| {
                        (
                            k.to_string(),
                            serde_json::Value::from(v.to_str().unwrap_or_default()),
                        )
                    })
                    .collect();
                // Parse the full body; only the stored copy is capped.
                let text = response.text().await.unwrap_or_default();
                let data = parse_response_body(res_content_type.as_deref(), &text);
                let content: String = text.chars().take(self.config.response_body_cap).collect();
                let arm = ResponseArm {
                    status: i32::from(status.as_u16()),
                    headers: serde_json::Value::Object(res_headers),
                    data,
                    content,
                };

                if status.is_client_error() || status.is_server_error() {
                    let err = DeliveryError::HttpStatus {
                        status: status.as_u16(),
                        url: webhook.target_url.clone(),
                    };
                    WebhookLogEntry::record_error(
                        &self.pool,
                        entry.id,
                        err.code(),
                        &err.to_string(),
                        Some(arm),
                    )
                    .await?;
                    return Err(err);
                }

                WebhookLogEntry::record_response(&self.pool, entry.id, arm).await?;
                tracing::info!(
                    target: "tattle_delivery",
                    webhook_id = %webhook.id,
                    event = %request.event,
                    object_id = %request.object_id,
                    status = status.as_u16(),
                    "Webhook delivered"
                );
                Ok(())
            }
            Err(e) => {
                let err = DeliveryError::from_transport(&e);
                WebhookLogEntry::record_error(
                    &self.pool,
                    entry.id,
                    err.code(),
                    &err.to_string(),
                    None,
                )
                .await?;
                Err(err)
            }
        }
    }
}

fn parse_method(method: &str) -> Result<Method, DeliveryError> {
    match method.to_ascii_lowercase().as_str() {
        "get" => Ok(Method::GET),
        "put" => Ok(Method::PUT),
        "post" => Ok(Method::POST),
        "patch" => Ok(Method::PATCH),
        "delete" => Ok(Method::DELETE),
        other => Err(DeliveryError::Validation(format!(
            "Unsupported HTTP method: {other}"
        ))),
    }
}
