//! Common test utilities for tattle-delivery integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tattle_core::DispatchRequest;
use tattle_delivery::{LoaderError, ViewLoader};
use uuid::Uuid;
use wiremock::{Request, Respond, ResponseTemplate};

pub fn dispatch_request(
    owner_id: Uuid,
    event: &str,
    object_id: &str,
    view: Option<&str>,
) -> DispatchRequest {
    DispatchRequest {
        event: event.to_string(),
        owner_id,
        object_id: object_id.to_string(),
        view: view.map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// StaticLoader - canned view payloads
// ---------------------------------------------------------------------------

/// A [`ViewLoader`] backed by a (view, object_id) -> payload map.
#[derive(Default)]
pub struct StaticLoader {
    objects: Mutex<HashMap<(String, String), serde_json::Value>>,
}

impl StaticLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, view: &str, object_id: &str, payload: serde_json::Value) {
        self.objects
            .lock()
            .unwrap()
            .insert((view.to_string(), object_id.to_string()), payload);
    }

    pub fn remove(&self, view: &str, object_id: &str) {
        self.objects
            .lock()
            .unwrap()
            .remove(&(view.to_string(), object_id.to_string()));
    }
}

#[async_trait]
impl ViewLoader for StaticLoader {
    async fn load(
        &self,
        view: &str,
        object_id: &str,
    ) -> Result<Option<serde_json::Value>, LoaderError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(&(view.to_string(), object_id.to_string()))
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// CaptureResponder - captures requests for inspection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl CapturedRequest {
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("captured body is not JSON")
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == lower)
            .map(|(_, v)| v.as_str())
    }
}

/// A wiremock responder that captures incoming requests. Bodies are
/// answered as `application/json` unless overridden.
#[derive(Clone)]
pub struct CaptureResponder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    response_code: u16,
    response_body: Option<String>,
    response_content_type: String,
}

impl CaptureResponder {
    pub fn new() -> Self {
        Self::with_status(200)
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            response_code: status,
            response_body: None,
            response_content_type: "application/json".to_string(),
        }
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.response_body = Some(body.to_string());
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.response_content_type = content_type.to_string();
        self
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for CaptureResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl Respond for CaptureResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let captured = CapturedRequest {
            body: request.body.clone(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect(),
        };
        self.requests.lock().unwrap().push(captured);

        let template = ResponseTemplate::new(self.response_code);
        match &self.response_body {
            Some(body) => template.set_body_raw(
                body.clone().into_bytes(),
                &self.response_content_type,
            ),
            None => template,
        }
    }
}

// ---------------------------------------------------------------------------
// DelayedResponder - for timeout tests
// ---------------------------------------------------------------------------

/// A wiremock responder that waits before answering.
#[derive(Clone)]
pub struct DelayedResponder {
    delay_ms: u64,
}

impl DelayedResponder {
    pub fn new(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

impl Respond for DelayedResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200).set_delay(std::time::Duration::from_millis(self.delay_ms))
    }
}

// ---------------------------------------------------------------------------
// Database setup (integration tests only)
// ---------------------------------------------------------------------------

#[cfg(feature = "integration")]
pub async fn setup_pool() -> sqlx::PgPool {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to run integration tests");
    let pool = sqlx::PgPool::connect(&url)
        .await
        .expect("failed to connect to test database");
    tattle_db::run_migrations(&tattle_db::DbPool::from_pool(pool.clone()))
        .await
        .expect("failed to run migrations");
    pool
}
