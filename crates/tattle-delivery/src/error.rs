//! Error types for webhook delivery.

use thiserror::Error;
use uuid::Uuid;

/// Delivery failures, as recorded in the audit log's `error` column.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The target URL failed to parse or uses a forbidden scheme.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The target host is a private/internal address.
    #[error("Destination blocked: {0}")]
    SsrfDetected(String),

    /// Subscription validation failed (unknown event name, bad headers).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The endpoint answered with a failure status. The response is still
    /// recorded in the log entry.
    #[error("HTTP status error: {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// The request timed out before a response arrived.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// The connection could not be established.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The redirect policy was violated.
    #[error("Redirect error: {0}")]
    Redirect(String),

    /// Any other transport-level request failure.
    #[error("Request error: {0}")]
    Request(String),

    /// The payload could not be rendered in the subscription's format.
    #[error("Payload rendering failed: {0}")]
    Render(String),

    /// The object could not be re-loaded through its view.
    #[error("Payload loading failed: {0}")]
    Load(String),

    /// The subscription row vanished between fan-out and delivery.
    #[error("Subscription {0} no longer exists")]
    SubscriptionGone(Uuid),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl DeliveryError {
    /// Short code stored in the audit log's `error_code` column.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "InvalidURL",
            Self::SsrfDetected(_) => "DestinationBlocked",
            Self::Validation(_) => "ValidationError",
            Self::HttpStatus { .. } => "HTTPStatusError",
            Self::Timeout(_) => "Timeout",
            Self::Connect(_) => "ConnectionError",
            Self::Redirect(_) => "RedirectError",
            Self::Request(_) => "RequestError",
            Self::Render(_) => "RenderError",
            Self::Load(_) => "LoadError",
            Self::SubscriptionGone(_) => "SubscriptionGone",
            Self::Db(_) => "DatabaseError",
        }
    }

    /// Map a transport failure onto the taxonomy the audit log records.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let detail = err.to_string();
        if err.is_timeout() {
            Self::Timeout(detail)
        } else if err.is_connect() {
            Self::Connect(detail)
        } else if err.is_redirect() {
            Self::Redirect(detail)
        } else if err.is_builder() {
            // Malformed URL is the only builder input we hand reqwest.
            Self::InvalidUrl(detail)
        } else {
            Self::Request(detail)
        }
    }
}
