//! Dispatch-time payload loading.
//!
//! Payloads are rendered when the delivery runs, not when the event was
//! queued: the consumer gets the current state of the object, however long
//! the request sat in the queue.

use async_trait::async_trait;

/// Renders the current state of an object through a named view.
///
/// The host side owns both the views and the data, so it implements this.
/// `Ok(None)` means the object no longer exists; the delivery is dropped
/// with a warning rather than failed.
#[async_trait]
pub trait ViewLoader: Send + Sync {
    async fn load(
        &self,
        view: &str,
        object_id: &str,
    ) -> Result<Option<serde_json::Value>, LoaderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// No view registered under this name.
    #[error("Unknown view: {0}")]
    UnknownView(String),

    #[error("Load failed: {0}")]
    Other(String),
}
