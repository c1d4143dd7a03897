//! The async seam between the synchronous engine and the delivery workers.
//!
//! [`QueueSink`] is the engine-facing end: an unbounded channel send, so
//! session close never blocks on delivery. The dispatcher task fans each
//! request out to every matching subscription and spawns one delivery task
//! per subscription, so a slow endpoint only delays its own consumer.

use std::sync::Arc;

use tattle_core::{DispatchRequest, EventSink};
use tattle_db::Webhook;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::worker::DeliveryWorker;

/// [`EventSink`] that enqueues requests onto the dispatcher.
#[derive(Clone)]
pub struct QueueSink {
    tx: mpsc::UnboundedSender<DispatchRequest>,
}

impl EventSink for QueueSink {
    fn dispatch(&self, request: DispatchRequest) {
        if let Err(e) = self.tx.send(request) {
            tracing::error!(
                target: "tattle_dispatch",
                event = %e.0.event,
                object_id = %e.0.object_id,
                "Dispatch queue is closed; dropping event"
            );
        }
    }
}

/// The dispatcher side of the queue.
pub struct DispatchQueue;

impl DispatchQueue {
    /// Spawn the dispatcher task. The returned handle completes when every
    /// sink clone has been dropped and the queue drained.
    pub fn start(worker: Arc<DeliveryWorker>) -> (QueueSink, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<DispatchRequest>();

        let handle = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let ids = match Webhook::ids_for_event(
                    worker.pool(),
                    request.owner_id,
                    &request.event,
                )
                .await
                {
                    Ok(ids) => ids,
                    Err(e) => {
                        tracing::error!(
                            target: "tattle_dispatch",
                            event = %request.event,
                            owner_id = %request.owner_id,
                            error = %e,
                            "Failed to query matching subscriptions"
                        );
                        continue;
                    }
                };

                if ids.is_empty() {
                    tracing::debug!(
                        target: "tattle_dispatch",
                        event = %request.event,
                        owner_id = %request.owner_id,
                        "No subscriptions match event"
                    );
                    continue;
                }

                for webhook_id in ids {
                    let worker = Arc::clone(&worker);
                    let request = request.clone();
                    tokio::spawn(async move {
                        worker.dispatch_serializer_event(webhook_id, &request).await;
                    });
                }
            }
        });

        (QueueSink { tx }, handle)
    }
}
