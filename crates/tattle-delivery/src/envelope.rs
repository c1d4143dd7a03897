//! Wire envelope for outgoing webhook bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tattle_core::DispatchRequest;
use uuid::Uuid;

/// The body POSTed to a subscription's target URL.
///
/// Key casing is part of the wire contract; consumers match on the
/// camelCase names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Subscription this delivery belongs to.
    pub webhook_id: Uuid,
    /// Fresh per delivery, for consumer-side dedup.
    pub event_id: Uuid,
    pub dispatched_at: DateTime<Utc>,
    pub owner_id: Uuid,
    /// Full event name, `"<base_name>.<kind>"`.
    pub event: String,
    pub object_id: String,
    /// Rendered view of the object; an empty object for deletes.
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new(webhook_id: Uuid, request: &DispatchRequest, payload: serde_json::Value) -> Self {
        Self {
            webhook_id,
            event_id: Uuid::new_v4(),
            dispatched_at: Utc::now(),
            owner_id: request.owner_id,
            event: request.event.clone(),
            object_id: request.object_id.clone(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> DispatchRequest {
        DispatchRequest {
            event: "order.created".to_string(),
            owner_id: Uuid::new_v4(),
            object_id: "42".to_string(),
            view: Some("OrderView".to_string()),
        }
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let envelope = Envelope::new(Uuid::new_v4(), &request(), json!({ "id": "42" }));
        let value = serde_json::to_value(&envelope).unwrap();
        let obj = value.as_object().unwrap();

        for key in [
            "webhookId",
            "eventId",
            "dispatchedAt",
            "ownerId",
            "event",
            "objectId",
            "payload",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert_eq!(obj["event"], "order.created");
        assert_eq!(obj["objectId"], "42");
    }

    #[test]
    fn deletes_carry_an_empty_object_payload() {
        let envelope = Envelope::new(Uuid::new_v4(), &request(), json!({}));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["payload"], json!({}));
    }

    #[test]
    fn event_id_is_fresh_per_delivery() {
        let req = request();
        let a = Envelope::new(Uuid::new_v4(), &req, json!({}));
        let b = Envelope::new(Uuid::new_v4(), &req, json!({}));
        assert_ne!(a.event_id, b.event_id);
    }
}
