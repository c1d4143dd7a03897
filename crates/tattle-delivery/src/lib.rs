//! Asynchronous webhook delivery.
//!
//! Takes the self-contained [`DispatchRequest`]s the engine emits, fans each
//! one out to every matching subscription, renders the payload at dispatch
//! time, sends it with the subscription's configured method and headers,
//! and records every attempt in the audit log.
//!
//! [`DispatchRequest`]: tattle_core::DispatchRequest

pub mod config;
pub mod envelope;
pub mod error;
pub mod loader;
pub mod maintenance;
pub mod queue;
pub mod render;
pub mod validation;
pub mod worker;

pub use config::DeliveryConfig;
pub use envelope::Envelope;
pub use error::DeliveryError;
pub use loader::{LoaderError, ViewLoader};
pub use queue::{DispatchQueue, QueueSink};
pub use render::{JsonRenderer, PayloadRenderer, RendererRegistry, XmlRenderer};
pub use worker::DeliveryWorker;
