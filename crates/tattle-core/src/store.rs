//! Boundary traits between the engine and its host application.
//!
//! The engine never talks to a concrete data store or task queue. The host
//! implements these traits and invokes the [`Observer`] entry points from
//! its own write path.

use uuid::Uuid;

use crate::entity::{EntityType, Instance, Key};

/// Errors surfaced by a host data store while evaluating predicates or
/// loading rows.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The queried instance (or something it references) no longer exists.
    #[error("Stale reference: {0}")]
    StaleReference(String),

    /// A relationship path could not be walked against the store's schema.
    #[error("Unknown relation path: {0}")]
    UnknownPath(String),

    /// Any other store-specific failure.
    #[error("Store error: {0}")]
    Other(String),
}

/// Query-by-predicate and load-by-key access to the host's data store.
///
/// `roots_by_paths` is the typed form of the dynamic string-path query the
/// engine derives from a view: it must return every instance of `root`
/// reachable from `changed` along **any** of the given relationship paths
/// (segments are dot-joined, already spelled in the store's own query
/// vocabulary, reverse accessors included).
pub trait DataStore: Send + Sync {
    fn roots_by_paths(
        &self,
        root: &EntityType,
        paths: &[String],
        changed: &Instance,
    ) -> Result<Vec<Instance>, StoreError>;

    /// Load a single row by key. `None` when it no longer exists.
    fn load(&self, entity: &EntityType, key: &Key) -> Result<Option<Instance>, StoreError>;
}

/// Field/relationship metadata from the host's data store.
///
/// The resolver asks for the query segment that traverses `field` on
/// `entity`. Implementations must substitute the store's reverse-relationship
/// accessor when the field is declared on the "many" side but the foreign key
/// lives on the child type — that reverse accessor is the only way to walk
/// from a child instance back up to its root. Returning `None` means the
/// view's own field name is already the correct segment.
pub trait SchemaCatalog {
    fn relation_segment(&self, entity: &EntityType, field: &str) -> Option<String> {
        let _ = (entity, field);
        None
    }
}

/// A catalog with no substitutions: every view field name is already a valid
/// query segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCatalog;

impl SchemaCatalog for IdentityCatalog {}

/// A fully self-contained delivery request: ids and primitives only, safe to
/// hand to a task substrate that may run it later, elsewhere, out of order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    /// Full event name, `"<base_name>.<kind>"`.
    pub event: String,
    pub owner_id: Uuid,
    pub object_id: String,
    /// View to re-render the payload through at dispatch time;
    /// `None` for deletes (empty payload).
    pub view: Option<String>,
}

/// Fire-and-forget handoff to the asynchronous delivery substrate.
///
/// Implementations fan the request out to every matching subscription and
/// must never block or fail the caller's unit of work.
pub trait EventSink: Send + Sync {
    fn dispatch(&self, request: DispatchRequest);
}

/// The hook points a host application invokes from its write path.
///
/// `on_deleting` must be called *before* the row is removed, while owner
/// lookup and reverse-relationship traversal still work.
pub trait Observer {
    fn on_created(&mut self, instance: Instance);
    fn on_updated(&mut self, instance: Instance);
    fn on_relation_changed(&mut self, instance: Instance);
    fn on_deleting(&mut self, instance: Instance);
}
