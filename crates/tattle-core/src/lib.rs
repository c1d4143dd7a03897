//! Change-aggregation engine for relational webhook notifications.
//!
//! Hosts report raw entity mutations (created, updated, deleted, relation
//! changed) into a [`ChangeSession`]; at session close the engine maps each
//! mutation to the root instances whose serialized views it affects and
//! emits at most one webhook event per root, with deletes beating creates
//! beating updates.
//!
//! The engine owns no I/O. The host supplies a [`DataStore`] for
//! relationship queries, a [`SchemaCatalog`] for reverse-accessor
//! substitution, and an [`EventSink`] that carries self-contained
//! [`DispatchRequest`]s to an asynchronous delivery substrate.

mod classify;
pub mod config;
pub mod entity;
pub mod registration;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod store;
pub mod view;

pub use config::EngineConfig;
pub use entity::{ChangeKind, EntityType, Instance, Key, OwnerFn, Signal};
pub use registration::Registration;
pub use registry::{
    RegistrationHandle, RegistrationOptions, Registry, RegistryError, SuspendGuard,
};
pub use resolver::{DerivedPaths, GetterFn, RootQuery, SkippedRelation};
pub use session::{ChangeSession, SessionScope, SessionState};
pub use store::{
    DataStore, DispatchRequest, EventSink, IdentityCatalog, Observer, SchemaCatalog, StoreError,
};
pub use view::{Cardinality, EntityView, ViewRelation};
