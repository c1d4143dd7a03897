//! Value types for entities, instance snapshots, and mutation signals.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of an entity type in the host's data store (a table, a model).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Primary key of an entity instance, normalized to its string form
/// (the wire `objectId` is always a string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A snapshot of one entity row as seen by the host's write path.
///
/// `cached_owner` is populated by the change session just before a row is
/// deleted, while the relationships needed to resolve the owner still exist.
#[derive(Debug, Clone)]
pub struct Instance {
    pub entity: EntityType,
    pub key: Key,
    pub data: serde_json::Value,
    pub cached_owner: Option<Uuid>,
}

impl Instance {
    pub fn new(entity: impl Into<EntityType>, key: impl Into<Key>, data: serde_json::Value) -> Self {
        Self {
            entity: entity.into(),
            key: key.into(),
            data,
            cached_owner: None,
        }
    }
}

/// The kind of a raw mutation signal, and of the resulting webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    /// Event-name suffix (`"<base_name>.<kind>"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }

    /// Human-readable label used in event-choice titles.
    pub fn title(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw mutation notification collected during a session.
///
/// Ephemeral: created per mutation, consumed once at session close, never
/// persisted.
#[derive(Debug, Clone)]
pub struct Signal {
    pub instance: Instance,
    pub key: Key,
    pub kind: ChangeKind,
}

impl Signal {
    pub fn new(instance: Instance, kind: ChangeKind) -> Self {
        let key = instance.key.clone();
        Self {
            instance,
            key,
            kind,
        }
    }
}

/// Resolves the owner of an instance, or `None` when it has no owner
/// (and therefore no subscribers to notify).
pub type OwnerFn = Arc<dyn Fn(&Instance) -> Option<Uuid> + Send + Sync>;
