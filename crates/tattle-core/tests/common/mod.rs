//! In-memory test doubles for the engine's host-side traits.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use tattle_core::{
    DataStore, DispatchRequest, EntityType, EventSink, Instance, Key, SchemaCatalog, StoreError,
};

/// One relational hop a path segment can take.
#[derive(Debug, Clone)]
pub enum Step {
    /// The current row carries a foreign-key field naming one target row.
    Forward { field: String, target: EntityType },
    /// Target rows carry a foreign-key field naming the current row.
    Reverse { target: EntityType, fk_field: String },
    /// Many-to-many through a named link set, walked left to right.
    Link { name: String, target: EntityType },
}

#[derive(Default)]
struct Inner {
    rows: HashMap<EntityType, BTreeMap<String, serde_json::Value>>,
    schema: HashMap<(EntityType, String), Step>,
    links: HashMap<String, HashSet<(String, String)>>,
}

/// A toy relational store: rows keyed by string, schema declared per
/// (entity, path segment), m2m pairs in named link sets.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entity: impl Into<EntityType>, key: &str, data: serde_json::Value) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .rows
            .entry(entity.into())
            .or_default()
            .insert(key.to_string(), data);
    }

    pub fn remove(&self, entity: impl Into<EntityType>, key: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(rows) = inner.rows.get_mut(&entity.into()) {
            rows.remove(key);
        }
    }

    /// Declare how `segment` is walked from rows of `entity`.
    pub fn declare(&self, entity: impl Into<EntityType>, segment: &str, step: Step) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .schema
            .insert((entity.into(), segment.to_string()), step);
    }

    pub fn link(&self, name: &str, left: &str, right: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .links
            .entry(name.to_string())
            .or_default()
            .insert((left.to_string(), right.to_string()));
    }

    pub fn unlink(&self, name: &str, left: &str, right: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(pairs) = inner.links.get_mut(name) {
            pairs.remove(&(left.to_string(), right.to_string()));
        }
    }
}

impl Inner {
    fn instance_of(&self, entity: &EntityType, key: &str) -> Option<Instance> {
        self.rows
            .get(entity)
            .and_then(|rows| rows.get(key))
            .map(|data| Instance::new(entity.clone(), key, data.clone()))
    }

    /// Is `changed` reachable from the given root row along `path`?
    fn reachable(
        &self,
        root: &EntityType,
        root_key: &str,
        path: &str,
        changed: &Instance,
    ) -> Result<bool, StoreError> {
        let mut frontier: Vec<(EntityType, String)> = vec![(root.clone(), root_key.to_string())];

        for segment in path.split('.') {
            let mut next = Vec::new();
            for (entity, key) in &frontier {
                let step = self
                    .schema
                    .get(&(entity.clone(), segment.to_string()))
                    .ok_or_else(|| {
                        StoreError::UnknownPath(format!("{entity}.{segment} (in {path})"))
                    })?;
                match step {
                    Step::Forward { field, target } => {
                        let fk = self
                            .rows
                            .get(entity)
                            .and_then(|rows| rows.get(key))
                            .and_then(|data| data.get(field))
                            .and_then(|v| v.as_str());
                        if let Some(fk) = fk {
                            next.push((target.clone(), fk.to_string()));
                        }
                    }
                    Step::Reverse { target, fk_field } => {
                        if let Some(rows) = self.rows.get(target) {
                            for (tk, tdata) in rows {
                                if tdata.get(fk_field).and_then(|v| v.as_str()) == Some(key) {
                                    next.push((target.clone(), tk.clone()));
                                }
                            }
                        }
                    }
                    Step::Link { name, target } => {
                        if let Some(pairs) = self.links.get(name) {
                            for (left, right) in pairs {
                                if left == key {
                                    next.push((target.clone(), right.clone()));
                                }
                            }
                        }
                    }
                }
            }
            frontier = next;
        }

        Ok(frontier
            .iter()
            .any(|(entity, key)| entity == &changed.entity && key == changed.key.as_str()))
    }
}

impl DataStore for MemoryStore {
    fn roots_by_paths(
        &self,
        root: &EntityType,
        paths: &[String],
        changed: &Instance,
    ) -> Result<Vec<Instance>, StoreError> {
        let inner = self.inner.lock().unwrap();

        // Mirrors a relational store refusing to query against a row that
        // no longer exists.
        if inner.instance_of(&changed.entity, changed.key.as_str()).is_none() {
            return Err(StoreError::StaleReference(format!(
                "{} {} no longer exists",
                changed.entity, changed.key
            )));
        }

        let root_keys: Vec<String> = inner
            .rows
            .get(root)
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default();

        let mut out = Vec::new();
        for key in root_keys {
            for path in paths {
                if inner.reachable(root, &key, path, changed)? {
                    out.extend(inner.instance_of(root, &key));
                    break;
                }
            }
        }
        Ok(out)
    }

    fn load(&self, entity: &EntityType, key: &Key) -> Result<Option<Instance>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.instance_of(entity, key.as_str()))
    }
}

/// Catalog backed by an explicit (entity, field) -> segment map, standing in
/// for a host that substitutes reverse accessors.
#[derive(Default)]
pub struct MapCatalog {
    segments: HashMap<(EntityType, String), String>,
}

impl MapCatalog {
    pub fn with(mut self, entity: impl Into<EntityType>, field: &str, segment: &str) -> Self {
        self.segments
            .insert((entity.into(), field.to_string()), segment.to_string());
        self
    }
}

impl SchemaCatalog for MapCatalog {
    fn relation_segment(&self, entity: &EntityType, field: &str) -> Option<String> {
        self.segments
            .get(&(entity.clone(), field.to_string()))
            .cloned()
    }
}

/// Captures every dispatched request for assertion.
#[derive(Default)]
pub struct RecordingSink {
    requests: Mutex<Vec<DispatchRequest>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<DispatchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn dispatch(&self, request: DispatchRequest) {
        self.requests.lock().unwrap().push(request);
    }
}
