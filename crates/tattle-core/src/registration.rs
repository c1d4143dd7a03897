//! A registration binds a root entity type and its view to webhook events.

use std::collections::HashMap;

use crate::entity::{ChangeKind, EntityType, Instance, OwnerFn};
use crate::resolver::RootQuery;
use crate::store::{DispatchRequest, EventSink};
use crate::view::EntityView;
use uuid::Uuid;

/// One live webhook registration: a root entity type, its nested-entity
/// view, the event family it emits, and the relationship getters that map
/// nested changes back to root instances.
pub struct Registration {
    root: EntityType,
    view: EntityView,
    base_name: String,
    /// Title-cased root name, used in event-choice labels.
    label: String,
    create: bool,
    update: bool,
    delete: bool,
    owner_getter: OwnerFn,
    getters: HashMap<EntityType, RootQuery>,
}

impl Registration {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        root: EntityType,
        view: EntityView,
        base_name: String,
        label: String,
        create: bool,
        update: bool,
        delete: bool,
        owner_getter: OwnerFn,
        getters: HashMap<EntityType, RootQuery>,
    ) -> Self {
        Self {
            root,
            view,
            base_name,
            label,
            create,
            update,
            delete,
            owner_getter,
            getters,
        }
    }

    pub fn root(&self) -> &EntityType {
        &self.root
    }

    pub fn view(&self) -> &EntityView {
        &self.view
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub fn kind_enabled(&self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Created => self.create,
            ChangeKind::Updated => self.update,
            ChangeKind::Deleted => self.delete,
        }
    }

    pub(crate) fn enabled_kinds(&self) -> impl Iterator<Item = ChangeKind> + '_ {
        [ChangeKind::Created, ChangeKind::Updated, ChangeKind::Deleted]
            .into_iter()
            .filter(|kind| self.kind_enabled(*kind))
    }

    /// Full event name for a kind: `"<base_name>.<kind>"`.
    pub fn event_name(&self, kind: ChangeKind) -> String {
        format!("{}.{}", self.base_name, kind)
    }

    /// The getter for a nested entity type, if the view (or an override)
    /// covers it.
    pub fn getter(&self, entity: &EntityType) -> Option<&RootQuery> {
        self.getters.get(entity)
    }

    /// Resolve an instance's owner without consulting the pre-delete cache.
    pub fn resolve_owner(&self, instance: &Instance) -> Option<Uuid> {
        (self.owner_getter)(instance)
    }

    /// Resolve an instance's owner, preferring the value cached before a
    /// deletion made live lookup impossible.
    pub fn owner_of(&self, instance: &Instance) -> Option<Uuid> {
        instance
            .cached_owner
            .or_else(|| self.resolve_owner(instance))
    }

    /// Emit one notification for `instance`, handing a self-contained
    /// request to the delivery substrate. An instance with no owner has no
    /// subscribers to notify and is skipped.
    pub(crate) fn notify(&self, kind: ChangeKind, instance: &Instance, sink: &dyn EventSink) {
        let Some(owner_id) = self.owner_of(instance) else {
            tracing::debug!(
                target: "tattle_dispatch",
                base_name = %self.base_name,
                entity = %instance.entity,
                key = %instance.key,
                kind = %kind,
                "No owner resolved; skipping dispatch"
            );
            return;
        };

        // Deletes carry no view: there is nothing left to serialize.
        let view = (kind != ChangeKind::Deleted).then(|| self.view.name.clone());

        sink.dispatch(DispatchRequest {
            event: self.event_name(kind),
            owner_id,
            object_id: instance.key.to_string(),
            view,
        });
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("root", &self.root)
            .field("view", &self.view.name)
            .field("base_name", &self.base_name)
            .field("create", &self.create)
            .field("update", &self.update)
            .field("delete", &self.delete)
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
