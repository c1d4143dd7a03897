//! Process-wide registry of live registrations.
//!
//! An explicit object rather than ambient global state: hosts create one
//! `Registry`, register views against it at startup, and pass it to every
//! change session. Tests construct a fresh registry each.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use heck::{ToSnakeCase, ToTitleCase};
use uuid::Uuid;

use crate::entity::{EntityType, Instance, OwnerFn};
use crate::registration::Registration;
use crate::resolver::{self, GetterFn, RootQuery};
use crate::store::SchemaCatalog;
use crate::view::EntityView;

/// Default field of an instance's data snapshot holding its owner id.
pub const DEFAULT_OWNER_FIELD: &str = "owner_id";

/// Registration-time fatal errors. The process must not continue with a
/// half-wired registration, so these surface synchronously and loudly.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("A registration with base name \"{0}\" already exists")]
    DuplicateBaseName(String),

    #[error("A registration for view \"{0}\" already exists")]
    DuplicateView(String),

    /// The view names entity types no derived path or override covers.
    /// Fail-fast: an incompletely wired registration must never silently
    /// under-notify in production.
    #[error("The following relationship getters must be provided:\n{}\nView tree:\n{tree}", .missing.join("\n"))]
    MissingGetters { missing: Vec<String>, tree: String },
}

/// Options for [`Registry::register`].
#[derive(Default)]
pub struct RegistrationOptions {
    /// Event-family prefix; defaults to the snake-cased root type name.
    pub base_name: Option<String>,
    pub create: Option<bool>,
    pub update: Option<bool>,
    pub delete: Option<bool>,
    /// Owner lookup; defaults to reading `data[owner_field]` as a UUID.
    pub owner_getter: Option<OwnerFn>,
    /// Manual getters taking precedence over derived paths; required for
    /// relationships the path vocabulary cannot express.
    pub getter_overrides: HashMap<EntityType, GetterFn>,
}

impl RegistrationOptions {
    pub fn with_base_name(mut self, base_name: impl Into<String>) -> Self {
        self.base_name = Some(base_name.into());
        self
    }

    pub fn with_owner_getter(mut self, getter: OwnerFn) -> Self {
        self.owner_getter = Some(getter);
        self
    }

    pub fn with_getter_override(mut self, entity: impl Into<EntityType>, getter: GetterFn) -> Self {
        self.getter_overrides.insert(entity.into(), getter);
        self
    }

    pub fn with_kinds(mut self, create: bool, update: bool, delete: bool) -> Self {
        self.create = Some(create);
        self.update = Some(update);
        self.delete = Some(delete);
        self
    }
}

struct Inner {
    registrations: Vec<Arc<Registration>>,
    base_names: HashSet<String>,
    view_names: HashSet<String>,
}

/// Registry of live registrations plus the process-wide event-suspension
/// toggle used to bracket bulk imports.
pub struct Registry {
    inner: RwLock<Inner>,
    suspended: AtomicBool,
    owner_field: String,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_owner_field(DEFAULT_OWNER_FIELD)
    }

    /// A registry whose default owner getter reads a custom field from the
    /// instance snapshot.
    pub fn with_owner_field(owner_field: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                registrations: Vec::new(),
                base_names: HashSet::new(),
                view_names: HashSet::new(),
            }),
            suspended: AtomicBool::new(false),
            owner_field: owner_field.into(),
        }
    }

    /// Register a view, deriving relationship getters and validating that
    /// every nested entity type is covered (derived or overridden).
    pub fn register(
        self: &Arc<Self>,
        view: EntityView,
        catalog: &dyn SchemaCatalog,
        options: RegistrationOptions,
    ) -> Result<RegistrationHandle, RegistryError> {
        let base_name = options
            .base_name
            .unwrap_or_else(|| view.entity.as_str().to_snake_case());
        let label = view.entity.as_str().to_title_case();

        let mut getters: HashMap<EntityType, RootQuery> =
            resolver::derive(&view, catalog).into_queries();
        for (entity, getter) in options.getter_overrides {
            getters.insert(entity, RootQuery::Custom(getter));
        }

        // Completeness check: every nested type needs a getter.
        let nested = view.nested_types();
        let missing: Vec<String> = nested
            .iter()
            .filter(|(entity, _)| !getters.contains_key(entity))
            .map(|(entity, path)| format!("  .{path} -> {entity}"))
            .collect();
        if !missing.is_empty() {
            return Err(RegistryError::MissingGetters {
                missing,
                tree: view.render_tree(),
            });
        }

        let owner_getter = options.owner_getter.unwrap_or_else(|| {
            let field = self.owner_field.clone();
            Arc::new(move |instance: &Instance| {
                instance
                    .data
                    .get(&field)
                    .and_then(|v| v.as_str())
                    .and_then(|s| Uuid::parse_str(s).ok())
            })
        });

        let registration = Arc::new(Registration::new(
            view.entity.clone(),
            view,
            base_name,
            label,
            options.create.unwrap_or(true),
            options.update.unwrap_or(true),
            options.delete.unwrap_or(true),
            owner_getter,
            getters,
        ));

        let mut inner = self.inner.write().expect("registry lock poisoned");
        if inner.base_names.contains(registration.base_name()) {
            return Err(RegistryError::DuplicateBaseName(
                registration.base_name().to_string(),
            ));
        }
        if inner.view_names.contains(&registration.view().name) {
            return Err(RegistryError::DuplicateView(
                registration.view().name.clone(),
            ));
        }

        inner.base_names.insert(registration.base_name().to_string());
        inner.view_names.insert(registration.view().name.clone());
        inner.registrations.push(registration.clone());

        tracing::info!(
            target: "tattle_registry",
            base_name = %registration.base_name(),
            root = %registration.root(),
            view = %registration.view().name,
            "Webhook registration added"
        );

        Ok(RegistrationHandle {
            registry: Arc::clone(self),
            registration,
        })
    }

    fn unregister(&self, registration: &Arc<Registration>) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner
            .registrations
            .retain(|r| !Arc::ptr_eq(r, registration));
        inner.base_names.remove(registration.base_name());
        inner.view_names.remove(&registration.view().name);

        tracing::info!(
            target: "tattle_registry",
            base_name = %registration.base_name(),
            "Webhook registration removed"
        );
    }

    /// Snapshot of the live registrations, in registration order.
    pub fn registrations(&self) -> Vec<Arc<Registration>> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .registrations
            .clone()
    }

    /// `"<base_name>.<kind>" -> "<Readable Title> <Kind>"` for every enabled
    /// kind of every live registration. Used to populate
    /// subscription-configuration UIs; mutates as registrations come and go.
    pub fn event_choices(&self) -> BTreeMap<String, String> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let mut choices = BTreeMap::new();
        for registration in &inner.registrations {
            for kind in registration.enabled_kinds() {
                choices.insert(
                    registration.event_name(kind),
                    format!("{} {}", registration.label(), kind.title()),
                );
            }
        }
        choices
    }

    /// Suspend signal collection process-wide until the guard drops.
    ///
    /// Intended to bracket a single-threaded bulk import; concurrent callers
    /// must coordinate externally.
    pub fn suspend_events(&self) -> SuspendGuard<'_> {
        self.set_suspended(true);
        SuspendGuard { registry: self }
    }

    pub fn set_suspended(&self, suspended: bool) {
        self.suspended.store(suspended, Ordering::SeqCst);
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }
}

/// Clears the suspension toggle on drop.
pub struct SuspendGuard<'a> {
    registry: &'a Registry,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.registry.set_suspended(false);
    }
}

/// Handle returned by [`Registry::register`]; unregistering frees the base
/// name and view slot.
pub struct RegistrationHandle {
    registry: Arc<Registry>,
    registration: Arc<Registration>,
}

impl std::fmt::Debug for RegistrationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationHandle").finish_non_exhaustive()
    }
}

impl RegistrationHandle {
    pub fn registration(&self) -> &Arc<Registration> {
        &self.registration
    }

    pub fn unregister(self) {
        self.registry.unregister(&self.registration);
    }
}
