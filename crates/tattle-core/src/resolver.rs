//! Schema-driven relationship resolution.
//!
//! Given a nested-entity view of a root type, derives for every entity type
//! reachable in that view a query able to find which root instances are
//! affected by a change to an instance of that type.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::entity::{EntityType, Instance};
use crate::store::{DataStore, SchemaCatalog, StoreError};
use crate::view::EntityView;

/// Maps a changed non-root instance to the root instances it affects.
pub type GetterFn = Arc<dyn Fn(&Instance) -> Result<Vec<Instance>, StoreError> + Send + Sync>;

/// How to find the root instances affected by a change to one entity type.
#[derive(Clone)]
pub enum RootQuery {
    /// Derived from the view: the root matches if the changed instance is
    /// reachable along any of these relationship paths.
    Paths(BTreeSet<String>),
    /// Manual override for relationships the path vocabulary cannot express.
    Custom(GetterFn),
}

impl RootQuery {
    /// Evaluate against the store, yielding affected root instances.
    pub fn roots(
        &self,
        store: &dyn DataStore,
        root: &EntityType,
        changed: &Instance,
    ) -> Result<Vec<Instance>, StoreError> {
        match self {
            Self::Paths(paths) => {
                let paths: Vec<String> = paths.iter().cloned().collect();
                store.roots_by_paths(root, &paths, changed)
            }
            Self::Custom(getter) => getter(changed),
        }
    }
}

impl std::fmt::Debug for RootQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paths(paths) => f.debug_tuple("Paths").field(paths).finish(),
            Self::Custom(_) => f.debug_tuple("Custom").field(&"<fn>").finish(),
        }
    }
}

/// A view node the resolver could not turn into a relational path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRelation {
    pub entity: EntityType,
    /// Dot-joined field path of the node in the view.
    pub path: String,
    /// The offending source override.
    pub source: String,
}

/// Result of deriving a view: per-type path sets, plus the nodes that were
/// skipped because their source is dotted/computed and therefore not a
/// navigable relational edge.
#[derive(Debug, Default)]
pub struct DerivedPaths {
    pub paths: HashMap<EntityType, BTreeSet<String>>,
    pub skipped: Vec<SkippedRelation>,
}

impl DerivedPaths {
    /// Wrap each path set into a [`RootQuery`].
    pub fn into_queries(self) -> HashMap<EntityType, RootQuery> {
        self.paths
            .into_iter()
            .map(|(entity, paths)| (entity, RootQuery::Paths(paths)))
            .collect()
    }
}

/// Derive the relationship-path map for a view.
///
/// Deterministic and side-effect free: a pure function of the view tree and
/// the catalog's segment substitutions. Types visited via multiple paths get
/// the union of those paths.
pub fn derive(view: &EntityView, catalog: &dyn SchemaCatalog) -> DerivedPaths {
    let mut derived = DerivedPaths::default();
    walk(view, catalog, &mut Vec::new(), &mut Vec::new(), &mut derived);
    derived
}

fn walk(
    view: &EntityView,
    catalog: &dyn SchemaCatalog,
    segments: &mut Vec<String>,
    fields: &mut Vec<String>,
    derived: &mut DerivedPaths,
) {
    for relation in &view.relations {
        fields.push(relation.field.clone());

        let segment = match &relation.source {
            Some(source) if source == "*" || source.contains('.') => {
                // Computed sources don't describe a single relational edge;
                // the registration must cover this type some other way.
                tracing::warn!(
                    target: "tattle_resolver",
                    entity = %relation.view.entity,
                    path = %fields.join("."),
                    source = %source,
                    "View relation has a non-navigable source; no path derived"
                );
                derived.skipped.push(SkippedRelation {
                    entity: relation.view.entity.clone(),
                    path: fields.join("."),
                    source: source.clone(),
                });
                fields.pop();
                continue;
            }
            Some(source) => source.clone(),
            None => catalog
                .relation_segment(&view.entity, &relation.field)
                .unwrap_or_else(|| relation.field.clone()),
        };

        segments.push(segment);
        derived
            .paths
            .entry(relation.view.entity.clone())
            .or_default()
            .insert(segments.join("."));

        walk(&relation.view, catalog, segments, fields, derived);

        segments.pop();
        fields.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::IdentityCatalog;
    use crate::view::ViewRelation;

    struct ReverseAware;

    impl SchemaCatalog for ReverseAware {
        fn relation_segment(&self, entity: &EntityType, field: &str) -> Option<String> {
            // The FK for this list lives on the child type; only the reverse
            // accessor walks from a child back to its root.
            (entity.as_str() == "level_two" && field == "levelthree_set")
                .then(|| "levelthree".to_string())
        }
    }

    fn level_two_view() -> EntityView {
        let side = EntityView::new("SideView", "level_one_side");
        let many = EntityView::new("ManyView", "many");
        let three = EntityView::new("ThreeView", "level_three");
        let one = EntityView::new("OneView", "level_one")
            .with_relation(ViewRelation::single("side", side))
            .with_relation(ViewRelation::many("many", many));
        EntityView::new("TwoView", "level_two")
            .with_relation(ViewRelation::single("parent", one))
            .with_relation(ViewRelation::many("levelthree_set", three))
    }

    #[test]
    fn derives_a_path_for_every_nested_type() {
        let derived = derive(&level_two_view(), &ReverseAware);

        let get = |name: &str| {
            derived.paths[&EntityType::new(name)]
                .iter()
                .cloned()
                .collect::<Vec<_>>()
        };
        assert_eq!(get("level_one"), vec!["parent"]);
        assert_eq!(get("level_one_side"), vec!["parent.side"]);
        assert_eq!(get("many"), vec!["parent.many"]);
        assert_eq!(get("level_three"), vec!["levelthree"]);
        assert!(derived.skipped.is_empty());
    }

    #[test]
    fn multiple_paths_to_one_type_union() {
        let leaf_a = EntityView::new("LeafView", "leaf");
        let leaf_b = EntityView::new("LeafView", "leaf");
        let mid = EntityView::new("MidView", "mid").with_relation(ViewRelation::single("leaf", leaf_b));
        let root = EntityView::new("RootView", "root")
            .with_relation(ViewRelation::single("leaf", leaf_a))
            .with_relation(ViewRelation::single("mid", mid));

        let derived = derive(&root, &IdentityCatalog);
        let paths: Vec<_> = derived.paths[&EntityType::new("leaf")].iter().cloned().collect();
        assert_eq!(paths, vec!["leaf", "mid.leaf"]);
    }

    #[test]
    fn dotted_and_star_sources_are_skipped() {
        let shortcut = EntityView::new("SideView", "level_one_side");
        let mirror = EntityView::new("SelfView", "root");
        let root = EntityView::new("RootView", "root")
            .with_relation(ViewRelation::single("side", shortcut).with_source("parent.side"))
            .with_relation(ViewRelation::single("self_repr", mirror).with_source("*"));

        let derived = derive(&root, &IdentityCatalog);
        assert!(derived.paths.is_empty());
        assert_eq!(derived.skipped.len(), 2);
        assert_eq!(derived.skipped[0].entity, EntityType::new("level_one_side"));
        assert_eq!(derived.skipped[0].path, "side");
    }

    #[test]
    fn simple_source_overrides_the_field_name() {
        let child = EntityView::new("ChildView", "child");
        let root = EntityView::new("RootView", "root")
            .with_relation(ViewRelation::single("kid", child).with_source("child"));

        let derived = derive(&root, &IdentityCatalog);
        let paths: Vec<_> = derived.paths[&EntityType::new("child")].iter().cloned().collect();
        assert_eq!(paths, vec!["child"]);
    }
}
