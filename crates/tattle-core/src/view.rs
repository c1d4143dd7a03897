//! Declarative nested-entity views.
//!
//! A view describes the read shape of a root entity: which related entities
//! its serialized form embeds, and how. The same tree drives payload
//! rendering on the host side and relationship resolution here.

use serde::{Deserialize, Serialize};

use crate::entity::EntityType;

/// Whether a relation field embeds one instance or a list of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    Single,
    Many,
}

/// A relation field inside a view: a named edge to another entity type,
/// serialized through that type's own (sub-)view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewRelation {
    /// Field name as it appears in the serialized output.
    pub field: String,
    pub cardinality: Cardinality,
    /// Explicit relationship-path override. A dotted value (`"a.b"`) or the
    /// document root (`"*"`) marks an edge that is not navigable as a single
    /// relational step.
    pub source: Option<String>,
    pub view: EntityView,
}

impl ViewRelation {
    pub fn single(field: impl Into<String>, view: EntityView) -> Self {
        Self {
            field: field.into(),
            cardinality: Cardinality::Single,
            source: None,
            view,
        }
    }

    pub fn many(field: impl Into<String>, view: EntityView) -> Self {
        Self {
            field: field.into(),
            cardinality: Cardinality::Many,
            source: None,
            view,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A named view over one entity type.
///
/// `name` identifies the view to the host's serializer; the delivery worker
/// passes it back when re-rendering a payload at dispatch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityView {
    pub name: String,
    pub entity: EntityType,
    pub relations: Vec<ViewRelation>,
}

impl EntityView {
    pub fn new(name: impl Into<String>, entity: impl Into<EntityType>) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            relations: Vec::new(),
        }
    }

    pub fn with_relation(mut self, relation: ViewRelation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Every entity type that occurs as a nested node anywhere in the tree,
    /// paired with its dot-joined field path from the root. A type reachable
    /// via several paths appears once per path.
    pub fn nested_types(&self) -> Vec<(EntityType, String)> {
        let mut out = Vec::new();
        collect_nested(self, &mut Vec::new(), &mut out);
        out
    }

    /// Multi-line rendering of the view tree, used in registration
    /// diagnostics.
    pub fn render_tree(&self) -> String {
        let mut tree = format!("{}\n", self.name);
        for (entity, path) in self.nested_types() {
            tree.push_str(&format!("  .{path} -> {entity}\n"));
        }
        tree
    }
}

fn collect_nested(view: &EntityView, path: &mut Vec<String>, out: &mut Vec<(EntityType, String)>) {
    for relation in &view.relations {
        path.push(relation.field.clone());
        out.push((relation.view.entity.clone(), path.join(".")));
        collect_nested(&relation.view, path, out);
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_view() -> EntityView {
        let side = EntityView::new("SideView", "level_one_side");
        let one = EntityView::new("OneView", "level_one")
            .with_relation(ViewRelation::single("side", side));
        EntityView::new("TwoView", "level_two").with_relation(ViewRelation::single("parent", one))
    }

    #[test]
    fn nested_types_walks_depth_first_with_paths() {
        let view = sample_view();
        let nested = view.nested_types();
        assert_eq!(
            nested,
            vec![
                (EntityType::new("level_one"), "parent".to_string()),
                (EntityType::new("level_one_side"), "parent.side".to_string()),
            ]
        );
    }

    #[test]
    fn render_tree_names_every_node() {
        let tree = sample_view().render_tree();
        assert!(tree.starts_with("TwoView\n"));
        assert!(tree.contains(".parent -> level_one"));
        assert!(tree.contains(".parent.side -> level_one_side"));
    }
}
