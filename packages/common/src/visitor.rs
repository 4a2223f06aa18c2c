use serde_json::Value;
use surveyforge_model::{SchemaNode, SurveyDocument};

/// Visitor pattern for traversing the schema tree immutably
///
/// This trait provides default implementations that walk the entire tree.
/// Override specific visit_* methods to perform custom actions on nodes.
/// There is no mutable counterpart: all document mutation flows through the
/// editor's command path, never through ad-hoc traversal.
pub trait Visitor: Sized {
    fn visit_document(&mut self, doc: &SurveyDocument) {
        walk_document(self, doc);
    }

    fn visit_node(&mut self, node: &SchemaNode) {
        walk_node(self, node);
    }

    fn visit_property(&mut self, _node: &SchemaNode, _key: &str, _value: &Value) {
        // Leaf, no children to walk
    }
}

pub fn walk_document<V: Visitor>(visitor: &mut V, doc: &SurveyDocument) {
    visitor.visit_node(doc.root());
}

pub fn walk_node<V: Visitor>(visitor: &mut V, node: &SchemaNode) {
    for (key, value) in &node.properties {
        visitor.visit_property(node, key, value);
    }
    for child in &node.children {
        visitor.visit_node(child);
    }
}
