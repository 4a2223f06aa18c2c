//! # Schema Tree
//!
//! The survey document is a tree of [`SchemaNode`]s under a single `Survey`
//! root. Nodes are addressed by stable id; structural edits go through
//! [`SurveyDocument::detach`] and [`SurveyDocument::attach`] so the tree can
//! never hold two nodes with the same id.

use crate::{IdGenerator, ModelError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key under which a node's identity name is exposed as a property
pub const NAME_PROPERTY: &str = "name";

/// Kind tag for addressable survey entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// The document root. Exactly one per document.
    Survey,
    Page,
    Panel,
    Question,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Survey => "survey",
            NodeKind::Page => "page",
            NodeKind::Panel => "panel",
            NodeKind::Question => "question",
        }
    }

    /// Containment rules: surveys hold pages, pages and panels hold panels
    /// and questions, questions are leaves.
    pub fn can_contain(&self, child: NodeKind) -> bool {
        match self {
            NodeKind::Survey => child == NodeKind::Page,
            NodeKind::Page | NodeKind::Panel => {
                child == NodeKind::Panel || child == NodeKind::Question
            }
            NodeKind::Question => false,
        }
    }
}

/// One addressable node: a page, panel, or question
///
/// The property bag holds everything the rendered survey cares about
/// (titles, choices, visibility conditions) as raw JSON values. The editor
/// treats properties opaquely except for expression-bearing keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SchemaNode>,
}

impl SchemaNode {
    pub fn new(kind: NodeKind, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style property assignment, used by tests and element factories
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Property view including the identity name: `name` is surfaced as a
    /// property so the property grid and the command engine treat it
    /// uniformly with everything else.
    pub fn property_value(&self, key: &str) -> Option<Value> {
        if key == NAME_PROPERTY {
            Some(Value::String(self.name.clone()))
        } else {
            self.properties.get(key).cloned()
        }
    }

    /// Write through the uniform property view. The identity `name` must
    /// stay a non-empty string and can never be unset.
    pub fn write_property(&mut self, key: &str, value: Option<Value>) -> Result<(), ModelError> {
        if key == NAME_PROPERTY {
            return match value {
                Some(Value::String(name)) if !name.is_empty() => {
                    self.name = name;
                    Ok(())
                }
                _ => Err(ModelError::InvalidName(self.id.clone())),
            };
        }
        match value {
            Some(value) => {
                self.properties.insert(key.to_string(), value);
            }
            None => {
                self.properties.remove(key);
            }
        }
        Ok(())
    }

    /// Set a property, returning the previous value
    pub fn set_property(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.properties.insert(key.into(), value)
    }

    pub fn remove_property(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    pub fn find(&self, id: &str) -> Option<&SchemaNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut SchemaNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Collect the ids of this node and every descendant
    pub fn collect_ids(&self, out: &mut Vec<String>) {
        out.push(self.id.clone());
        for child in &self.children {
            child.collect_ids(out);
        }
    }
}

/// The live document: root node plus the id allocator
#[derive(Debug, Clone)]
pub struct SurveyDocument {
    root: SchemaNode,
    ids: IdGenerator,
}

impl SurveyDocument {
    /// Create an empty document titled `title`
    pub fn new(title: &str) -> Self {
        let mut ids = IdGenerator::new(title);
        let root_id = ids.new_id();
        let mut root = SchemaNode::new(NodeKind::Survey, root_id, "survey");
        root.set_property("title", Value::String(title.to_string()));
        Self { root, ids }
    }

    pub(crate) fn from_parts(root: SchemaNode, ids: IdGenerator) -> Self {
        Self { root, ids }
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    pub fn root_id(&self) -> &str {
        &self.root.id
    }

    /// Allocate a fresh node of `kind` named `name`
    pub fn new_node(&mut self, kind: NodeKind, name: impl Into<String>) -> SchemaNode {
        SchemaNode::new(kind, self.ids.new_id(), name)
    }

    pub fn new_id(&mut self) -> String {
        self.ids.new_id()
    }

    pub fn find(&self, id: &str) -> Option<&SchemaNode> {
        self.root.find(id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut SchemaNode> {
        self.root.find_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.root.contains(id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&SchemaNode> {
        fn walk<'a>(node: &'a SchemaNode, name: &str) -> Option<&'a SchemaNode> {
            if node.name == name {
                return Some(node);
            }
            node.children.iter().find_map(|c| walk(c, name))
        }
        walk(&self.root, name)
    }

    /// Whether `name` is already taken by a node other than `excluding`
    pub fn name_exists(&self, name: &str, excluding: Option<&str>) -> bool {
        fn walk(node: &SchemaNode, name: &str, excluding: Option<&str>) -> bool {
            if node.name == name && excluding != Some(node.id.as_str()) {
                return true;
            }
            node.children.iter().any(|c| walk(c, name, excluding))
        }
        walk(&self.root, name, excluding)
    }

    /// The (parent id, index) slot a node occupies, `None` for the root or
    /// unknown ids
    pub fn position_of(&self, id: &str) -> Option<(String, usize)> {
        fn walk(node: &SchemaNode, id: &str) -> Option<(String, usize)> {
            if let Some(index) = node.children.iter().position(|c| c.id == id) {
                return Some((node.id.clone(), index));
            }
            node.children.iter().find_map(|c| walk(c, id))
        }
        walk(&self.root, id)
    }

    /// Ancestor ids of `id`, nearest first, ending at the root
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        fn walk(node: &SchemaNode, id: &str, chain: &mut Vec<String>) -> bool {
            if node.id == id {
                return true;
            }
            for child in &node.children {
                if walk(child, id, chain) {
                    chain.push(node.id.clone());
                    return true;
                }
            }
            false
        }
        let mut chain = Vec::new();
        if !walk(&self.root, id, &mut chain) {
            chain.clear();
        }
        chain
    }

    /// Whether `id` lives inside the subtree rooted at `ancestor_id`
    pub fn is_descendant(&self, ancestor_id: &str, id: &str) -> bool {
        self.find(ancestor_id)
            .map(|node| node.id != id && node.contains(id))
            .unwrap_or(false)
    }

    /// Remove a node from its parent, returning the subtree and the slot it
    /// occupied
    pub fn detach(&mut self, id: &str) -> Result<(SchemaNode, String, usize), ModelError> {
        if id == self.root.id {
            return Err(ModelError::CannotDetachRoot);
        }

        fn walk(node: &mut SchemaNode, id: &str) -> Option<(SchemaNode, String, usize)> {
            if let Some(index) = node.children.iter().position(|c| c.id == id) {
                let removed = node.children.remove(index);
                return Some((removed, node.id.clone(), index));
            }
            node.children.iter_mut().find_map(|c| walk(c, id))
        }

        walk(&mut self.root, id).ok_or_else(|| ModelError::NodeNotFound(id.to_string()))
    }

    /// Insert a subtree under `parent_id`, clamping `index` to the child
    /// count. Returns the effective index.
    pub fn attach(
        &mut self,
        parent_id: &str,
        index: usize,
        node: SchemaNode,
    ) -> Result<usize, ModelError> {
        let mut incoming = Vec::new();
        node.collect_ids(&mut incoming);
        for id in &incoming {
            if self.contains(id) {
                return Err(ModelError::DuplicateId(id.clone()));
            }
        }

        let parent = self
            .root
            .find_mut(parent_id)
            .ok_or_else(|| ModelError::ParentNotFound(parent_id.to_string()))?;

        if !parent.kind.can_contain(node.kind) {
            return Err(ModelError::InvalidContainment {
                parent: parent.kind.as_str(),
                child: node.kind.as_str(),
            });
        }

        let effective = index.min(parent.children.len());
        parent.children.insert(effective, node);
        Ok(effective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> SurveyDocument {
        let mut doc = SurveyDocument::new("Test Survey");
        let root_id = doc.root_id().to_string();
        let page = doc.new_node(NodeKind::Page, "page1");
        let page_id = page.id.clone();
        doc.attach(&root_id, 0, page).unwrap();

        let q1 = doc.new_node(NodeKind::Question, "q1");
        doc.attach(&page_id, 0, q1).unwrap();
        doc
    }

    #[test]
    fn test_find_and_position() {
        let doc = fixture();
        let page = doc.find_by_name("page1").unwrap();
        let q1 = doc.find_by_name("q1").unwrap();

        assert_eq!(doc.position_of(&q1.id), Some((page.id.clone(), 0)));
        assert_eq!(doc.position_of(doc.root_id()), None);
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let doc = fixture();
        let page_id = doc.find_by_name("page1").unwrap().id.clone();
        let q1_id = doc.find_by_name("q1").unwrap().id.clone();

        let chain = doc.ancestors(&q1_id);
        assert_eq!(chain, vec![page_id, doc.root_id().to_string()]);
        assert!(doc.ancestors("missing").is_empty());
    }

    #[test]
    fn test_detach_and_attach_round_trip() {
        let mut doc = fixture();
        let q1_id = doc.find_by_name("q1").unwrap().id.clone();
        let page_id = doc.find_by_name("page1").unwrap().id.clone();

        let (node, parent, index) = doc.detach(&q1_id).unwrap();
        assert_eq!(parent, page_id);
        assert_eq!(index, 0);
        assert!(!doc.contains(&q1_id));

        doc.attach(&parent, index, node).unwrap();
        assert!(doc.contains(&q1_id));
    }

    #[test]
    fn test_attach_rejects_bad_containment() {
        let mut doc = fixture();
        let q1_id = doc.find_by_name("q1").unwrap().id.clone();
        let q2 = doc.new_node(NodeKind::Question, "q2");

        // Questions are leaves
        let err = doc.attach(&q1_id, 0, q2).unwrap_err();
        assert!(matches!(err, ModelError::InvalidContainment { .. }));

        // Pages only live under the root
        let page_id = doc.find_by_name("page1").unwrap().id.clone();
        let page2 = doc.new_node(NodeKind::Page, "page2");
        let err = doc.attach(&page_id, 0, page2).unwrap_err();
        assert!(matches!(err, ModelError::InvalidContainment { .. }));
    }

    #[test]
    fn test_attach_rejects_duplicate_ids() {
        let mut doc = fixture();
        let page_id = doc.find_by_name("page1").unwrap().id.clone();
        let q1 = doc.find_by_name("q1").unwrap().clone();

        let err = doc.attach(&page_id, 1, q1).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateId(_)));
    }

    #[test]
    fn test_root_cannot_be_detached() {
        let mut doc = fixture();
        let root_id = doc.root_id().to_string();
        assert_eq!(doc.detach(&root_id).unwrap_err(), ModelError::CannotDetachRoot);
    }

    #[test]
    fn test_name_exists_excludes_self() {
        let doc = fixture();
        let q1_id = doc.find_by_name("q1").unwrap().id.clone();

        assert!(doc.name_exists("q1", None));
        assert!(!doc.name_exists("q1", Some(&q1_id)));
        assert!(!doc.name_exists("q2", None));
    }

    #[test]
    fn test_name_property_view() {
        let mut doc = fixture();
        let q1_id = doc.find_by_name("q1").unwrap().id.clone();
        let q1 = doc.find_mut(&q1_id).unwrap();

        assert_eq!(q1.property_value("name"), Some(json!("q1")));

        q1.write_property("name", Some(json!("renamed"))).unwrap();
        assert_eq!(q1.name, "renamed");

        // The identity name cannot be unset or made non-textual
        assert!(q1.write_property("name", None).is_err());
        assert!(q1.write_property("name", Some(json!(5))).is_err());
        assert_eq!(q1.name, "renamed");
    }

    #[test]
    fn test_property_bag() {
        let mut doc = fixture();
        let q1_id = doc.find_by_name("q1").unwrap().id.clone();

        let q1 = doc.find_mut(&q1_id).unwrap();
        assert_eq!(q1.set_property("title", json!("First question")), None);
        assert_eq!(
            q1.set_property("title", json!("Renamed")),
            Some(json!("First question"))
        );
        assert_eq!(q1.property("title"), Some(&json!("Renamed")));
    }
}
