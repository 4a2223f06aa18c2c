//! # Commands
//!
//! Reversible descriptions of single document mutations.
//!
//! ## Design
//!
//! 1. **Id-addressed**: a command stores stable node ids and value snapshots,
//!    never a live reference, so it stays valid after the node it targets is
//!    destroyed and later recreated by undo.
//! 2. **Validated**: every apply/revert checks its preconditions against the
//!    live document before touching it. A command whose recorded `before`
//!    state no longer matches the document is a structural error; the same
//!    guard catches a double `apply()` without an intervening `revert()`.
//! 3. **Self-inverse pairs**: `revert()` is `apply()` of the mirrored
//!    command, so apply-then-revert is a structural no-op by construction.
//!
//! ## Snapshot rules
//!
//! - `RemoveElement` captures the entire subtree, nested panels and property
//!   values included, so revert reconstructs it fully.
//! - `CollectionReorder` stores the complete prior and new orderings, not a
//!   delta, to avoid drift under repeated undo/redo.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use surveyforge_model::{ModelError, SchemaNode, SurveyDocument};
use thiserror::Error;

/// One atomic, reversible document change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Command {
    /// Property assignment. `None` means the property is absent.
    SetProperty {
        target_id: String,
        property: String,
        before: Option<Value>,
        after: Option<Value>,
    },

    /// Insert a subtree at (parent, index)
    AddElement {
        parent_id: String,
        index: usize,
        snapshot: SchemaNode,
    },

    /// Remove the subtree at (parent, index)
    RemoveElement {
        parent_id: String,
        index: usize,
        snapshot: SchemaNode,
    },

    /// Relocate a node. Indices are the node's resting position in each
    /// parent, i.e. `new_index` is where the node sits after the move.
    MoveElement {
        target_id: String,
        old_parent_id: String,
        old_index: usize,
        new_parent_id: String,
        new_index: usize,
    },

    /// Insert one item into an array property
    CollectionItemAdd {
        target_id: String,
        property: String,
        index: usize,
        item: Value,
    },

    /// Remove one item from an array property
    CollectionItemRemove {
        target_id: String,
        property: String,
        index: usize,
        item: Value,
    },

    /// Replace an array property's ordering wholesale
    CollectionReorder {
        target_id: String,
        property: String,
        before: Vec<Value>,
        after: Vec<Value>,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("{command} on {target_id}: document state does not match the recorded snapshot ({detail})")]
    StateMismatch {
        command: &'static str,
        target_id: String,
        detail: String,
    },

    #[error("Property {property} on {target_id} is not a collection")]
    NotACollection {
        target_id: String,
        property: String,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetProperty { .. } => "SetProperty",
            Command::AddElement { .. } => "AddElement",
            Command::RemoveElement { .. } => "RemoveElement",
            Command::MoveElement { .. } => "MoveElement",
            Command::CollectionItemAdd { .. } => "CollectionItemAdd",
            Command::CollectionItemRemove { .. } => "CollectionItemRemove",
            Command::CollectionReorder { .. } => "CollectionReorder",
        }
    }

    /// The id of the node this command touches
    pub fn target_id(&self) -> &str {
        match self {
            Command::SetProperty { target_id, .. }
            | Command::MoveElement { target_id, .. }
            | Command::CollectionItemAdd { target_id, .. }
            | Command::CollectionItemRemove { target_id, .. }
            | Command::CollectionReorder { target_id, .. } => target_id,
            Command::AddElement { snapshot, .. } | Command::RemoveElement { snapshot, .. } => {
                &snapshot.id
            }
        }
    }

    /// The mirrored command: applying it reverses this one
    pub fn inverted(&self) -> Command {
        match self.clone() {
            Command::SetProperty {
                target_id,
                property,
                before,
                after,
            } => Command::SetProperty {
                target_id,
                property,
                before: after,
                after: before,
            },
            Command::AddElement {
                parent_id,
                index,
                snapshot,
            } => Command::RemoveElement {
                parent_id,
                index,
                snapshot,
            },
            Command::RemoveElement {
                parent_id,
                index,
                snapshot,
            } => Command::AddElement {
                parent_id,
                index,
                snapshot,
            },
            Command::MoveElement {
                target_id,
                old_parent_id,
                old_index,
                new_parent_id,
                new_index,
            } => Command::MoveElement {
                target_id,
                old_parent_id: new_parent_id,
                old_index: new_index,
                new_parent_id: old_parent_id,
                new_index: old_index,
            },
            Command::CollectionItemAdd {
                target_id,
                property,
                index,
                item,
            } => Command::CollectionItemRemove {
                target_id,
                property,
                index,
                item,
            },
            Command::CollectionItemRemove {
                target_id,
                property,
                index,
                item,
            } => Command::CollectionItemAdd {
                target_id,
                property,
                index,
                item,
            },
            Command::CollectionReorder {
                target_id,
                property,
                before,
                after,
            } => Command::CollectionReorder {
                target_id,
                property,
                before: after,
                after: before,
            },
        }
    }

    /// Check every precondition without touching the document
    pub fn validate(&self, doc: &SurveyDocument) -> Result<(), CommandError> {
        match self {
            Command::SetProperty {
                target_id,
                property,
                before,
                ..
            } => {
                let node = doc
                    .find(target_id)
                    .ok_or_else(|| CommandError::NodeNotFound(target_id.clone()))?;
                if node.property_value(property) != *before {
                    return Err(self.mismatch(target_id, "property value differs from `before`"));
                }
                Ok(())
            }

            Command::AddElement {
                parent_id,
                index,
                snapshot,
            } => {
                if doc.contains(&snapshot.id) {
                    return Err(self.mismatch(&snapshot.id, "node already present (double apply?)"));
                }
                let parent = doc
                    .find(parent_id)
                    .ok_or_else(|| ModelError::ParentNotFound(parent_id.clone()))?;
                if !parent.kind.can_contain(snapshot.kind) {
                    return Err(CommandError::Model(ModelError::InvalidContainment {
                        parent: parent.kind.as_str(),
                        child: snapshot.kind.as_str(),
                    }));
                }
                if *index > parent.children.len() {
                    return Err(self.mismatch(&snapshot.id, "insertion index out of range"));
                }
                Ok(())
            }

            Command::RemoveElement {
                parent_id,
                index,
                snapshot,
            } => {
                let parent = doc
                    .find(parent_id)
                    .ok_or_else(|| ModelError::ParentNotFound(parent_id.clone()))?;
                match parent.children.get(*index) {
                    Some(child) if child.id == snapshot.id => Ok(()),
                    _ => Err(self.mismatch(&snapshot.id, "node is not at the recorded slot")),
                }
            }

            Command::MoveElement {
                target_id,
                old_parent_id,
                old_index,
                new_parent_id,
                new_index,
            } => {
                let position = doc
                    .position_of(target_id)
                    .ok_or_else(|| CommandError::NodeNotFound(target_id.clone()))?;
                if position != (old_parent_id.clone(), *old_index) {
                    return Err(self.mismatch(target_id, "node is not at the recorded slot"));
                }
                if doc.is_descendant(target_id, new_parent_id) {
                    return Err(CommandError::Model(ModelError::CycleDetected(
                        target_id.clone(),
                    )));
                }
                let target_kind = doc
                    .find(target_id)
                    .ok_or_else(|| CommandError::NodeNotFound(target_id.clone()))?
                    .kind;
                let parent = doc
                    .find(new_parent_id)
                    .ok_or_else(|| ModelError::ParentNotFound(new_parent_id.clone()))?;
                if !parent.kind.can_contain(target_kind) {
                    return Err(CommandError::Model(ModelError::InvalidContainment {
                        parent: parent.kind.as_str(),
                        child: target_kind.as_str(),
                    }));
                }
                // Same-parent moves index into the list after removal
                let capacity = if new_parent_id == old_parent_id {
                    parent.children.len() - 1
                } else {
                    parent.children.len()
                };
                if *new_index > capacity {
                    return Err(self.mismatch(target_id, "destination index out of range"));
                }
                Ok(())
            }

            Command::CollectionItemAdd {
                target_id,
                property,
                index,
                ..
            } => {
                let items = self.collection(doc, target_id, property)?;
                if *index > items.len() {
                    return Err(self.mismatch(target_id, "item index out of range"));
                }
                Ok(())
            }

            Command::CollectionItemRemove {
                target_id,
                property,
                index,
                item,
            } => {
                let items = self.collection(doc, target_id, property)?;
                match items.get(*index) {
                    Some(found) if found == item => Ok(()),
                    _ => Err(self.mismatch(target_id, "item is not at the recorded slot")),
                }
            }

            Command::CollectionReorder {
                target_id,
                property,
                before,
                ..
            } => {
                let items = self.collection(doc, target_id, property)?;
                if items != before {
                    return Err(self.mismatch(target_id, "ordering differs from `before`"));
                }
                Ok(())
            }
        }
    }

    /// Apply this command forward. Validation failures leave the document
    /// untouched.
    pub fn apply(&self, doc: &mut SurveyDocument) -> Result<(), CommandError> {
        self.validate(doc)?;

        match self {
            Command::SetProperty {
                target_id,
                property,
                after,
                ..
            } => {
                // validate() guarantees the node exists
                let node = doc
                    .find_mut(target_id)
                    .ok_or_else(|| CommandError::NodeNotFound(target_id.clone()))?;
                node.write_property(property, after.clone())?;
                Ok(())
            }

            Command::AddElement {
                parent_id,
                index,
                snapshot,
            } => {
                doc.attach(parent_id, *index, snapshot.clone())?;
                Ok(())
            }

            Command::RemoveElement { snapshot, .. } => {
                doc.detach(&snapshot.id)?;
                Ok(())
            }

            Command::MoveElement {
                target_id,
                new_parent_id,
                new_index,
                ..
            } => {
                let (node, _, _) = doc.detach(target_id)?;
                doc.attach(new_parent_id, *new_index, node)?;
                Ok(())
            }

            Command::CollectionItemAdd {
                target_id,
                property,
                index,
                item,
            } => {
                let items = self.collection_mut(doc, target_id, property)?;
                items.insert(*index, item.clone());
                Ok(())
            }

            Command::CollectionItemRemove {
                target_id,
                property,
                index,
                ..
            } => {
                let items = self.collection_mut(doc, target_id, property)?;
                items.remove(*index);
                Ok(())
            }

            Command::CollectionReorder {
                target_id,
                property,
                after,
                ..
            } => {
                let items = self.collection_mut(doc, target_id, property)?;
                *items = after.clone();
                Ok(())
            }
        }
    }

    /// Apply the mirrored command, undoing this one
    pub fn revert(&self, doc: &mut SurveyDocument) -> Result<(), CommandError> {
        self.inverted().apply(doc)
    }

    fn mismatch(&self, target_id: &str, detail: &str) -> CommandError {
        CommandError::StateMismatch {
            command: self.name(),
            target_id: target_id.to_string(),
            detail: detail.to_string(),
        }
    }

    fn collection<'a>(
        &self,
        doc: &'a SurveyDocument,
        target_id: &str,
        property: &str,
    ) -> Result<&'a Vec<Value>, CommandError> {
        let node = doc
            .find(target_id)
            .ok_or_else(|| CommandError::NodeNotFound(target_id.to_string()))?;
        match node.property(property) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(CommandError::NotACollection {
                target_id: target_id.to_string(),
                property: property.to_string(),
            }),
        }
    }

    fn collection_mut<'a>(
        &self,
        doc: &'a mut SurveyDocument,
        target_id: &str,
        property: &str,
    ) -> Result<&'a mut Vec<Value>, CommandError> {
        let node = doc
            .find_mut(target_id)
            .ok_or_else(|| CommandError::NodeNotFound(target_id.to_string()))?;
        match node.properties.get_mut(property) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(CommandError::NotACollection {
                target_id: target_id.to_string(),
                property: property.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use surveyforge_model::NodeKind;

    fn fixture() -> (SurveyDocument, String, String, String) {
        let mut doc = SurveyDocument::new("Commands");
        let root_id = doc.root_id().to_string();
        let page = doc.new_node(NodeKind::Page, "page1");
        let page_id = page.id.clone();
        doc.attach(&root_id, 0, page).unwrap();
        let q1 = doc
            .new_node(NodeKind::Question, "q1")
            .with_property("choices", json!(["a", "b", "c"]));
        let q1_id = q1.id.clone();
        doc.attach(&page_id, 0, q1).unwrap();
        (doc, root_id, page_id, q1_id)
    }

    fn assert_round_trip(doc: &mut SurveyDocument, command: &Command) {
        let pristine = doc.clone();
        command.apply(doc).unwrap();
        command.revert(doc).unwrap();
        assert_eq!(doc.root(), pristine.root());
    }

    #[test]
    fn test_round_trip_set_property() {
        let (mut doc, _, _, q1_id) = fixture();
        assert_round_trip(
            &mut doc,
            &Command::SetProperty {
                target_id: q1_id,
                property: "title".into(),
                before: None,
                after: Some(json!("Hello")),
            },
        );
    }

    #[test]
    fn test_round_trip_add_and_remove() {
        let (mut doc, _, page_id, _) = fixture();
        let q2 = doc.new_node(NodeKind::Question, "q2");
        assert_round_trip(
            &mut doc,
            &Command::AddElement {
                parent_id: page_id.clone(),
                index: 1,
                snapshot: q2.clone(),
            },
        );

        let q1 = doc.find_by_name("q1").unwrap().clone();
        assert_round_trip(
            &mut doc,
            &Command::RemoveElement {
                parent_id: page_id,
                index: 0,
                snapshot: q1,
            },
        );
    }

    #[test]
    fn test_round_trip_move() {
        let (mut doc, root_id, page_id, q1_id) = fixture();
        let page2 = doc.new_node(NodeKind::Page, "page2");
        let page2_id = page2.id.clone();
        doc.attach(&root_id, 1, page2).unwrap();

        assert_round_trip(
            &mut doc,
            &Command::MoveElement {
                target_id: q1_id,
                old_parent_id: page_id,
                old_index: 0,
                new_parent_id: page2_id,
                new_index: 0,
            },
        );
    }

    #[test]
    fn test_round_trip_collection_commands() {
        let (mut doc, _, _, q1_id) = fixture();

        assert_round_trip(
            &mut doc,
            &Command::CollectionItemAdd {
                target_id: q1_id.clone(),
                property: "choices".into(),
                index: 1,
                item: json!("inserted"),
            },
        );

        assert_round_trip(
            &mut doc,
            &Command::CollectionItemRemove {
                target_id: q1_id.clone(),
                property: "choices".into(),
                index: 2,
                item: json!("c"),
            },
        );

        assert_round_trip(
            &mut doc,
            &Command::CollectionReorder {
                target_id: q1_id,
                property: "choices".into(),
                before: vec![json!("a"), json!("b"), json!("c")],
                after: vec![json!("c"), json!("a"), json!("b")],
            },
        );
    }

    #[test]
    fn test_remove_restores_whole_subtree() {
        let (mut doc, root_id, page_id, q1_id) = fixture();
        {
            let q1 = doc.find_mut(&q1_id).unwrap();
            q1.set_property("title", json!("Deep question"));
        }
        let page = doc.find(&page_id).unwrap().clone();

        let command = Command::RemoveElement {
            parent_id: root_id,
            index: 0,
            snapshot: page,
        };
        command.apply(&mut doc).unwrap();
        assert!(!doc.contains(&q1_id));

        command.revert(&mut doc).unwrap();
        let q1 = doc.find(&q1_id).unwrap();
        assert_eq!(q1.property("title"), Some(&json!("Deep question")));
        assert_eq!(q1.property("choices"), Some(&json!(["a", "b", "c"])));
    }

    #[test]
    fn test_name_is_written_through_the_property_view() {
        let (mut doc, _, _, q1_id) = fixture();
        let command = Command::SetProperty {
            target_id: q1_id.clone(),
            property: "name".into(),
            before: Some(json!("q1")),
            after: Some(json!("score")),
        };
        command.apply(&mut doc).unwrap();
        assert_eq!(doc.find(&q1_id).unwrap().name, "score");
        assert!(doc.find_by_name("q1").is_none());

        command.revert(&mut doc).unwrap();
        assert_eq!(doc.find(&q1_id).unwrap().name, "q1");
    }

    #[test]
    fn test_double_apply_is_reported() {
        let (mut doc, _, _, q1_id) = fixture();
        let command = Command::SetProperty {
            target_id: q1_id,
            property: "title".into(),
            before: None,
            after: Some(json!("Once")),
        };

        command.apply(&mut doc).unwrap();
        let err = command.apply(&mut doc).unwrap_err();
        assert!(matches!(err, CommandError::StateMismatch { .. }));
    }

    #[test]
    fn test_apply_against_missing_target_aborts() {
        let (mut doc, _, _, _) = fixture();
        let pristine = doc.clone();

        let command = Command::SetProperty {
            target_id: "ghost".into(),
            property: "title".into(),
            before: None,
            after: Some(json!("x")),
        };
        assert!(matches!(
            command.apply(&mut doc),
            Err(CommandError::NodeNotFound(_))
        ));
        assert_eq!(doc.root(), pristine.root());
    }

    #[test]
    fn test_move_into_own_subtree_is_rejected() {
        let (mut doc, root_id, page_id, _) = fixture();
        let panel = doc.new_node(NodeKind::Panel, "panel1");
        let panel_id = panel.id.clone();
        doc.attach(&page_id, 1, panel).unwrap();
        let inner = doc.new_node(NodeKind::Panel, "inner");
        let inner_id = inner.id.clone();
        doc.attach(&panel_id, 0, inner).unwrap();

        let command = Command::MoveElement {
            target_id: panel_id,
            old_parent_id: page_id,
            old_index: 1,
            new_parent_id: inner_id,
            new_index: 0,
        };
        let err = command.apply(&mut doc).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Model(ModelError::CycleDetected(_))
        ));
        let _ = root_id;
    }

    #[test]
    fn test_reorder_requires_matching_before() {
        let (mut doc, _, _, q1_id) = fixture();
        let command = Command::CollectionReorder {
            target_id: q1_id,
            property: "choices".into(),
            before: vec![json!("b"), json!("a"), json!("c")],
            after: vec![json!("c"), json!("b"), json!("a")],
        };
        let err = command.apply(&mut doc).unwrap_err();
        assert!(matches!(err, CommandError::StateMismatch { .. }));
    }

    #[test]
    fn test_command_serialization() {
        let command = Command::SetProperty {
            target_id: "n-1".into(),
            property: "title".into(),
            before: Some(json!("old")),
            after: Some(json!("new")),
        };

        let json = serde_json::to_string(&command).unwrap();
        let deserialized: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(command, deserialized);
    }
}
