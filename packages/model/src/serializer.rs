//! # JSON Serialization
//!
//! The persisted survey format is plain JSON, delegated to serde. Loading
//! re-validates the structural invariants the editor relies on (unique ids,
//! legal containment) and re-seeds the id generator past every loaded id so
//! new nodes can never collide.

use crate::{IdGenerator, ModelError, SchemaNode, SurveyDocument};
use serde_json::Value;
use std::collections::HashSet;

/// Serialize a document to its JSON value
pub fn document_to_json(doc: &SurveyDocument) -> Value {
    // SchemaNode serialization is infallible: string keys, JSON values
    serde_json::to_value(doc.root()).unwrap_or(Value::Null)
}

/// Rebuild a document from JSON produced by [`document_to_json`] (or by an
/// external tool emitting the same shape)
pub fn document_from_json(value: &Value) -> Result<SurveyDocument, ModelError> {
    let root: SchemaNode = serde_json::from_value(value.clone())
        .map_err(|e| ModelError::InvalidJson(e.to_string()))?;

    if root.kind != crate::NodeKind::Survey {
        return Err(ModelError::InvalidJson(format!(
            "document root must be a survey, found {}",
            root.kind.as_str()
        )));
    }

    validate_tree(&root)?;

    let seed = root
        .id
        .rsplit_once('-')
        .map(|(seed, _)| seed.to_string())
        .unwrap_or_else(|| root.id.clone());
    let mut ids = IdGenerator::from_seed(seed);

    let mut all_ids = Vec::new();
    root.collect_ids(&mut all_ids);
    for id in &all_ids {
        ids.bump_past(id);
    }

    Ok(SurveyDocument::from_parts(root, ids))
}

fn validate_tree(root: &SchemaNode) -> Result<(), ModelError> {
    let mut seen = HashSet::new();
    fn walk(node: &SchemaNode, seen: &mut HashSet<String>) -> Result<(), ModelError> {
        if !seen.insert(node.id.clone()) {
            return Err(ModelError::DuplicateId(node.id.clone()));
        }
        for child in &node.children {
            if !node.kind.can_contain(child.kind) {
                return Err(ModelError::InvalidContainment {
                    parent: node.kind.as_str(),
                    child: child.kind.as_str(),
                });
            }
            walk(child, seen)?;
        }
        Ok(())
    }
    walk(root, &mut seen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKind;
    use serde_json::json;

    #[test]
    fn test_round_trip() {
        let mut doc = SurveyDocument::new("Feedback");
        let root_id = doc.root_id().to_string();
        let page = doc.new_node(NodeKind::Page, "page1");
        let page_id = page.id.clone();
        doc.attach(&root_id, 0, page).unwrap();
        let question = doc
            .new_node(NodeKind::Question, "q1")
            .with_property("title", json!("How was it?"))
            .with_property("choices", json!(["good", "bad"]));
        doc.attach(&page_id, 0, question).unwrap();

        let value = document_to_json(&doc);
        let restored = document_from_json(&value).unwrap();

        assert_eq!(restored.root(), doc.root());

        // Fresh ids from the restored document do not collide
        let mut restored = restored;
        let next = restored.new_id();
        assert!(!doc.contains(&next));
    }

    #[test]
    fn test_rejects_non_survey_root() {
        let value = json!({ "id": "x-1", "name": "page1", "kind": "page" });
        let err = document_from_json(&value).unwrap_err();
        assert!(matches!(err, ModelError::InvalidJson(_)));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let value = json!({
            "id": "x-1", "name": "survey", "kind": "survey",
            "children": [
                { "id": "x-2", "name": "page1", "kind": "page" },
                { "id": "x-2", "name": "page2", "kind": "page" }
            ]
        });
        let err = document_from_json(&value).unwrap_err();
        assert_eq!(err, ModelError::DuplicateId("x-2".to_string()));
    }

    #[test]
    fn test_rejects_bad_containment() {
        let value = json!({
            "id": "x-1", "name": "survey", "kind": "survey",
            "children": [
                { "id": "x-2", "name": "q1", "kind": "question" }
            ]
        });
        let err = document_from_json(&value).unwrap_err();
        assert!(matches!(err, ModelError::InvalidContainment { .. }));
    }
}
