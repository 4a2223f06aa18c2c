//! # Expression Strings
//!
//! Survey logic (visibility conditions, calculated values, validators) is
//! authored as expression strings that reference other nodes by name with
//! `{name}` placeholders, e.g. `"{q1} = 1"`. The editor needs to find those
//! references to keep them in sync across renames and deletions, but it never
//! evaluates them.
//!
//! Which properties carry expressions follows the survey schema convention:
//! any key ending in `If` (`visibleIf`, `enabledIf`, `requiredIf`) plus the
//! fixed list in [`EXPRESSION_PROPERTIES`]. Expression strings may also sit
//! inside collection items (a validator's `expression`, a choice's
//! `visibleIf`), so the rewrite helpers walk nested arrays and objects.

use crate::SchemaNode;
use serde_json::Value;

/// Property keys that hold expressions regardless of suffix
pub const EXPRESSION_PROPERTIES: &[&str] =
    &["expression", "setValueExpression", "defaultValueExpression"];

pub fn is_expression_property(key: &str) -> bool {
    key.ends_with("If") || EXPRESSION_PROPERTIES.contains(&key)
}

/// Extract the names referenced by `{name}` placeholders, in order of
/// appearance
pub fn referenced_names(expr: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = expr;
    while let Some(open) = rest.find('{') {
        rest = &rest[open + 1..];
        match rest.find('}') {
            Some(close) => {
                let name = rest[..close].trim();
                if !name.is_empty() {
                    names.push(name.to_string());
                }
                rest = &rest[close + 1..];
            }
            None => break,
        }
    }
    names
}

/// Rewrite every `{old}` placeholder to `{new}`, returning `None` when the
/// expression does not reference `old`
pub fn rename_reference(expr: &str, old: &str, new: &str) -> Option<String> {
    let mut out = String::with_capacity(expr.len());
    let mut changed = false;
    let mut rest = expr;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open + 1]);
        rest = &rest[open + 1..];
        match rest.find('}') {
            Some(close) => {
                let body = &rest[..close];
                if body.trim() == old {
                    out.push_str(new);
                    changed = true;
                } else {
                    out.push_str(body);
                }
                out.push('}');
                rest = &rest[close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    changed.then_some(out)
}

/// Rewrite references to `old` anywhere inside a property value, including
/// collection items. Returns `None` when nothing referenced `old`.
pub fn rewrite_property(key: &str, value: &Value, old: &str, new: &str) -> Option<Value> {
    match value {
        Value::String(text) if is_expression_property(key) => {
            rename_reference(text, old, new).map(Value::String)
        }
        Value::Array(items) => {
            let mut changed = false;
            let rewritten: Vec<Value> = items
                .iter()
                .map(|item| match rewrite_property(key, item, old, new) {
                    Some(v) => {
                        changed = true;
                        v
                    }
                    None => item.clone(),
                })
                .collect();
            changed.then(|| Value::Array(rewritten))
        }
        Value::Object(map) => {
            let mut changed = false;
            let mut rewritten = map.clone();
            for (k, v) in map {
                if let Some(next) = rewrite_property(k, v, old, new) {
                    rewritten.insert(k.clone(), next);
                    changed = true;
                }
            }
            changed.then(|| Value::Object(rewritten))
        }
        _ => None,
    }
}

/// Whether a property value references `name` from any expression inside it
pub fn references_name(key: &str, value: &Value, name: &str) -> bool {
    match value {
        Value::String(text) if is_expression_property(key) => {
            referenced_names(text).iter().any(|n| n == name)
        }
        Value::Array(items) => items.iter().any(|item| references_name(key, item, name)),
        Value::Object(map) => map.iter().any(|(k, v)| references_name(k, v, name)),
        _ => false,
    }
}

/// One expression string found in the document
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionSite {
    /// Node owning the property
    pub node_id: String,
    /// Top-level property key the expression lives under
    pub property: String,
    /// The expression text itself
    pub text: String,
}

/// Collect every expression string in the subtree, one site per string
pub fn expression_sites(root: &SchemaNode) -> Vec<ExpressionSite> {
    fn collect_strings(key: &str, value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(text) if is_expression_property(key) => out.push(text.clone()),
            Value::Array(items) => {
                for item in items {
                    collect_strings(key, item, out);
                }
            }
            Value::Object(map) => {
                for (k, v) in map {
                    collect_strings(k, v, out);
                }
            }
            _ => {}
        }
    }

    fn walk(node: &SchemaNode, out: &mut Vec<ExpressionSite>) {
        for (key, value) in &node.properties {
            let mut texts = Vec::new();
            collect_strings(key, value, &mut texts);
            for text in texts {
                out.push(ExpressionSite {
                    node_id: node.id.clone(),
                    property: key.clone(),
                    text,
                });
            }
        }
        for child in &node.children {
            walk(child, out);
        }
    }

    let mut sites = Vec::new();
    walk(root, &mut sites);
    sites
}
