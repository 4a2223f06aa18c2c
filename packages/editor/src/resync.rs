//! # Dependency Resynchronization
//!
//! Mutations ripple into state that is not stored as direct object links:
//! expression strings reference nodes by name, logic rules bind to names,
//! and per-locale display strings are cached per node. After a command
//! applies (or history replays), this module repairs those cross-references.
//!
//! Rules produce *secondary commands* that the session applies and records in
//! the same transaction as the primary, so undo restores rewritten
//! expressions from their captured `before` text instead of recomputing them
//! at revert time. Advisory consistency (dangling references, duplicate
//! names) is reported as validation flags, never as blocked or rewritten
//! edits: user-authored logic is left textually intact.

use crate::commands::Command;
use serde_json::Value;
use surveyforge_common::{walk_node, Visitor};
use surveyforge_model::{
    expression_sites, referenced_names, rewrite_property, SchemaNode, SurveyDocument,
};
use tracing::debug;

/// A repair rule consulted after each primary command applies
pub trait ResyncRule: std::fmt::Debug {
    /// Secondary commands needed to keep cross-references consistent with
    /// the already-applied `command`
    fn analyze(&self, command: &Command, doc: &SurveyDocument) -> Vec<Command>;
}

/// Rewrites expression references when a node's identifying name changes
#[derive(Debug)]
pub struct PropagateRenames;

struct RenameScanner<'a> {
    old: &'a str,
    new: &'a str,
    commands: Vec<Command>,
}

impl Visitor for RenameScanner<'_> {
    fn visit_property(&mut self, node: &SchemaNode, key: &str, value: &Value) {
        if let Some(rewritten) = rewrite_property(key, value, self.old, self.new) {
            self.commands.push(Command::SetProperty {
                target_id: node.id.clone(),
                property: key.to_string(),
                before: Some(value.clone()),
                after: Some(rewritten),
            });
        }
    }
}

impl ResyncRule for PropagateRenames {
    fn analyze(&self, command: &Command, doc: &SurveyDocument) -> Vec<Command> {
        let Command::SetProperty {
            property,
            before: Some(Value::String(old)),
            after: Some(Value::String(new)),
            ..
        } = command
        else {
            return Vec::new();
        };
        if property != "name" || old == new {
            return Vec::new();
        }

        let mut scanner = RenameScanner {
            old,
            new,
            commands: Vec::new(),
        };
        scanner.visit_document(doc);
        if !scanner.commands.is_empty() {
            debug!(
                old = %old,
                new = %new,
                rewrites = scanner.commands.len(),
                "propagating rename into expressions"
            );
        }
        scanner.commands
    }
}

/// Advisory validation marker surfaced to the UI, never blocking an edit
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFlag {
    pub node_id: String,
    /// Property the problem lives under, when it is property-scoped
    pub property: Option<String>,
    pub kind: FlagKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    /// An expression references a name that no longer resolves
    DanglingReference,
    /// Two live nodes share an identifying name
    DuplicateName,
}

/// Post-effect engine: owns the rule set and the advisory sweeps
#[derive(Debug)]
pub struct ResyncEngine {
    rules: Vec<Box<dyn ResyncRule>>,
}

impl ResyncEngine {
    pub fn new() -> Self {
        Self {
            rules: vec![Box::new(PropagateRenames)],
        }
    }

    /// Collect every secondary command the rules demand for `command`
    pub fn analyze(&self, command: &Command, doc: &SurveyDocument) -> Vec<Command> {
        let mut secondary = Vec::new();
        for rule in &self.rules {
            secondary.append(&mut rule.analyze(command, doc));
        }
        secondary
    }

    /// Re-scan the document for advisory problems. Runs after every commit,
    /// undo, and redo; the result replaces the session's current flag set.
    pub fn audit(&self, doc: &SurveyDocument) -> Vec<ValidationFlag> {
        let mut flags = Vec::new();

        for site in expression_sites(doc.root()) {
            for name in referenced_names(&site.text) {
                if doc.find_by_name(&name).is_none() {
                    flags.push(ValidationFlag {
                        node_id: site.node_id.clone(),
                        property: Some(site.property.clone()),
                        kind: FlagKind::DanglingReference,
                        message: format!(
                            "expression \"{}\" references unknown element \"{}\"",
                            site.text, name
                        ),
                    });
                }
            }
        }

        struct NameAuditor<'a> {
            doc: &'a SurveyDocument,
            flags: &'a mut Vec<ValidationFlag>,
        }
        impl Visitor for NameAuditor<'_> {
            fn visit_node(&mut self, node: &SchemaNode) {
                if self.doc.name_exists(&node.name, Some(&node.id)) {
                    self.flags.push(ValidationFlag {
                        node_id: node.id.clone(),
                        property: None,
                        kind: FlagKind::DuplicateName,
                        message: format!("name \"{}\" is used by another element", node.name),
                    });
                }
                walk_node(self, node);
            }
        }
        NameAuditor {
            doc,
            flags: &mut flags,
        }
        .visit_document(doc);

        flags
    }

    /// Invalidate cached per-locale strings for the subtrees a batch of
    /// commands touched. Removal snapshots carry their own subtree because
    /// the ids are no longer reachable through the document.
    pub fn invalidate_locales(
        &self,
        commands: &[Command],
        doc: &SurveyDocument,
        cache: &mut surveyforge_model::LocaleCache,
    ) {
        for command in commands {
            match command {
                Command::AddElement { snapshot, .. } | Command::RemoveElement { snapshot, .. } => {
                    cache.invalidate_subtree(snapshot);
                }
                Command::MoveElement { target_id, .. } => {
                    if let Some(node) = doc.find(target_id) {
                        cache.invalidate_subtree(node);
                    } else {
                        cache.invalidate(target_id);
                    }
                }
                Command::SetProperty { target_id, .. }
                | Command::CollectionItemAdd { target_id, .. }
                | Command::CollectionItemRemove { target_id, .. }
                | Command::CollectionReorder { target_id, .. } => {
                    cache.invalidate(target_id);
                }
            }
        }
    }
}

impl Default for ResyncEngine {
    fn default() -> Self {
        Self::new()
    }
}
