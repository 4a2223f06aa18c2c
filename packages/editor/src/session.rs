//! # Edit Session
//!
//! The explicit context object owning one editing session: the document, its
//! transaction log, the mutation recorder, the resynchronization engine,
//! selection, notification channels, and caches. There is no process-wide
//! "current session" state; collaborators hold the session they were given.
//!
//! All document mutation goes through the typed methods here — that is the
//! instrumented path that turns raw changes into recorded commands. The
//! session never hands out `&mut` access to the document.
//!
//! ## Gesture flow
//!
//! ```text
//! UI gesture → begin_transaction()
//!            → set_property()/move_element()/... (recorded + coalesced)
//!            → resynchronization appends secondary commands
//!            → stop_transaction() seals and commits one undoable unit
//! undo()/redo() replay the log through command inverses, then re-anchor
//! selection, re-audit references, and notify collaborators.
//! ```
//!
//! Mutations called outside an open transaction commit as their own implicit
//! single-step transaction.

use crate::commands::{Command, CommandError};
use crate::events::{HistoryEvent, ModifiedEvent, ModifiedKind, SessionEvents};
use crate::recorder::MutationRecorder;
use crate::resync::{ResyncEngine, ValidationFlag};
use crate::selection::SelectionTracker;
use crate::transaction::{Transaction, TransactionLog};
use crate::EditorError;
use serde_json::Value;
use surveyforge_model::{
    document_to_json, LocaleCache, ModelError, NodeKind, SchemaNode, SurveyDocument,
};
use tracing::{debug, warn};

/// Session tuning knobs, passed explicitly at construction
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Maximum retained undo levels (0 = unlimited)
    pub max_undo_levels: usize,
    /// Capacity of the navigate-back selection history
    pub selection_history: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_undo_levels: 100,
            selection_history: 50,
        }
    }
}

/// Saved/modified indicator consumed by auto-save and title-bar collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Saved,
    Modified,
}

/// One editing session over one survey document
pub struct EditorSession {
    document: SurveyDocument,
    log: TransactionLog,
    recorder: MutationRecorder,
    resync: ResyncEngine,
    selection: SelectionTracker,
    events: SessionEvents,
    locale_cache: LocaleCache,
    flags: Vec<ValidationFlag>,
    modified: bool,
}

impl EditorSession {
    pub fn new(document: SurveyDocument) -> Self {
        Self::with_options(document, SessionOptions::default())
    }

    pub fn with_options(document: SurveyDocument, options: SessionOptions) -> Self {
        Self {
            document,
            log: TransactionLog::with_max_levels(options.max_undo_levels),
            recorder: MutationRecorder::new(),
            resync: ResyncEngine::new(),
            selection: SelectionTracker::new(options.selection_history),
            events: SessionEvents::default(),
            locale_cache: LocaleCache::new(),
            flags: Vec::new(),
            modified: false,
        }
    }

    // ---- document access -------------------------------------------------

    pub fn document(&self) -> &SurveyDocument {
        &self.document
    }

    /// Allocate a fresh node for a later `add_element`
    pub fn new_node(&mut self, kind: NodeKind, name: impl Into<String>) -> SchemaNode {
        self.document.new_node(kind, name)
    }

    /// The persisted JSON view of the document
    pub fn export_json(&self) -> Value {
        document_to_json(&self.document)
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    pub fn validation_flags(&self) -> &[ValidationFlag] {
        &self.flags
    }

    pub fn locale_cache(&self) -> &LocaleCache {
        &self.locale_cache
    }

    pub fn locale_cache_mut(&mut self) -> &mut LocaleCache {
        &mut self.locale_cache
    }

    // ---- saved/modified state --------------------------------------------

    pub fn state(&self) -> SessionState {
        if self.modified {
            SessionState::Modified
        } else {
            SessionState::Saved
        }
    }

    /// Mark the current document revision as persisted
    pub fn set_saved(&mut self) {
        self.modified = false;
    }

    /// Replace the document (new survey loaded), dropping history, selection,
    /// flags, and caches
    pub fn reset(&mut self, document: SurveyDocument) {
        self.document = document;
        self.log.clear();
        self.recorder = MutationRecorder::new();
        self.selection.clear();
        self.locale_cache.clear();
        self.flags.clear();
        self.modified = false;
    }

    // ---- transaction boundaries ------------------------------------------

    /// Open (or nest into) a gesture-level transaction
    pub fn begin_transaction(&mut self, name: Option<&str>) {
        if self.recorder.is_replaying() {
            warn!("begin_transaction ignored during history replay");
            return;
        }
        self.recorder.begin(name.map(String::from));
    }

    /// Close one transaction scope; the outermost close commits the gesture
    /// as a single undoable unit (or discards it when nothing was recorded)
    pub fn stop_transaction(&mut self) {
        if let Some(transaction) = self.recorder.stop() {
            self.commit(transaction);
        }
    }

    /// Abandon the open transaction: revert everything it accumulated and
    /// record nothing (cancelled drag, failed validation mid-gesture)
    pub fn rollback_transaction(&mut self) {
        self.abort_open();
    }

    pub fn is_transaction_open(&self) -> bool {
        self.recorder.is_open()
    }

    // ---- mutations (the instrumented path) -------------------------------

    /// Set a property value; a write equal to the current value records
    /// nothing
    pub fn set_property(
        &mut self,
        target_id: &str,
        property: &str,
        value: Value,
    ) -> Result<(), EditorError> {
        self.mutate(|s| {
            let node = s
                .document
                .find(target_id)
                .ok_or_else(|| ModelError::NodeNotFound(target_id.to_string()))?;
            let before = node.property_value(property);
            if before.as_ref() == Some(&value) {
                return Ok(());
            }
            s.apply_and_record(Command::SetProperty {
                target_id: target_id.to_string(),
                property: property.to_string(),
                before,
                after: Some(value),
            })
        })
    }

    /// Remove a property outright (reset to unset)
    pub fn remove_property(&mut self, target_id: &str, property: &str) -> Result<(), EditorError> {
        self.mutate(|s| {
            let node = s
                .document
                .find(target_id)
                .ok_or_else(|| ModelError::NodeNotFound(target_id.to_string()))?;
            let Some(before) = node.property_value(property) else {
                return Ok(());
            };
            s.apply_and_record(Command::SetProperty {
                target_id: target_id.to_string(),
                property: property.to_string(),
                before: Some(before),
                after: None,
            })
        })
    }

    /// Insert a subtree under `parent_id`, clamping `index` to the child
    /// count. Returns the new element's id.
    pub fn add_element(
        &mut self,
        parent_id: &str,
        index: usize,
        node: SchemaNode,
    ) -> Result<String, EditorError> {
        let id = node.id.clone();
        self.mutate(|s| {
            let parent = s
                .document
                .find(parent_id)
                .ok_or_else(|| ModelError::ParentNotFound(parent_id.to_string()))?;
            let index = index.min(parent.children.len());
            s.apply_and_record(Command::AddElement {
                parent_id: parent_id.to_string(),
                index,
                snapshot: node,
            })
        })?;
        Ok(id)
    }

    /// Delete a subtree. Selection re-anchors at commit time, so a detach
    /// that a gesture immediately re-attaches elsewhere never disturbs the
    /// focused element.
    pub fn remove_element(&mut self, target_id: &str) -> Result<(), EditorError> {
        self.mutate(|s| {
            let (parent_id, index) = s
                .document
                .position_of(target_id)
                .ok_or_else(|| ModelError::NodeNotFound(target_id.to_string()))?;
            let snapshot = s
                .document
                .find(target_id)
                .ok_or_else(|| ModelError::NodeNotFound(target_id.to_string()))?
                .clone();
            s.apply_and_record(Command::RemoveElement {
                parent_id,
                index,
                snapshot,
            })
        })
    }

    /// Relocate an element. `new_index` is the resting index in the new
    /// parent, i.e. the position the node occupies once the move completes.
    pub fn move_element(
        &mut self,
        target_id: &str,
        new_parent_id: &str,
        new_index: usize,
    ) -> Result<(), EditorError> {
        self.mutate(|s| {
            let (old_parent_id, old_index) = s
                .document
                .position_of(target_id)
                .ok_or_else(|| ModelError::NodeNotFound(target_id.to_string()))?;
            let parent = s
                .document
                .find(new_parent_id)
                .ok_or_else(|| ModelError::ParentNotFound(new_parent_id.to_string()))?;
            let capacity = if new_parent_id == old_parent_id {
                parent.children.len() - 1
            } else {
                parent.children.len()
            };
            let new_index = new_index.min(capacity);
            if old_parent_id == new_parent_id && old_index == new_index {
                return Ok(());
            }
            s.apply_and_record(Command::MoveElement {
                target_id: target_id.to_string(),
                old_parent_id,
                old_index,
                new_parent_id: new_parent_id.to_string(),
                new_index,
            })
        })
    }

    /// Insert one item into an array property, creating the array when the
    /// property is unset
    pub fn insert_item(
        &mut self,
        target_id: &str,
        property: &str,
        index: usize,
        item: Value,
    ) -> Result<(), EditorError> {
        self.mutate(|s| {
            let node = s
                .document
                .find(target_id)
                .ok_or_else(|| ModelError::NodeNotFound(target_id.to_string()))?;
            let len = match node.property(property) {
                None => {
                    // Materialize the collection as its own recorded step so
                    // undo restores "property unset" exactly
                    s.apply_and_record(Command::SetProperty {
                        target_id: target_id.to_string(),
                        property: property.to_string(),
                        before: None,
                        after: Some(Value::Array(Vec::new())),
                    })?;
                    0
                }
                Some(Value::Array(items)) => items.len(),
                Some(_) => {
                    return Err(CommandError::NotACollection {
                        target_id: target_id.to_string(),
                        property: property.to_string(),
                    }
                    .into())
                }
            };
            s.apply_and_record(Command::CollectionItemAdd {
                target_id: target_id.to_string(),
                property: property.to_string(),
                index: index.min(len),
                item,
            })
        })
    }

    /// Remove one item from an array property
    pub fn remove_item(
        &mut self,
        target_id: &str,
        property: &str,
        index: usize,
    ) -> Result<(), EditorError> {
        self.mutate(|s| {
            let node = s
                .document
                .find(target_id)
                .ok_or_else(|| ModelError::NodeNotFound(target_id.to_string()))?;
            let Some(Value::Array(items)) = node.property(property) else {
                return Err(CommandError::NotACollection {
                    target_id: target_id.to_string(),
                    property: property.to_string(),
                }
                .into());
            };
            let item = items
                .get(index)
                .cloned()
                .ok_or_else(|| EditorError::ItemOutOfRange {
                    target_id: target_id.to_string(),
                    property: property.to_string(),
                    index,
                })?;
            s.apply_and_record(Command::CollectionItemRemove {
                target_id: target_id.to_string(),
                property: property.to_string(),
                index,
                item,
            })
        })
    }

    /// Replace an array property's ordering wholesale (drag-sorted choices)
    pub fn reorder_items(
        &mut self,
        target_id: &str,
        property: &str,
        new_order: Vec<Value>,
    ) -> Result<(), EditorError> {
        self.mutate(|s| {
            let node = s
                .document
                .find(target_id)
                .ok_or_else(|| ModelError::NodeNotFound(target_id.to_string()))?;
            let Some(Value::Array(items)) = node.property(property) else {
                return Err(CommandError::NotACollection {
                    target_id: target_id.to_string(),
                    property: property.to_string(),
                }
                .into());
            };
            let before = items.clone();
            if before == new_order {
                return Ok(());
            }
            s.apply_and_record(Command::CollectionReorder {
                target_id: target_id.to_string(),
                property: property.to_string(),
                before,
                after: new_order,
            })
        })
    }

    // ---- undo/redo -------------------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.log.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.log.can_redo()
    }

    pub fn undo_name(&self) -> Option<&str> {
        self.log.undo_name()
    }

    pub fn redo_name(&self) -> Option<&str> {
        self.log.redo_name()
    }

    /// True while undo/redo replays history; instrumented mutations are
    /// rejected for the duration
    pub fn is_processing_history(&self) -> bool {
        self.recorder.is_replaying()
    }

    /// Revert the most recent transaction. Returns whether an undo was
    /// available and performed; empty history and subscriber vetoes are
    /// reported as `Ok(false)`, never as errors.
    pub fn undo(&mut self) -> Result<bool, EditorError> {
        if self.recorder.is_open() {
            warn!("undo requested while a transaction is open");
            return Ok(false);
        }
        if !self.log.can_undo() {
            warn!("undo requested with empty history");
            return Ok(false);
        }

        let name = self.log.undo_name().map(String::from);
        let event = HistoryEvent {
            transaction: name.clone(),
        };
        if !self.events.before_undo.emit(&event) {
            debug!("undo vetoed by a subscriber");
            return Ok(false);
        }

        let commands = self
            .log
            .peek_undo()
            .map(|t| t.commands.clone())
            .unwrap_or_default();
        let performed = self.replay(|log, doc| log.undo(doc))?;
        if performed {
            self.after_replay(&commands, ModifiedKind::Undo, name);
        }
        Ok(performed)
    }

    /// Reapply the most recently undone transaction
    pub fn redo(&mut self) -> Result<bool, EditorError> {
        if self.recorder.is_open() {
            warn!("redo requested while a transaction is open");
            return Ok(false);
        }
        if !self.log.can_redo() {
            warn!("redo requested with empty redo history");
            return Ok(false);
        }

        let name = self.log.redo_name().map(String::from);
        let event = HistoryEvent {
            transaction: name.clone(),
        };
        if !self.events.before_redo.emit(&event) {
            debug!("redo vetoed by a subscriber");
            return Ok(false);
        }

        let commands = self
            .log
            .peek_redo()
            .map(|t| t.commands.clone())
            .unwrap_or_default();
        let performed = self.replay(|log, doc| log.redo(doc))?;
        if performed {
            self.after_replay(&commands, ModifiedKind::Redo, name);
        }
        Ok(performed)
    }

    // ---- selection -------------------------------------------------------

    pub fn selected_id(&self) -> Option<&str> {
        self.selection.focused_id()
    }

    /// Focus an element (or clear focus with `None`). Returns false when the
    /// id does not resolve or a subscriber vetoed the change.
    pub fn select(&mut self, id: Option<&str>) -> bool {
        self.selection.select(id, &self.document, &self.events)
    }

    /// Return focus to the most recent previously-selected element that
    /// still exists
    pub fn navigate_back(&mut self) -> bool {
        self.selection.navigate_back(&self.document, &self.events)
    }

    // ---- internals -------------------------------------------------------

    fn mutate<F>(&mut self, f: F) -> Result<(), EditorError>
    where
        F: FnOnce(&mut Self) -> Result<(), EditorError>,
    {
        if self.recorder.is_replaying() {
            warn!("mutation rejected during history replay");
            return Err(EditorError::ReplayInProgress);
        }

        let implicit = !self.recorder.is_open();
        if implicit {
            self.recorder.begin(None);
        }
        let result = f(self);
        if implicit {
            match &result {
                Ok(()) => {
                    if let Some(transaction) = self.recorder.stop() {
                        self.commit(transaction);
                    }
                }
                Err(_) => self.abort_open(),
            }
        }
        result
    }

    /// Apply a primary command, let the resynchronizer append its secondary
    /// commands, and record everything into the open transaction
    fn apply_and_record(&mut self, command: Command) -> Result<(), EditorError> {
        command.apply(&mut self.document)?;
        let secondary = self.resync.analyze(&command, &self.document);
        self.recorder.record(command);
        for command in secondary {
            command.apply(&mut self.document)?;
            self.recorder.record(command);
        }
        Ok(())
    }

    fn commit(&mut self, transaction: Transaction) {
        if transaction.is_empty() {
            debug!("discarding empty transaction");
            return;
        }
        debug!(
            name = transaction.name.as_deref().unwrap_or("<unnamed>"),
            commands = transaction.len(),
            "committing transaction"
        );
        let name = transaction.name.clone();
        self.resync
            .invalidate_locales(&transaction.commands, &self.document, &mut self.locale_cache);
        self.log.commit(transaction);
        self.flags = self.resync.audit(&self.document);
        self.selection.revalidate(&self.document, &self.events);
        self.modified = true;
        self.events.modified.emit(&ModifiedEvent {
            kind: ModifiedKind::Commit,
            transaction: name,
        });
    }

    fn abort_open(&mut self) {
        if let Some(transaction) = self.recorder.abandon() {
            debug!(commands = transaction.len(), "rolling back abandoned transaction");
            if let Err(err) = transaction.revert(&mut self.document) {
                warn!(%err, "abandoned transaction did not fully revert");
            }
            self.selection.revalidate(&self.document, &self.events);
        }
    }

    fn replay<F>(&mut self, op: F) -> Result<bool, EditorError>
    where
        F: FnOnce(&mut TransactionLog, &mut SurveyDocument) -> Result<bool, CommandError>,
    {
        self.recorder.set_replaying(true);
        let result = op(&mut self.log, &mut self.document);
        self.recorder.set_replaying(false);
        Ok(result?)
    }

    fn after_replay(&mut self, commands: &[Command], kind: ModifiedKind, name: Option<String>) {
        self.resync
            .invalidate_locales(commands, &self.document, &mut self.locale_cache);
        self.flags = self.resync.audit(&self.document);
        self.selection.revalidate(&self.document, &self.events);
        self.modified = true;
        self.events.modified.emit(&ModifiedEvent {
            kind,
            transaction: name,
        });
    }
}
