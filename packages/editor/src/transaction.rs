//! # Transaction Log
//!
//! Ordered history of committed transactions with a cursor separating the
//! applied past from the undone future.
//!
//! ## Design
//!
//! - A transaction is an ordered group of commands undone/redone as one unit
//! - `cursor` counts applied entries; entries past it are available to redo
//! - Committing while redo entries exist discards them (linear history)
//! - Undo/redo never re-diffs documents, they replay command inverses
//! - A failed replay rolls the partial work back so no half-applied
//!   transaction is ever observable

use crate::commands::{Command, CommandError};
use surveyforge_model::SurveyDocument;
use tracing::{error, warn};

/// A group of commands applied and reverted as one undoable unit
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Optional human label ("Drag question", "Rename q1")
    pub name: Option<String>,

    /// Commands in application order; reversal uses strict reverse order
    pub commands: Vec<Command>,
}

impl Transaction {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            commands: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Apply every command in order. On failure the already-applied prefix is
    /// reverted so the document is left as it was.
    pub fn apply(&self, doc: &mut SurveyDocument) -> Result<(), CommandError> {
        for (applied, command) in self.commands.iter().enumerate() {
            if let Err(err) = command.apply(doc) {
                for done in self.commands[..applied].iter().rev() {
                    if let Err(rollback_err) = done.revert(doc) {
                        error!(
                            command = done.name(),
                            %rollback_err,
                            "rollback after failed transaction apply did not complete"
                        );
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Revert every command in reverse order. On failure the already-reverted
    /// suffix is re-applied so the document is left as it was.
    pub fn revert(&self, doc: &mut SurveyDocument) -> Result<(), CommandError> {
        for (position, command) in self.commands.iter().enumerate().rev() {
            if let Err(err) = command.revert(doc) {
                for undone in &self.commands[position + 1..] {
                    if let Err(rollback_err) = undone.apply(doc) {
                        error!(
                            command = undone.name(),
                            %rollback_err,
                            "roll-forward after failed transaction revert did not complete"
                        );
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

/// Undo/redo history for an editing session
#[derive(Debug)]
pub struct TransactionLog {
    /// Committed transactions, oldest first
    entries: Vec<Transaction>,

    /// Number of applied entries; `entries[cursor..]` is the redo tail
    cursor: usize,

    /// Maximum number of retained entries (0 = unlimited)
    max_levels: usize,
}

impl TransactionLog {
    /// Create a log with the default retention (100 transactions)
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            max_levels,
        }
    }

    /// Append a committed transaction. Any undone entries past the cursor are
    /// discarded first: new edits invalidate the redo future.
    pub fn commit(&mut self, transaction: Transaction) {
        self.entries.truncate(self.cursor);
        self.entries.push(transaction);
        self.cursor = self.entries.len();

        if self.max_levels > 0 && self.entries.len() > self.max_levels {
            self.entries.remove(0);
            self.cursor -= 1;
        }
    }

    /// Revert the most recent applied transaction. Returns false when there
    /// is nothing to undo; a replay failure leaves the cursor (and document)
    /// unchanged.
    pub fn undo(&mut self, doc: &mut SurveyDocument) -> Result<bool, CommandError> {
        if !self.can_undo() {
            warn!("undo requested with no applied transactions");
            return Ok(false);
        }
        self.entries[self.cursor - 1].revert(doc)?;
        self.cursor -= 1;
        Ok(true)
    }

    /// Reapply the most recently undone transaction
    pub fn redo(&mut self, doc: &mut SurveyDocument) -> Result<bool, CommandError> {
        if !self.can_redo() {
            warn!("redo requested with no undone transactions");
            return Ok(false);
        }
        self.entries[self.cursor].apply(doc)?;
        self.cursor += 1;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn undo_levels(&self) -> usize {
        self.cursor
    }

    pub fn redo_levels(&self) -> usize {
        self.entries.len() - self.cursor
    }

    /// The transaction the next undo would revert
    pub fn peek_undo(&self) -> Option<&Transaction> {
        self.cursor.checked_sub(1).map(|i| &self.entries[i])
    }

    /// The transaction the next redo would reapply
    pub fn peek_redo(&self) -> Option<&Transaction> {
        self.entries.get(self.cursor)
    }

    /// Label of the transaction the next undo would revert
    pub fn undo_name(&self) -> Option<&str> {
        self.peek_undo().and_then(|t| t.name.as_deref())
    }

    /// Label of the transaction the next redo would reapply
    pub fn redo_name(&self) -> Option<&str> {
        self.peek_redo().and_then(|t| t.name.as_deref())
    }

    /// Drop all history (new document loaded, session disposed)
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self::new()
    }
}
