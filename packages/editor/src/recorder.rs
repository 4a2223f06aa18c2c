//! # Mutation Recorder
//!
//! The gesture-grouping boundary. Every instrumented mutation flows through
//! here on its way to the transaction log; while a gesture is open the
//! recorder accumulates commands and coalesces the noise a single user
//! action produces (per-pixel property writes, detach/re-attach pairs).
//!
//! ## Grouping
//!
//! `begin`/`stop` pairs are re-entrant: a drag across pages triggers deletion
//! on the source page and insertion on the target page, each independently
//! instrumented with its own begin/stop, and all of it must land in the one
//! transaction the drag opened. Only the outermost `begin` opens a
//! transaction; inner pairs are absorbed by a depth counter. An unbalanced
//! `stop` is a warned no-op and never corrupts the depth.
//!
//! ## Coalescing
//!
//! - Writes to the same property of the same node merge into one command:
//!   `before` from the first write, `after` from the last. A chain that ends
//!   back at the original value vanishes entirely.
//! - A remove immediately followed by an add of the same node becomes one
//!   `MoveElement`, preserving the node's identity for in-flight references.
//!
//! History replay must never re-enter the recorder: undo applies command
//! inverses directly, and recording those would generate fresh commands
//! recursively. The session raises the `replaying` flag around replay.

use crate::commands::Command;
use crate::transaction::Transaction;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct MutationRecorder {
    /// Nesting depth of begin/stop pairs
    depth: usize,

    /// The transaction accumulating the current gesture
    open: Option<Transaction>,

    /// Set while undo/redo replays history
    replaying: bool,
}

impl MutationRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or nest into) a gesture scope
    pub fn begin(&mut self, name: Option<String>) {
        if self.depth == 0 {
            self.open = Some(Transaction::new(name));
        }
        self.depth += 1;
    }

    /// Close one gesture scope. Returns the sealed transaction when the
    /// outermost scope closes; inner closes return None.
    pub fn stop(&mut self) -> Option<Transaction> {
        if self.depth == 0 {
            warn!("stop_transaction called without a matching begin_transaction");
            return None;
        }
        self.depth -= 1;
        if self.depth == 0 {
            self.open.take()
        } else {
            None
        }
    }

    /// Abandon the open gesture wholesale (drag cancelled, validation
    /// failure). Returns the accumulated transaction so the caller can revert
    /// it; the depth resets no matter how deeply nested the gesture was.
    pub fn abandon(&mut self) -> Option<Transaction> {
        if self.depth == 0 {
            warn!("rollback_transaction called without an open transaction");
            return None;
        }
        self.depth = 0;
        self.open.take()
    }

    pub fn is_open(&self) -> bool {
        self.depth > 0
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    pub fn set_replaying(&mut self, replaying: bool) {
        self.replaying = replaying;
    }

    /// Number of commands accumulated in the open transaction
    pub fn pending_len(&self) -> usize {
        self.open.as_ref().map(|t| t.len()).unwrap_or(0)
    }

    /// Record an already-applied command into the open transaction.
    ///
    /// Callers must only record while a transaction is open; commands outside
    /// any gesture are wrapped in an implicit transaction by the session.
    pub fn record(&mut self, command: Command) {
        debug_assert!(self.depth > 0, "record() outside an open transaction");
        let Some(open) = self.open.as_mut() else {
            warn!(command = command.name(), "dropping command recorded outside a transaction");
            return;
        };

        match &command {
            Command::SetProperty {
                target_id,
                property,
                after,
                ..
            } => {
                // Merge with an earlier write to the same slot
                let existing = open.commands.iter().position(|c| {
                    matches!(
                        c,
                        Command::SetProperty { target_id: t, property: p, .. }
                            if t == target_id && p == property
                    )
                });
                if let Some(existing) = existing {
                    let drop_merged = {
                        let Command::SetProperty {
                            before,
                            after: merged_after,
                            ..
                        } = &mut open.commands[existing]
                        else {
                            unreachable!()
                        };
                        *merged_after = after.clone();
                        before == merged_after
                    };
                    if drop_merged {
                        // The chain returned to its starting value
                        debug!(target = %target_id, property = %property, "coalesced write chain to nothing");
                        open.commands.remove(existing);
                    }
                    return;
                }
            }

            Command::AddElement {
                parent_id: new_parent_id,
                index: new_index,
                snapshot,
            } => {
                // Detach immediately followed by re-attach is a move
                let prior = match open.commands.last() {
                    Some(Command::RemoveElement {
                        parent_id,
                        index,
                        snapshot: removed,
                    }) if removed.id == snapshot.id => Some((parent_id.clone(), *index)),
                    _ => None,
                };
                if let Some((old_parent_id, old_index)) = prior {
                    open.commands.pop();
                    if old_parent_id != *new_parent_id || old_index != *new_index {
                        open.commands.push(Command::MoveElement {
                            target_id: snapshot.id.clone(),
                            old_parent_id,
                            old_index,
                            new_parent_id: new_parent_id.clone(),
                            new_index: *new_index,
                        });
                    } else {
                        // Re-attached into the very slot it left
                        debug!(target = %snapshot.id, "detach/re-attach pair coalesced to nothing");
                    }
                    return;
                }
            }

            _ => {}
        }

        open.commands.push(command);
    }
}
