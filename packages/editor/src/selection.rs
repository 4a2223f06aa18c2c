//! # Selection Tracking
//!
//! The focused element is weak state: it names a node that any undo, redo,
//! or delete may destroy. The tracker therefore stores an id plus the
//! ancestor path captured at focus time, resolves lazily against the
//! document, and re-validates after every history replay. When the focused
//! id stops resolving, focus falls back to the nearest surviving ancestor,
//! then to the document root.
//!
//! No transition is silent: every change emits a cancelable
//! `selection_changing` followed by a final `selection_changed`.

use crate::events::{SelectionEvent, SessionEvents};
use surveyforge_model::SurveyDocument;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct FocusAnchor {
    id: String,
    /// Ancestor ids at focus time, nearest first
    ancestors: Vec<String>,
}

#[derive(Debug)]
pub struct SelectionTracker {
    focused: Option<FocusAnchor>,

    /// Previously focused ids, most recent last
    history: Vec<String>,
    capacity: usize,
}

impl SelectionTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            focused: None,
            history: Vec::new(),
            capacity,
        }
    }

    pub fn focused_id(&self) -> Option<&str> {
        self.focused.as_ref().map(|a| a.id.as_str())
    }

    /// Explicit focus change. Returns false when the target does not resolve
    /// or a subscriber vetoed the change.
    pub fn select(
        &mut self,
        id: Option<&str>,
        doc: &SurveyDocument,
        events: &SessionEvents,
    ) -> bool {
        if let Some(id) = id {
            if !doc.contains(id) {
                warn!(id = %id, "select requested for an unknown node");
                return false;
            }
        }
        self.transition(id, doc, events, false)
    }

    /// Re-anchor after undo/redo or a deletion. A dangling focus falls back
    /// to the nearest surviving ancestor, else the root. Forced transitions
    /// still notify, but a veto cannot keep focus on a node that no longer
    /// exists, so it clears the selection instead.
    pub fn revalidate(&mut self, doc: &SurveyDocument, events: &SessionEvents) {
        let Some(anchor) = &self.focused else {
            return;
        };

        if doc.contains(&anchor.id) {
            // Still alive; the ancestor path may have changed under a move
            let id = anchor.id.clone();
            self.focused = Some(FocusAnchor {
                ancestors: doc.ancestors(&id),
                id,
            });
            return;
        }

        let fallback = anchor
            .ancestors
            .iter()
            .find(|a| doc.contains(a))
            .cloned()
            .unwrap_or_else(|| doc.root_id().to_string());
        debug!(lost = %anchor.id, fallback = %fallback, "focused node vanished, falling back");

        if !self.transition(Some(&fallback), doc, events, true) {
            self.transition(None, doc, events, true);
        }
    }

    /// Pop back to the most recent previously-focused id that still resolves
    pub fn navigate_back(&mut self, doc: &SurveyDocument, events: &SessionEvents) -> bool {
        while let Some(candidate) = self.history.pop() {
            if doc.contains(&candidate) {
                return self.transition(Some(&candidate), doc, events, false);
            }
        }
        false
    }

    pub fn clear(&mut self) {
        self.focused = None;
        self.history.clear();
    }

    fn transition(
        &mut self,
        id: Option<&str>,
        doc: &SurveyDocument,
        events: &SessionEvents,
        forced: bool,
    ) -> bool {
        let old_id = self.focused_id().map(String::from);
        if old_id.as_deref() == id {
            return true;
        }

        let event = SelectionEvent {
            old_id: old_id.clone(),
            new_id: id.map(String::from),
        };
        if !events.selection_changing.emit(&event) && !forced {
            return false;
        }

        if let Some(old) = old_id {
            self.history.push(old);
            if self.history.len() > self.capacity {
                self.history.remove(0);
            }
        }

        self.focused = id.map(|id| FocusAnchor {
            ancestors: doc.ancestors(id),
            id: id.to_string(),
        });
        events.selection_changed.emit(&event);
        true
    }
}
