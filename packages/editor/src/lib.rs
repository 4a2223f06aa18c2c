//! # Surveyforge Editor
//!
//! Core editing engine for survey documents: the undo/redo transaction log
//! and the instrumented mutation path that feeds it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: schema tree + ids + JSON             │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: session + reversible history        │
//! │  - Typed mutations → recorded Commands      │
//! │  - Gesture grouping into Transactions       │
//! │  - Undo/redo via command inverses           │
//! │  - Resync of names/expressions/locales      │
//! │  - Selection re-anchoring                   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ collaborators: rendering, drag-drop,        │
//! │ property grid, auto-save (event consumers)  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Ids, not pointers**: commands and selection reference nodes by
//!    stable id and resolve lazily, so history replay can destroy and
//!    recreate any node safely
//! 2. **One instrumented path**: collaborators mutate only through the
//!    session's typed methods; nothing else touches the document
//! 3. **Atomic gestures**: everything one user gesture produces lands in one
//!    transaction, however many raw writes it triggered
//! 4. **Replay, never re-diff**: undo/redo apply recorded command inverses
//!    in strict reverse order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use surveyforge_editor::EditorSession;
//! use surveyforge_model::{NodeKind, SurveyDocument};
//!
//! let mut session = EditorSession::new(SurveyDocument::new("Feedback"));
//!
//! // One gesture, one undoable unit
//! session.begin_transaction(Some("Drag question"));
//! session.move_element(&question_id, &target_page_id, 0)?;
//! session.stop_transaction();
//!
//! session.undo()?;
//! session.redo()?;
//! ```

mod commands;
mod errors;
mod events;
mod recorder;
mod resync;
mod selection;
mod session;
mod transaction;

pub use commands::{Command, CommandError};
pub use errors::EditorError;
pub use events::{
    CancelableChannel, EventChannel, HandlerId, HistoryEvent, ModifiedEvent, ModifiedKind,
    SelectionEvent, SessionEvents,
};
pub use recorder::MutationRecorder;
pub use resync::{FlagKind, PropagateRenames, ResyncEngine, ResyncRule, ValidationFlag};
pub use selection::SelectionTracker;
pub use session::{EditorSession, SessionOptions, SessionState};
pub use transaction::{Transaction, TransactionLog};

// Re-export the model types consumers need to build documents
pub use surveyforge_model::{NodeKind, SchemaNode, SurveyDocument};
