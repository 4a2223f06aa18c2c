//! Error types for the editor

use crate::commands::CommandError;
use surveyforge_model::ModelError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("A history replay is in progress; the document cannot be edited")]
    ReplayInProgress,

    #[error("Item {index} is out of range for {property} on {target_id}")]
    ItemOutOfRange {
        target_id: String,
        property: String,
        index: usize,
    },
}
