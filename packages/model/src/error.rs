//! Error types for the document model

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Parent not found: {0}")]
    ParentNotFound(String),

    #[error("A {child} cannot be placed inside a {parent}")]
    InvalidContainment {
        parent: &'static str,
        child: &'static str,
    },

    #[error("Duplicate node id: {0}")]
    DuplicateId(String),

    #[error("The document root cannot be detached")]
    CannotDetachRoot,

    #[error("Would create cycle: {0} is an ancestor of the target parent")]
    CycleDetected(String),

    #[error("The name of {0} must be a non-empty string")]
    InvalidName(String),

    #[error("Invalid document JSON: {0}")]
    InvalidJson(String),
}
