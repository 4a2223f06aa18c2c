//! # Surveyforge Model
//!
//! The survey document object graph.
//!
//! A survey is a tree of addressable nodes (pages, panels, questions) hanging
//! off a single root. Every node carries a stable id, a user-facing name, and
//! a JSON property bag. All cross-references between nodes (visibility
//! conditions, logic rules, selection) are by name or id, never by pointer,
//! so history replay can destroy and recreate nodes without invalidating
//! anything that points at them.
//!
//! The model knows nothing about editing history. The editor crate drives all
//! mutations through [`SurveyDocument`]'s structural operations.

mod error;
mod expression;
mod id_generator;
mod locale;
mod schema;
mod serializer;

pub use error::ModelError;
pub use expression::{
    expression_sites, is_expression_property, referenced_names, references_name, rename_reference,
    rewrite_property, ExpressionSite, EXPRESSION_PROPERTIES,
};
pub use id_generator::{get_document_seed, IdGenerator};
pub use locale::LocaleCache;
pub use schema::{NodeKind, SchemaNode, SurveyDocument, NAME_PROPERTY};
pub use serializer::{document_from_json, document_to_json};
