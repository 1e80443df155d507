// error.rs — Validation errors for schema values.

use thiserror::Error;

/// Errors raised when a schema value violates a structural rule.
#[derive(Debug, Error, PartialEq)]
pub enum TypesError {
    /// A canon item has an empty id.
    #[error("canon item has an empty id")]
    EmptyId,

    /// A canon item id that cannot double as a file name.
    #[error("canon item id '{item_id}' contains a path separator, '..', NUL or a leading '.'")]
    UnsafeId { item_id: String },

    /// A canon item's provenance reference is empty.
    #[error("canon item '{item_id}' has no provenance reference")]
    MissingProvenance { item_id: String },

    /// A candidate path's features contain NaN or an infinity.
    #[error("candidate path '{path_id}' has a non-finite {field}")]
    NonFiniteFeature { path_id: String, field: &'static str },

    /// A success probability outside [0, 1].
    #[error("candidate path '{path_id}' has success probability {value} outside [0, 1]")]
    ProbabilityOutOfRange { path_id: String, value: f64 },

    /// A candidate path has no actions.
    #[error("candidate path '{path_id}' has no actions")]
    EmptyPath { path_id: String },
}
