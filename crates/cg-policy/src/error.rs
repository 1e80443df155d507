// error.rs — Error types for the policy subsystem.
//
// Denials are not errors. These variants cover inputs the engine cannot
// evaluate at all, such as a candidate with no actions or NaN features.

use cg_types::TypesError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    /// A candidate path is structurally invalid.
    #[error("invalid candidate: {0}")]
    InvalidCandidate(#[from] TypesError),

    /// Two candidates share an id, which would make tie-breaking ambiguous.
    #[error("duplicate candidate path id '{path_id}'")]
    DuplicatePath { path_id: String },

    /// A weight or bound is NaN or infinite.
    #[error("non-finite scoring parameter '{name}'")]
    NonFiniteParameter { name: &'static str },

    /// Finite features whose weighted total overflowed.
    #[error("candidate path '{path_id}' scores to a non-finite total")]
    NonFiniteScore { path_id: String },

    /// A scoring thread panicked.
    #[error("candidate scoring thread panicked")]
    ScoringPanicked,
}
