// error.rs — Error types for the canon store and promotion gate.
//
// A promotion that fails its tests is not an error: it is a ledgered
// `PromotionDecision` with `approved = false`. These variants cover requests
// that cannot be evaluated at all.

use std::path::PathBuf;

use cg_ledger::LedgerError;
use cg_types::{CanonLevel, TypesError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonError {
    /// No item with this id exists in the store.
    #[error("canon item not found: {0}")]
    NotFound(String),

    /// The item is already CANON; there is nothing to promote to.
    #[error("canon item '{item_id}' is already CANON")]
    AlreadyCanon { item_id: String },

    /// The request's `from` level does not match the item's current level.
    #[error("stale promotion request for '{item_id}': requested from {requested}, current level is {current}")]
    StaleLevel {
        item_id: String,
        requested: CanonLevel,
        current: CanonLevel,
    },

    /// Promotion targets anything other than CANON.
    #[error("invalid promotion target for '{item_id}': {to} (only CANON is reachable)")]
    InvalidTarget { item_id: String, to: CanonLevel },

    /// An import batch contained an item already at CANON level.
    #[error("canon item '{item_id}' arrived at CANON level; only the promotion gate may grant CANON")]
    CanonAtImport { item_id: String },

    /// An import batch reused an id already in the store.
    #[error("canon item '{item_id}' already exists")]
    AlreadyExists { item_id: String },

    /// An import batch was empty.
    #[error("canon import batch is empty")]
    EmptyImport,

    /// An item failed structural validation.
    #[error(transparent)]
    InvalidItem(#[from] TypesError),

    /// The ledger rejected the record; nothing was changed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Reading or writing an item file failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An item file could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A thread panicked while holding the store lock.
    #[error("canon store lock poisoned")]
    LockPoisoned,
}
