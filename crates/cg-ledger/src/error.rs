// error.rs — Error types for the ledger.
//
// Each variant maps to a specific failure mode. A failed append never leaves
// a partial entry behind: the in-memory chain only advances after the sink
// accepted the whole batch.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Failed to open or create the ledger file.
    #[error("failed to open ledger at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write entries to the sink.
    #[error("failed to append entries: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// Failed to serialize a payload for hashing or storage.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A stored record could not be parsed.
    #[error("corrupt ledger record at line {line}: {source}")]
    CorruptRecord {
        line: usize,
        source: serde_json::Error,
    },

    /// The last record has no line terminator (interrupted write).
    #[error("torn ledger record at line {line}: missing line terminator")]
    TornWrite { line: usize },

    /// The hash chain is broken; appends are refused from here on.
    #[error("ledger chain broken at index {index}; operator intervention required")]
    ChainBroken { index: u64 },

    /// A state-changing call was made in replay mode.
    #[error("ledger append attempted in replay mode")]
    ReplayMode,

    /// An append was requested with nothing to write.
    #[error("ledger append called with an empty batch")]
    EmptyBatch,

    /// A thread panicked while holding the ledger lock.
    #[error("ledger lock poisoned")]
    LockPoisoned,
}
