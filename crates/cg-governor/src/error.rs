// error.rs — Error types for the governor.
//
// A denied decision is a successful call: it returns a `DecisionResponse`
// whose traces are already in the ledger. These variants cover calls that
// could not be evaluated or committed at all.

use std::path::PathBuf;

use cg_canon::CanonError;
use cg_ledger::LedgerError;
use cg_policy::PolicyError;
use cg_types::TypesError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovernorError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("canon error: {0}")]
    Canon(#[from] CanonError),

    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    /// The decision request itself is malformed.
    #[error("invalid decision request: {0}")]
    InvalidRequest(#[from] TypesError),

    /// A request field that must be present is empty.
    #[error("invalid decision request: {field} is empty")]
    MissingField { field: &'static str },

    /// Failed to read the governor config file.
    #[error("failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The governor config file is not valid TOML for `GovernorConfig`.
    #[error("failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// The config parsed but holds a value the governor cannot use.
    #[error("invalid config at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    /// Canon or baselines kept moving between evaluation and commit.
    #[error("decision snapshot changed {attempts} times before commit; giving up")]
    SnapshotConflict { attempts: u32 },

    /// A thread panicked while holding the baseline lock.
    #[error("baseline registry lock poisoned")]
    LockPoisoned,
}
