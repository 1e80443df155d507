//! # cg-ledger
//!
//! Append-only, hash-chained record of every decision, promotion and denial.
//!
//! Each [`LedgerEntry`] carries the hash of its predecessor and its own hash:
//!
//! ```text
//! current_hash = SHA-256(previous_hash ∥ canonical_json({payload, timestamp}))
//! ```
//!
//! The first entry links to [`GENESIS_HASH`] (64 zero characters). Editing,
//! inserting or deleting any entry breaks the chain, and [`verify`] reports the
//! first broken index. Entries after a break are untrusted and the ledger
//! refuses further appends until an operator intervenes.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use cg_ledger::{Ledger, LedgerPayload};
//! use cg_types::{CanonImportRecord, ExecutionMode};
//!
//! let ledger = Ledger::open("/tmp/ledger.jsonl").unwrap();
//! let record = CanonImportRecord { timestamp: chrono::Utc::now(), item_ids: vec!["DEF_TTV".into()] };
//! let entry = ledger
//!     .append(ExecutionMode::Live, LedgerPayload::CanonImport(record))
//!     .unwrap();
//! assert_eq!(entry.sequence_index, 0);
//! ```

pub mod entry;
pub mod error;
pub mod hasher;
pub mod ledger;
pub mod payload;
pub mod query;
pub mod sink;
pub mod subscribe;

pub use entry::{verify, verify_records, LedgerEntry, VerifyReport};
pub use error::LedgerError;
pub use hasher::GENESIS_HASH;
pub use ledger::Ledger;
pub use payload::LedgerPayload;
pub use query::WhyNotFilter;
pub use sink::{FileSink, LedgerSink, MemorySink};
pub use subscribe::{Subscription, SubscriptionId, DEFAULT_SUBSCRIBER_CAPACITY};
