//! # cg-canon
//!
//! The canon authority model: a versioned store of typed knowledge items, the
//! import boundary through which new items arrive, and the four-test
//! promotion gate that is the only way an item reaches CANON.
//!
//! - [`CanonStore`] — single-writer, multi-reader item store, optionally
//!   mirrored to a directory of JSON files.
//! - [`CanonLookup`] — the read-only view consumed by policy checks.
//! - [`import()`] — accepts EVIDENCE/PROPOSED items, never CANON.
//! - [`PromotionGate`] — `approved` iff resistance, reproducibility,
//!   invariant safety and feasibility impact all pass. Every decision is
//!   ledgered before the level changes.

pub mod error;
pub mod import;
pub mod promotion;
pub mod store;

pub use error::CanonError;
pub use import::import;
pub use promotion::{decide, PromotionGate, PromotionRequest};
pub use store::{CanonLookup, CanonStore, PinnedCanon};
