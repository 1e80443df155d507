//! # cg-policy
//!
//! Pure, synchronous policy evaluation for the governance core.
//!
//! - [`require_canon_refs`] — the authority boundary: an action may cite only
//!   CANON-level items, and must cite at least one.
//! - [`check_invariant`] / [`check_all`] — the fixed registry of hard
//!   invariants ([`InvariantId`]), every violation collected.
//! - [`check_non_interference`] — an action may not raise any other agent's
//!   expected time-to-value beyond the tolerance.
//! - [`OptrEngine`] — scores candidate paths, applies the gates, and selects
//!   the admissible path with the lowest total.
//! - [`whynot`] — builds and merges the structured denial traces.
//!
//! Nothing in this crate writes to the ledger. Callers persist the traces a
//! run produces in the same step as the decision itself.

pub mod authority;
pub mod error;
pub mod features;
pub mod interference;
pub mod invariants;
pub mod optr;
pub mod whynot;

pub use authority::{require_canon_refs, AuthorityCheckResult};
pub use error::PolicyError;
pub use features::{FeatureModel, TableFeatureModel};
pub use interference::{
    check_multi_agent_equilibrium, check_non_interference, estimate_ttv_impact, Conflict,
    EquilibriumReport, NonInterferenceResult, PlannedAgent,
};
pub use invariants::{
    check_all, check_invariant, violations_trace, InvariantCheck, InvariantContext, InvariantId,
    ProposedChange,
};
pub use optr::{
    gate_authority_boundary, gate_cost_bounds, gate_missing_prereqs, gate_non_interference,
    gate_risk_bounds, gate_success_prob, score_path, InterferenceContext, OptrEngine, OptrRun,
    ResolveContext,
};
