//! # cg-types
//!
//! The canonical schema for the canon governance core.
//!
//! Every other crate in the workspace depends on these definitions and never
//! redefines them. The types fall into four groups:
//!
//! - **Canon** — [`CanonItem`], [`CanonLevel`], [`CanonKind`], [`Provenance`]
//! - **Planning** — [`Action`], [`CandidatePath`], [`CandidateFeatures`],
//!   [`OptrScore`], [`OptrWeights`], [`OptrBounds`], [`AgentContext`]
//! - **Denials** — [`DenialReasonCode`] (stable taxonomy) and [`WhyNotTrace`]
//! - **Records** — [`PromotionDecision`], [`DecisionRecord`],
//!   [`SessionCompletion`], [`CanonImportRecord`], [`ExecutionMode`]

pub mod action;
pub mod agent;
pub mod canon;
pub mod decision;
pub mod error;
pub mod optr;
pub mod promotion;
pub mod whynot;

pub use action::{Action, CandidateFeatures, CandidatePath, RiskLevel};
pub use agent::AgentContext;
pub use canon::{CanonItem, CanonKind, CanonLevel, Provenance, ProvenanceSource, Severity};
pub use decision::{
    CandidateSummary, CanonImportRecord, DecisionOutcome, DecisionRecord, DenialRecord,
    ExecutionMode, SessionCompletion,
};
pub use error::TypesError;
pub use optr::{OptrBounds, OptrScore, OptrWeights, ScoreComponents, SUCCESS_PROB_EPSILON};
pub use promotion::{PromotionDecision, PromotionTests};
pub use whynot::{DenialReasonCode, WhyNotTrace};
