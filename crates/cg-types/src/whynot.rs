// whynot.rs — Stable denial taxonomy and the WhyNot trace.
//
// The reason codes are a shipped contract: variants are never renamed or
// reordered, only appended.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why an action was denied.
///
/// `Ord` follows declaration order, so a `BTreeSet<DenialReasonCode>` lists
/// codes in taxonomy order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReasonCode {
    MissingCanonPrereqs,
    InvariantViolation,
    NonInterferenceViolation,
    AuthorityBoundaryFail,
    RiskBoundExceeded,
    CostBoundExceeded,
    SuccessProbTooLow,
}

impl DenialReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReasonCode::MissingCanonPrereqs => "MISSING_CANON_PREREQS",
            DenialReasonCode::InvariantViolation => "INVARIANT_VIOLATION",
            DenialReasonCode::NonInterferenceViolation => "NON_INTERFERENCE_VIOLATION",
            DenialReasonCode::AuthorityBoundaryFail => "AUTHORITY_BOUNDARY_FAIL",
            DenialReasonCode::RiskBoundExceeded => "RISK_BOUND_EXCEEDED",
            DenialReasonCode::CostBoundExceeded => "COST_BOUND_EXCEEDED",
            DenialReasonCode::SuccessProbTooLow => "SUCCESS_PROB_TOO_LOW",
        }
    }
}

impl fmt::Display for DenialReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured explanation of one denial.
///
/// A trace always has at least one reason code and a message. Traces are
/// built by the tracer in `cg-policy`, never assembled field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhyNotTrace {
    pub timestamp: DateTime<Utc>,
    pub action_id: String,
    /// Candidate path this denial applies to; `None` for intent-level denials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_id: Option<String>,
    pub reason_codes: BTreeSet<DenialReasonCode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_canon_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violated_invariant_ids: Vec<String>,
    pub message: String,
    /// Gate-specific detail (bounds, deltas, invalid refs).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub context: serde_json::Value,
}

impl WhyNotTrace {
    pub fn has_reason(&self, code: DenialReasonCode) -> bool {
        self.reason_codes.contains(&code)
    }
}
