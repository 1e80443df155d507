// decision.rs — Records of decisions, session completions and canon imports,
// plus the execution mode threaded through every state-changing call.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::canon::Provenance;
use crate::whynot::WhyNotTrace;

/// Whether a call may change state.
///
/// `Live` calls append to the ledger and mutate canon/baselines. `Replay`
/// calls evaluate identically but write nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Live,
    Replay,
}

impl ExecutionMode {
    pub fn is_live(self) -> bool {
        self == ExecutionMode::Live
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Live => write!(f, "live"),
            ExecutionMode::Replay => write!(f, "replay"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionOutcome {
    Allowed,
    Denied,
}

impl fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionOutcome::Allowed => write!(f, "ALLOWED"),
            DecisionOutcome::Denied => write!(f, "DENIED"),
        }
    }
}

/// Score summary for one candidate in a decision record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub path_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action_id: Option<String>,
    /// `None` when the path was gated out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    pub admissible: bool,
}

/// The ledgered outcome of one decision request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub tenant_id: String,
    pub goal: String,
    pub agent_id: String,
    pub action_id: String,
    pub decision: DecisionOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_path_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_next_action_id: Option<String>,
    pub canon_refs_used: Vec<String>,
    #[serde(default)]
    pub candidates: Vec<CandidateSummary>,
    /// Number of WhyNot traces ledgered alongside this record.
    pub denial_count: usize,
}

/// A denial as persisted: the trace plus the request and tenant it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenialRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    /// The requested action. Differs from `trace.action_id` when the trace
    /// is about a candidate path's next step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    pub tenant_id: String,
    pub trace: WhyNotTrace,
}

/// A finished agent session, recorded so that every completion is a ledger event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCompletion {
    pub session_id: Uuid,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: String,
    pub provenance: Provenance,
}

/// A batch of canon items accepted at the import boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonImportRecord {
    pub timestamp: DateTime<Utc>,
    pub item_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ExecutionMode::Replay).unwrap(),
            "\"replay\""
        );
        assert!(ExecutionMode::Live.is_live());
        assert!(!ExecutionMode::Replay.is_live());
    }

    #[test]
    fn outcome_display_matches_wire_name() {
        let json = serde_json::to_string(&DecisionOutcome::Denied).unwrap();
        assert_eq!(json, format!("\"{}\"", DecisionOutcome::Denied));
    }
}
