// request.rs — Decision request and response shapes.

use cg_policy::ProposedChange;
use cg_types::{
    Action, CandidatePath, CandidateSummary, DecisionOutcome, OptrBounds, OptrWeights, WhyNotTrace,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GovernorError;

/// One intent, as handed over by the ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// Overrides the configured tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub goal: String,
    pub agent_id: String,
    /// The action the intent resolves to.
    pub action: Action,
    /// Canon items cited as authority for the action.
    #[serde(default)]
    pub canon_refs: Vec<String>,
    /// Paths to choose between. Empty means the action alone.
    #[serde(default)]
    pub candidates: Vec<CandidatePath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<OptrWeights>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<OptrBounds>,
    /// A knowledge change carried with the intent, checked for timestamp and
    /// provenance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_change: Option<ProposedChange>,
}

impl DecisionRequest {
    pub fn new(agent_id: impl Into<String>, action: Action) -> Self {
        Self {
            tenant_id: None,
            goal: String::new(),
            agent_id: agent_id.into(),
            action,
            canon_refs: Vec::new(),
            candidates: Vec::new(),
            weights: None,
            bounds: None,
            proposed_change: None,
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn with_canon_refs<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.canon_refs.extend(refs.into_iter().map(Into::into));
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<CandidatePath>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_bounds(mut self, bounds: OptrBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), GovernorError> {
        if self.agent_id.trim().is_empty() {
            return Err(GovernorError::MissingField { field: "agent_id" });
        }
        if self.action.id.trim().is_empty() {
            return Err(GovernorError::MissingField { field: "action.id" });
        }
        Ok(())
    }

    /// The candidates to score: the request's own, or the action as a
    /// one-step path.
    pub(crate) fn candidate_paths(&self) -> Vec<CandidatePath> {
        if self.candidates.is_empty() {
            vec![CandidatePath::new(self.action.id.clone(), vec![self.action.clone()])]
        } else {
            self.candidates.clone()
        }
    }
}

/// What the caller gets back. Every trace in it is already in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub request_id: Uuid,
    pub decision: DecisionOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_path_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_next_action_id: Option<String>,
    pub why_not_traces: Vec<WhyNotTrace>,
    #[serde(default)]
    pub candidates: Vec<CandidateSummary>,
    /// Sequence index of the ledgered decision record. `None` in replay mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_sequence: Option<u64>,
}

impl DecisionResponse {
    pub fn is_allowed(&self) -> bool {
        self.decision == DecisionOutcome::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cg_types::RiskLevel;

    #[test]
    fn minimal_json_request_parses() {
        let request: DecisionRequest = serde_json::from_str(
            r#"{
                "agent_id": "ops",
                "action": {
                    "id": "restart",
                    "name": "Restart service",
                    "prerequisite_canon_ids": ["DEF_SERVICE"],
                    "risk_level": "LOW"
                },
                "canon_refs": ["DEF_SERVICE"]
            }"#,
        )
        .unwrap();
        assert_eq!(request.agent_id, "ops");
        assert!(request.action.prerequisite_canon_ids.contains("DEF_SERVICE"));
        assert!(request.tenant_id.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn empty_candidates_fall_back_to_the_action() {
        let request = DecisionRequest::new("ops", Action::new("restart", "Restart", RiskLevel::Low));
        let paths = request.candidate_paths();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].id, "restart");
        assert_eq!(paths[0].actions[0].id, "restart");
    }

    #[test]
    fn blank_agent_is_rejected() {
        let request = DecisionRequest::new(" ", Action::new("restart", "Restart", RiskLevel::Low));
        assert!(matches!(
            request.validate(),
            Err(GovernorError::MissingField { field: "agent_id" })
        ));
    }
}
