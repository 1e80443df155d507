// invariants.rs — The fixed registry of hard invariants and their checks.
//
// Each invariant is evaluated independently against whatever facts the
// caller supplies in an `InvariantContext`. An invariant with nothing to
// judge (e.g. no promotion decision in the context) holds. `check_all` runs
// every invariant and keeps every violation, so a denial lists them all.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use cg_types::{
    Action, CanonItem, CanonKind, CanonLevel, DenialReasonCode, PromotionDecision, Provenance,
    ProvenanceSource, Severity, WhyNotTrace,
};
use serde::{Deserialize, Serialize};

use crate::interference::NonInterferenceResult;
use crate::whynot;

/// Stable ids of the builtin invariants. All are HARD_FAIL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InvariantId {
    #[serde(rename = "INV_TS_MANDATORY")]
    TsMandatory,
    #[serde(rename = "INV_CANON_ONLY_EXECUTION")]
    CanonOnlyExecution,
    #[serde(rename = "INV_PROMOTION_GATE")]
    PromotionGate,
    #[serde(rename = "INV_NON_INTERFERENCE")]
    NonInterference,
    #[serde(rename = "INV_TRUST_DENIAL_TRACE")]
    TrustDenialTrace,
    #[serde(rename = "INV_SESSION_COMPLETION_LEDGER")]
    SessionCompletionLedger,
}

impl InvariantId {
    pub const ALL: [InvariantId; 6] = [
        InvariantId::TsMandatory,
        InvariantId::CanonOnlyExecution,
        InvariantId::PromotionGate,
        InvariantId::NonInterference,
        InvariantId::TrustDenialTrace,
        InvariantId::SessionCompletionLedger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvariantId::TsMandatory => "INV_TS_MANDATORY",
            InvariantId::CanonOnlyExecution => "INV_CANON_ONLY_EXECUTION",
            InvariantId::PromotionGate => "INV_PROMOTION_GATE",
            InvariantId::NonInterference => "INV_NON_INTERFERENCE",
            InvariantId::TrustDenialTrace => "INV_TRUST_DENIAL_TRACE",
            InvariantId::SessionCompletionLedger => "INV_SESSION_COMPLETION_LEDGER",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            InvariantId::TsMandatory => "Timestamps mandatory for authority",
            InvariantId::CanonOnlyExecution => "Canon authority boundary",
            InvariantId::PromotionGate => "Promotion requires four tests",
            InvariantId::NonInterference => "Multi-agent non-interference",
            InvariantId::TrustDenialTrace => "Auditable denial trace",
            InvariantId::SessionCompletionLedger => "Session completions are ledger events",
        }
    }

    pub fn statement(&self) -> &'static str {
        match self {
            InvariantId::TsMandatory => {
                "No execution-impacting knowledge may exert authority unless it has a timestamp and provenance."
            }
            InvariantId::CanonOnlyExecution => {
                "Any admissible action must cite canon; unpromoted evidence cannot expand the admissible set."
            }
            InvariantId::PromotionGate => {
                "Promote to CANON only if resistance, reproducibility, invariant safety and feasibility impact tests all pass."
            }
            InvariantId::NonInterference => {
                "An agent action is inadmissible if it increases any other agent's expected time-to-value."
            }
            InvariantId::TrustDenialTrace => {
                "Every denial must produce a WhyNot trace and be logged."
            }
            InvariantId::SessionCompletionLedger => {
                "Every session completion must be recorded as a ledger event with timestamp, provenance and outcome."
            }
        }
    }

    pub fn formal(&self) -> &'static str {
        match self {
            InvariantId::TsMandatory => "authority(x) => has_timestamp(x) && has_provenance(x)",
            InvariantId::CanonOnlyExecution => "a in Adm => cites(CANON) && !(EVIDENCE expands Adm)",
            InvariantId::PromotionGate => "promote(k) <=> A && B && C && D",
            InvariantId::NonInterference => "forall i != j: admissible(a_i) => dE[TTV_j | a_i] <= 0",
            InvariantId::TrustDenialTrace => "deny(a) => whynot(a) && log(whynot(a))",
            InvariantId::SessionCompletionLedger => {
                "forall completion(s): exists e in ledger: e.kind = SESSION_COMPLETION && e.data = s"
            }
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::HardFail
    }

    /// The invariant as a CANON item, for display and export.
    pub fn to_canon_item(&self) -> CanonItem {
        CanonItem {
            id: self.as_str().to_string(),
            title: self.title().to_string(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            provenance: Provenance::new(ProvenanceSource::Repo, "builtin-invariants"),
            level: CanonLevel::Canon,
            kind: CanonKind::Invariant {
                statement: self.statement().to_string(),
                formal: Some(self.formal().to_string()),
                severity: self.severity(),
            },
            notes: None,
        }
    }
}

impl fmt::Display for InvariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A knowledge change whose timestamp and provenance are being asserted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposedChange {
    pub id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub provenance: Option<Provenance>,
}

/// Facts an invariant may be judged against. Unset facts are not judged.
#[derive(Debug, Clone, Default)]
pub struct InvariantContext {
    pub action: Option<Action>,
    /// Ids currently at CANON level.
    pub canon_ids: BTreeSet<String>,
    /// Canon items the action cites as its authority.
    pub cited: Vec<CanonItem>,
    pub proposed_change: Option<ProposedChange>,
    pub promotion: Option<PromotionDecision>,
    pub interference: Option<NonInterferenceResult>,
    /// `(denied, traced)` for an outcome about to be returned.
    pub denial: Option<(bool, bool)>,
    /// Whether a finished session was written to the ledger.
    pub session_ledgered: Option<bool>,
}

impl InvariantContext {
    pub fn for_action(action: Action, canon_ids: BTreeSet<String>) -> Self {
        Self {
            action: Some(action),
            canon_ids,
            ..Self::default()
        }
    }

    pub fn with_cited(mut self, cited: Vec<CanonItem>) -> Self {
        self.cited = cited;
        self
    }
}

/// Outcome of checking one invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantCheck {
    pub invariant: InvariantId,
    pub violated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<DenialReasonCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl InvariantCheck {
    fn holds(invariant: InvariantId) -> Self {
        Self {
            invariant,
            violated: false,
            reason_code: None,
            message: None,
        }
    }

    fn violated(invariant: InvariantId, code: DenialReasonCode, message: String) -> Self {
        Self {
            invariant,
            violated: true,
            reason_code: Some(code),
            message: Some(message),
        }
    }
}

/// Evaluate one invariant against `context`.
pub fn check_invariant(invariant: InvariantId, context: &InvariantContext) -> InvariantCheck {
    match invariant {
        InvariantId::TsMandatory => {
            if let Some(change) = &context.proposed_change {
                let has_provenance = change
                    .provenance
                    .as_ref()
                    .is_some_and(|p| !p.reference.trim().is_empty());
                if change.timestamp.is_none() || !has_provenance {
                    return InvariantCheck::violated(
                        invariant,
                        DenialReasonCode::AuthorityBoundaryFail,
                        format!("proposed change '{}' lacks timestamp or provenance", change.id),
                    );
                }
            }
            if let Some(item) = context
                .cited
                .iter()
                .find(|item| item.provenance.reference.trim().is_empty())
            {
                return InvariantCheck::violated(
                    invariant,
                    DenialReasonCode::AuthorityBoundaryFail,
                    format!("cited canon item '{}' has no provenance", item.id),
                );
            }
            InvariantCheck::holds(invariant)
        }
        InvariantId::CanonOnlyExecution => {
            let Some(action) = &context.action else {
                return InvariantCheck::holds(invariant);
            };
            let missing: Vec<&str> = action
                .prerequisite_canon_ids
                .iter()
                .filter(|id| !context.canon_ids.contains(*id))
                .map(String::as_str)
                .collect();
            if missing.is_empty() {
                InvariantCheck::holds(invariant)
            } else {
                InvariantCheck::violated(
                    invariant,
                    DenialReasonCode::MissingCanonPrereqs,
                    format!(
                        "action '{}' requires canon ids not at CANON: {}",
                        action.id,
                        missing.join(", ")
                    ),
                )
            }
        }
        InvariantId::PromotionGate => match &context.promotion {
            Some(decision) => {
                let expected_to = if decision.approved {
                    CanonLevel::Canon
                } else {
                    decision.from
                };
                if decision.approved != decision.tests.all_passed() || decision.to != expected_to {
                    InvariantCheck::violated(
                        invariant,
                        DenialReasonCode::InvariantViolation,
                        format!(
                            "promotion of '{}' is inconsistent with its four tests",
                            decision.item_id
                        ),
                    )
                } else {
                    InvariantCheck::holds(invariant)
                }
            }
            None => InvariantCheck::holds(invariant),
        },
        InvariantId::NonInterference => match &context.interference {
            Some(result) if !result.allowed => InvariantCheck::violated(
                invariant,
                DenialReasonCode::NonInterferenceViolation,
                format!(
                    "action raises expected TTV of agent '{}' by {}",
                    result.violated_agent.as_deref().unwrap_or("unknown"),
                    result.delta_ttv.unwrap_or(f64::NAN)
                ),
            ),
            _ => InvariantCheck::holds(invariant),
        },
        InvariantId::TrustDenialTrace => match context.denial {
            Some((true, false)) => InvariantCheck::violated(
                invariant,
                DenialReasonCode::InvariantViolation,
                "denial has no WhyNot trace".to_string(),
            ),
            _ => InvariantCheck::holds(invariant),
        },
        InvariantId::SessionCompletionLedger => match context.session_ledgered {
            Some(false) => InvariantCheck::violated(
                invariant,
                DenialReasonCode::InvariantViolation,
                "session completion was not ledgered".to_string(),
            ),
            _ => InvariantCheck::holds(invariant),
        },
    }
}

/// Run every registered invariant; return only the violations, in registry order.
pub fn check_all(context: &InvariantContext) -> Vec<InvariantCheck> {
    InvariantId::ALL
        .iter()
        .map(|inv| check_invariant(*inv, context))
        .filter(|check| check.violated)
        .collect()
}

/// Turn a set of violations into one trace, or `None` if there are none.
pub fn violations_trace(
    timestamp: DateTime<Utc>,
    action_id: &str,
    violations: &[InvariantCheck],
) -> Option<WhyNotTrace> {
    if violations.is_empty() {
        return None;
    }
    let mut builder = whynot::deny(
        timestamp,
        action_id,
        DenialReasonCode::InvariantViolation,
        violations
            .iter()
            .filter_map(|v| v.message.as_deref())
            .collect::<Vec<_>>()
            .join("; "),
    )
    .with_invariants(violations.iter().map(|v| v.invariant.as_str()));
    for code in violations.iter().filter_map(|v| v.reason_code) {
        builder = builder.with_code(code);
    }
    Some(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cg_types::{PromotionTests, RiskLevel};

    fn canon(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn registry_has_six_stable_ids() {
        let ids: Vec<&str> = InvariantId::ALL.iter().map(|i| i.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "INV_TS_MANDATORY",
                "INV_CANON_ONLY_EXECUTION",
                "INV_PROMOTION_GATE",
                "INV_NON_INTERFERENCE",
                "INV_TRUST_DENIAL_TRACE",
                "INV_SESSION_COMPLETION_LEDGER",
            ]
        );
        let json = serde_json::to_string(&InvariantId::NonInterference).unwrap();
        assert_eq!(json, "\"INV_NON_INTERFERENCE\"");
        assert!(InvariantId::ALL
            .iter()
            .all(|i| i.to_canon_item().is_canon() && i.severity() == Severity::HardFail));
    }

    #[test]
    fn empty_context_violates_nothing() {
        assert!(check_all(&InvariantContext::default()).is_empty());
    }

    #[test]
    fn missing_prerequisite_violates_canon_only_execution() {
        let action = Action::new("deploy", "Deploy", RiskLevel::High)
            .with_prerequisites(["DEF_A", "DEF_B"]);
        let ctx = InvariantContext::for_action(action, canon(&["DEF_A"]));
        let check = check_invariant(InvariantId::CanonOnlyExecution, &ctx);
        assert!(check.violated);
        assert_eq!(check.reason_code, Some(DenialReasonCode::MissingCanonPrereqs));
        assert!(check.message.unwrap().contains("DEF_B"));
    }

    #[test]
    fn all_violations_are_collected() {
        let action = Action::new("deploy", "Deploy", RiskLevel::High).with_prerequisites(["DEF_A"]);
        let mut ctx = InvariantContext::for_action(action, BTreeSet::new());
        ctx.interference = Some(NonInterferenceResult {
            allowed: false,
            violated_agent: Some("B".to_string()),
            delta_ttv: Some(2.4),
        });
        ctx.proposed_change = Some(ProposedChange {
            id: "DEF_NEW".to_string(),
            timestamp: None,
            provenance: None,
        });

        let violations = check_all(&ctx);
        let ids: Vec<InvariantId> = violations.iter().map(|v| v.invariant).collect();
        assert_eq!(
            ids,
            vec![
                InvariantId::TsMandatory,
                InvariantId::CanonOnlyExecution,
                InvariantId::NonInterference,
            ]
        );

        let trace = violations_trace(Utc::now(), "deploy", &violations).unwrap();
        assert!(trace.has_reason(DenialReasonCode::InvariantViolation));
        assert!(trace.has_reason(DenialReasonCode::MissingCanonPrereqs));
        assert!(trace.has_reason(DenialReasonCode::NonInterferenceViolation));
        assert_eq!(trace.violated_invariant_ids.len(), 3);
    }

    #[test]
    fn inconsistent_promotion_is_caught() {
        let decision = PromotionDecision {
            timestamp: Utc::now(),
            item_id: "DEF_A".to_string(),
            from: CanonLevel::Evidence,
            to: CanonLevel::Canon,
            tests: PromotionTests {
                resistance: true,
                reproducible: false,
                invariant_safe: true,
                feasibility_impact: true,
                evidence_refs: Vec::new(),
            },
            approved: true,
            reason: String::new(),
        };
        let ctx = InvariantContext {
            promotion: Some(decision),
            ..InvariantContext::default()
        };
        assert!(check_invariant(InvariantId::PromotionGate, &ctx).violated);
    }

    #[test]
    fn untraced_denial_and_unledgered_session_are_violations() {
        let ctx = InvariantContext {
            denial: Some((true, false)),
            session_ledgered: Some(false),
            ..InvariantContext::default()
        };
        let ids: Vec<_> = check_all(&ctx).into_iter().map(|v| v.invariant).collect();
        assert_eq!(
            ids,
            vec![InvariantId::TrustDenialTrace, InvariantId::SessionCompletionLedger]
        );
    }
}
