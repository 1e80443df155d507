// governor.rs — The decision pipeline.
//
// A decision runs in two halves. Evaluation reads a baseline snapshot and the
// canon generation, checks the intent (authority boundary and invariants) and
// then lets OPTR score and gate the candidate paths. Nothing is locked while
// this happens. The commit half pins canon, confirms neither canon nor the
// baselines moved, and appends every denial trace plus the decision record
// to the ledger as one batch before the caller sees any of it. If the
// snapshot moved, the decision is evaluated again.
//
// Lock order everywhere: canon, then baselines, then ledger.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use cg_canon::{CanonLookup, CanonStore, PromotionGate, PromotionRequest};
use cg_ledger::{Ledger, LedgerPayload, VerifyReport, WhyNotFilter};
use cg_policy::{
    check_all, check_invariant, estimate_ttv_impact, gate_authority_boundary, violations_trace,
    whynot, FeatureModel, InterferenceContext, InvariantContext, InvariantId, OptrEngine,
    ResolveContext,
};
use cg_types::{
    AgentContext, CanonImportRecord, CanonItem, CandidateSummary, DecisionOutcome,
    DecisionRecord, DenialRecord, ExecutionMode, PromotionDecision, Provenance,
    SessionCompletion, WhyNotTrace,
};
use uuid::Uuid;

use crate::baseline::{BaselineCommit, BaselineRegistry, BaselineSnapshot};
use crate::config::GovernorConfig;
use crate::error::GovernorError;
use crate::request::{DecisionRequest, DecisionResponse};

/// Result of evaluating one request against one snapshot.
#[derive(Debug, Clone)]
struct Outcome {
    timestamp: DateTime<Utc>,
    decision: DecisionOutcome,
    selected_path_id: Option<String>,
    selected_next_action_id: Option<String>,
    traces: Vec<WhyNotTrace>,
    candidates: Vec<CandidateSummary>,
    /// Other agents' TTVs if the selected path runs.
    projected: Option<BTreeMap<String, f64>>,
}

impl Outcome {
    fn respond(self, request_id: Uuid, ledger_sequence: Option<u64>) -> DecisionResponse {
        DecisionResponse {
            request_id,
            decision: self.decision,
            selected_path_id: self.selected_path_id,
            selected_next_action_id: self.selected_next_action_id,
            why_not_traces: self.traces,
            candidates: self.candidates,
            ledger_sequence,
        }
    }
}

/// Owns the ledger, the canon store and the agent baselines for one tenant.
pub struct Governor {
    config: GovernorConfig,
    ledger: Ledger,
    canon: CanonStore,
    baselines: BaselineRegistry,
    features: Box<dyn FeatureModel + Send + Sync>,
}

impl Governor {
    /// Open the ledger file and canon directory named by `config`.
    pub fn open(config: GovernorConfig) -> Result<Self, GovernorError> {
        let ledger = Ledger::open(&config.ledger_path)?;
        let canon = CanonStore::open(&config.canon_dir)?;
        if let Some(index) = ledger.broken_at()? {
            tracing::error!(
                path = %config.ledger_path.display(),
                index,
                "ledger chain is broken; decisions will fail until an operator intervenes"
            );
        }
        tracing::info!(
            ledger = %config.ledger_path.display(),
            canon = %config.canon_dir.display(),
            tenant = %config.tenant_id,
            "governor opened"
        );
        Ok(Self::assemble(config, ledger, canon))
    }

    /// A governor that keeps nothing on disk.
    pub fn in_memory(config: GovernorConfig) -> Self {
        Self::assemble(config, Ledger::in_memory(), CanonStore::in_memory())
    }

    /// Build from parts, e.g. a ledger over a custom sink.
    pub fn assemble(config: GovernorConfig, ledger: Ledger, canon: CanonStore) -> Self {
        let baselines = BaselineRegistry::with_agents(config.agents.clone());
        let features = Box::new(config.features.clone());
        Self {
            config,
            ledger,
            canon,
            baselines,
            features,
        }
    }

    /// Replace the model used for candidates that arrive without features.
    pub fn with_feature_model(mut self, model: Box<dyn FeatureModel + Send + Sync>) -> Self {
        self.features = model;
        self
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn canon(&self) -> &CanonStore {
        &self.canon
    }

    // ── Decisions ────────────────────────────────────────────────

    /// Decide an intent.
    ///
    /// In live mode every denial trace and the decision record are ledgered
    /// before this returns. In replay mode the same evaluation runs and
    /// nothing is written.
    pub fn decide(
        &self,
        mode: ExecutionMode,
        request: DecisionRequest,
    ) -> Result<DecisionResponse, GovernorError> {
        request.validate()?;
        let request_id = Uuid::new_v4();
        let tenant_id = request
            .tenant_id
            .clone()
            .unwrap_or_else(|| self.config.tenant_id.clone());
        let engine = OptrEngine::new(
            request.weights.unwrap_or(self.config.weights),
            request.bounds.unwrap_or(self.config.bounds),
        )
        .with_parallel_threshold(self.config.parallel_scoring_threshold);

        if !mode.is_live() {
            let baseline = self.baselines.snapshot()?;
            let outcome = self.evaluate(&engine, &request, &baseline)?;
            return Ok(outcome.respond(request_id, None));
        }

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let baseline = self.baselines.snapshot()?;
            let generation = self.canon.generation()?;
            let outcome = self.evaluate(&engine, &request, &baseline)?;

            let pinned = self.canon.pin()?;
            let commit = if pinned.generation() == generation {
                self.baselines.begin_commit(baseline.version)?
            } else {
                None
            };
            if let Some(commit) = commit {
                return self.commit(mode, request_id, &tenant_id, &request, outcome, commit);
            }
            drop(pinned);

            tracing::warn!(
                request_id = %request_id,
                action_id = %request.action.id,
                attempts,
                "decision snapshot changed before commit; re-evaluating"
            );
            if attempts > self.config.max_commit_retries {
                return Err(GovernorError::SnapshotConflict { attempts });
            }
        }
    }

    fn evaluate(
        &self,
        engine: &OptrEngine,
        request: &DecisionRequest,
        baseline: &BaselineSnapshot,
    ) -> Result<Outcome, GovernorError> {
        let now = Utc::now();
        let action = &request.action;
        let canon_ids: BTreeSet<String> = self.canon.canon_ids()?.into_iter().collect();

        // Intent level: a denial here is final and OPTR does not run.
        let cited: Vec<CanonItem> = request
            .canon_refs
            .iter()
            .filter_map(|id| self.canon.get(id))
            .collect();
        let mut context =
            InvariantContext::for_action(action.clone(), canon_ids.clone()).with_cited(cited);
        context.proposed_change = request.proposed_change.clone();
        let violations = check_all(&context);

        let mut intent = Vec::new();
        intent.extend(gate_authority_boundary(action, &request.canon_refs, &self.canon, now));
        intent.extend(violations_trace(now, &action.id, &violations));
        if let Some(trace) = whynot::merge(None, intent) {
            tracing::warn!(
                action_id = %action.id,
                agent_id = %request.agent_id,
                reasons = ?trace.reason_codes,
                "decision denied at intent"
            );
            return Ok(Outcome {
                timestamp: now,
                decision: DecisionOutcome::Denied,
                selected_path_id: None,
                selected_next_action_id: None,
                traces: vec![trace],
                candidates: Vec::new(),
                projected: None,
            });
        }

        let actor = baseline.actor(&request.agent_id);
        let others = baseline.others(&request.agent_id);
        let ctx = ResolveContext {
            timestamp: now,
            canon: &self.canon,
            canon_refs_used: &request.canon_refs,
            satisfied_canon_ids: &canon_ids,
            interference: Some(InterferenceContext {
                actor: &actor,
                others: &others,
                tolerance: self.config.non_interference_tolerance,
            }),
        };
        let run = engine.resolve(&ctx, request.candidate_paths(), self.features.as_ref())?;

        let projected = run.selected().map(|path| match (&path.projected_ttv, &path.features) {
            (Some(projected), _) => projected.clone(),
            (None, Some(features)) => estimate_ttv_impact(&features.next_action, &others),
            (None, None) => BTreeMap::new(),
        });
        let decision = if run.selected_path_id.is_some() {
            DecisionOutcome::Allowed
        } else {
            DecisionOutcome::Denied
        };

        let mut traces = run.deny_traces.clone();
        let mut trace_check = InvariantContext::default();
        trace_check.denial = Some((decision == DecisionOutcome::Denied, !traces.is_empty()));
        let check = check_invariant(InvariantId::TrustDenialTrace, &trace_check);
        if check.violated {
            // Nothing was admissible yet no gate said why; the denial still
            // needs a trace.
            traces.extend(violations_trace(now, &action.id, &[check]));
        }

        Ok(Outcome {
            timestamp: now,
            decision,
            selected_path_id: run.selected_path_id.clone(),
            selected_next_action_id: run.selected_next_action_id.clone(),
            candidates: run.summaries(),
            traces,
            projected,
        })
    }

    fn commit(
        &self,
        mode: ExecutionMode,
        request_id: Uuid,
        tenant_id: &str,
        request: &DecisionRequest,
        outcome: Outcome,
        mut baselines: BaselineCommit<'_>,
    ) -> Result<DecisionResponse, GovernorError> {
        let record = DecisionRecord {
            request_id,
            timestamp: outcome.timestamp,
            tenant_id: tenant_id.to_string(),
            goal: request.goal.clone(),
            agent_id: request.agent_id.clone(),
            action_id: request.action.id.clone(),
            decision: outcome.decision,
            selected_path_id: outcome.selected_path_id.clone(),
            selected_next_action_id: outcome.selected_next_action_id.clone(),
            canon_refs_used: request.canon_refs.clone(),
            candidates: outcome.candidates.clone(),
            denial_count: outcome.traces.len(),
        };

        let mut payloads: Vec<LedgerPayload> = outcome
            .traces
            .iter()
            .map(|trace| {
                LedgerPayload::Denial(DenialRecord {
                    request_id: Some(request_id),
                    action_id: Some(request.action.id.clone()),
                    tenant_id: tenant_id.to_string(),
                    trace: trace.clone(),
                })
            })
            .collect();
        payloads.push(LedgerPayload::Decision(record));

        let entries = self.ledger.append_batch(mode, payloads)?;
        let ledger_sequence = entries.last().map(|entry| entry.sequence_index);

        if outcome.decision == DecisionOutcome::Allowed {
            if let Some(projected) = &outcome.projected {
                baselines.apply(&request.agent_id, projected);
            }
            tracing::info!(
                request_id = %request_id,
                action_id = %request.action.id,
                path_id = outcome.selected_path_id.as_deref().unwrap_or(""),
                denied_candidates = outcome.traces.len(),
                "decision allowed"
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                action_id = %request.action.id,
                traces = outcome.traces.len(),
                "decision denied"
            );
        }

        Ok(outcome.respond(request_id, ledger_sequence))
    }

    // ── Canon ────────────────────────────────────────────────────

    /// Bring new EVIDENCE or PROPOSED items into canon.
    pub fn import_canon(
        &self,
        mode: ExecutionMode,
        items: Vec<CanonItem>,
    ) -> Result<CanonImportRecord, GovernorError> {
        Ok(cg_canon::import(mode, &self.canon, &self.ledger, items)?)
    }

    /// Run a promotion request through the four-test gate.
    pub fn promote(
        &self,
        mode: ExecutionMode,
        request: PromotionRequest,
    ) -> Result<PromotionDecision, GovernorError> {
        Ok(PromotionGate::new(&self.canon, &self.ledger).promote(mode, request)?)
    }

    // ── Sessions and agents ──────────────────────────────────────

    /// Record that an agent session finished.
    pub fn complete_session(
        &self,
        mode: ExecutionMode,
        agent_id: impl Into<String>,
        outcome: impl Into<String>,
        provenance: Provenance,
    ) -> Result<SessionCompletion, GovernorError> {
        if provenance.reference.trim().is_empty() {
            return Err(GovernorError::MissingField {
                field: "provenance.reference",
            });
        }
        let completion = SessionCompletion {
            session_id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
            outcome: outcome.into(),
            provenance,
        };
        if mode.is_live() {
            self.ledger
                .append(mode, LedgerPayload::SessionCompletion(completion.clone()))?;
            tracing::info!(
                session_id = %completion.session_id,
                agent_id = %completion.agent_id,
                outcome = %completion.outcome,
                "session completion ledgered"
            );
        }
        Ok(completion)
    }

    /// Register or replace an agent's baseline. Decisions evaluated against
    /// the previous baselines will re-run before they commit.
    pub fn register_agent(&self, agent: AgentContext) -> Result<u64, GovernorError> {
        self.baselines.register(agent)
    }

    pub fn baselines(&self) -> Result<BaselineSnapshot, GovernorError> {
        self.baselines.snapshot()
    }

    // ── Audit ────────────────────────────────────────────────────

    /// Ledgered denial traces matching `filter`, in ledger order.
    pub fn whynot(&self, filter: &WhyNotFilter) -> Result<Vec<WhyNotTrace>, GovernorError> {
        Ok(self.ledger.whynot(filter)?)
    }

    /// Re-verify the ledger from its sink.
    pub fn verify(&self) -> Result<VerifyReport, GovernorError> {
        Ok(self.ledger.verify_chain()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cg_canon::CanonError;
    use cg_ledger::LedgerError;
    use cg_types::{
        Action, CandidateFeatures, CandidatePath, CanonKind, CanonLevel, DenialReasonCode,
        PromotionTests, ProvenanceSource, RiskLevel,
    };

    fn passing() -> PromotionTests {
        PromotionTests {
            resistance: true,
            reproducible: true,
            invariant_safe: true,
            feasibility_impact: true,
            evidence_refs: vec!["test://ci/1".to_string()],
        }
    }

    fn definition(id: &str) -> CanonItem {
        CanonItem::evidence(
            id,
            id,
            Provenance::new(ProvenanceSource::Repo, "docs/ops.md"),
            CanonKind::Definition {
                term: id.to_lowercase(),
                text: "defined".to_string(),
            },
        )
    }

    /// A governor with DEF_OPS at CANON and DEF_DRAFT left at EVIDENCE.
    fn governor() -> Governor {
        let gov = Governor::in_memory(GovernorConfig::default());
        gov.import_canon(
            ExecutionMode::Live,
            vec![definition("DEF_OPS"), definition("DEF_DRAFT")],
        )
        .unwrap();
        gov.promote(
            ExecutionMode::Live,
            PromotionRequest::new("DEF_OPS", CanonLevel::Evidence, passing()),
        )
        .unwrap();
        gov
    }

    fn restart() -> Action {
        Action::new("restart", "Restart service", RiskLevel::Low).with_prerequisites(["DEF_OPS"])
    }

    fn path(id: &str, action: &Action, ttv: f64, risk: f64) -> CandidatePath {
        CandidatePath::new(id, vec![action.clone()]).with_features(CandidateFeatures {
            ttv,
            cost: 10.0,
            risk,
            success_prob: 0.9,
            next_action: action.clone(),
        })
    }

    #[test]
    fn allowed_decision_is_ledgered_after_its_denials() {
        let gov = governor();
        let before = gov.ledger().len().unwrap();
        let action = restart();
        let request = DecisionRequest::new("ops", action.clone())
            .with_canon_refs(["DEF_OPS"])
            .with_bounds(cg_types::OptrBounds {
                max_risk: Some(0.5),
                ..Default::default()
            })
            .with_candidates(vec![
                path("fast-but-risky", &action, 10.0, 0.9),
                path("steady", &action, 50.0, 0.1),
            ]);

        let response = gov.decide(ExecutionMode::Live, request).unwrap();
        assert!(response.is_allowed());
        assert_eq!(response.selected_path_id.as_deref(), Some("steady"));
        assert_eq!(response.why_not_traces.len(), 1);
        assert!(response.why_not_traces[0].has_reason(DenialReasonCode::RiskBoundExceeded));

        let entries = gov.ledger().entries().unwrap();
        assert_eq!(entries.len(), before + 2);
        assert!(matches!(&entries[before].payload, LedgerPayload::Denial(_)));
        assert!(matches!(
            &entries[before + 1].payload,
            LedgerPayload::Decision(d) if d.decision == DecisionOutcome::Allowed && d.denial_count == 1
        ));
        assert_eq!(response.ledger_sequence, Some(entries[before + 1].sequence_index));
    }

    #[test]
    fn evidence_ref_is_denied_at_intent_without_scoring() {
        let gov = governor();
        let request = DecisionRequest::new("ops", restart()).with_canon_refs(["DEF_DRAFT"]);
        let response = gov.decide(ExecutionMode::Live, request).unwrap();

        assert!(!response.is_allowed());
        assert_eq!(response.why_not_traces.len(), 1);
        assert!(response.why_not_traces[0].has_reason(DenialReasonCode::AuthorityBoundaryFail));
        assert!(response.candidates.is_empty());

        let traces = gov.whynot(&WhyNotFilter::for_action("restart")).unwrap();
        assert_eq!(traces, response.why_not_traces);
    }

    #[test]
    fn missing_prerequisite_is_an_invariant_violation() {
        let gov = governor();
        let action = Action::new("deploy", "Deploy", RiskLevel::Medium)
            .with_prerequisites(["DEF_OPS", "DEF_DRAFT"]);
        let request = DecisionRequest::new("ops", action).with_canon_refs(["DEF_OPS"]);
        let response = gov.decide(ExecutionMode::Live, request).unwrap();

        let trace = &response.why_not_traces[0];
        assert!(trace.has_reason(DenialReasonCode::InvariantViolation));
        assert!(trace.has_reason(DenialReasonCode::MissingCanonPrereqs));
        assert!(trace
            .violated_invariant_ids
            .contains(&"INV_CANON_ONLY_EXECUTION".to_string()));
    }

    #[test]
    fn replay_mode_writes_nothing() {
        let gov = governor();
        let before = gov.ledger().len().unwrap();
        let request = DecisionRequest::new("ops", restart()).with_canon_refs(["DEF_DRAFT"]);
        let response = gov.decide(ExecutionMode::Replay, request).unwrap();
        assert!(!response.is_allowed());
        assert!(response.ledger_sequence.is_none());
        assert_eq!(gov.ledger().len().unwrap(), before);
    }

    #[test]
    fn interfering_action_is_denied_and_baselines_hold() {
        let gov = governor();
        gov.register_agent(AgentContext::new("billing", 120.0).depending_on_resources(["db"]))
            .unwrap();
        let action = restart().with_resources(["db"]);
        let request = DecisionRequest::new("ops", action).with_canon_refs(["DEF_OPS"]);

        let response = gov.decide(ExecutionMode::Live, request).unwrap();
        assert!(!response.is_allowed());
        assert!(response.why_not_traces[0].has_reason(DenialReasonCode::NonInterferenceViolation));
        assert_eq!(gov.baselines().unwrap().agents["billing"].ttv_baseline, 120.0);
    }

    #[test]
    fn tolerated_interference_moves_the_baseline() {
        let config = GovernorConfig {
            non_interference_tolerance: 60.0,
            ..GovernorConfig::default()
        };
        let gov = Governor::in_memory(config);
        gov.import_canon(ExecutionMode::Live, vec![definition("DEF_OPS")])
            .unwrap();
        gov.promote(
            ExecutionMode::Live,
            PromotionRequest::new("DEF_OPS", CanonLevel::Evidence, passing()),
        )
        .unwrap();
        gov.register_agent(AgentContext::new("billing", 120.0).depending_on_resources(["db"]))
            .unwrap();

        let request = DecisionRequest::new("ops", restart().with_resources(["db"]))
            .with_canon_refs(["DEF_OPS"]);
        let response = gov.decide(ExecutionMode::Live, request).unwrap();
        assert!(response.is_allowed());
        assert_eq!(gov.baselines().unwrap().agents["billing"].ttv_baseline, 170.0);
    }

    #[test]
    fn broken_ledger_fails_the_request() {
        use cg_ledger::MemorySink;
        let mut sink = MemorySink::new();
        sink.fail_next_append();
        let ledger = Ledger::with_sink(Box::new(sink)).unwrap();
        let gov = Governor::assemble(GovernorConfig::default(), ledger, CanonStore::in_memory());
        let err = gov
            .import_canon(ExecutionMode::Live, vec![definition("DEF_OPS")])
            .unwrap_err();
        assert!(matches!(err, GovernorError::Canon(CanonError::Ledger(LedgerError::WriteFailed(_)))));
        assert!(gov.canon().try_get("DEF_OPS").unwrap().is_none());
    }

    #[test]
    fn session_completion_needs_provenance() {
        let gov = governor();
        let err = gov
            .complete_session(
                ExecutionMode::Live,
                "ops",
                "done",
                Provenance::new(ProvenanceSource::Chat, ""),
            )
            .unwrap_err();
        assert!(matches!(err, GovernorError::MissingField { .. }));

        let before = gov.ledger().len().unwrap();
        gov.complete_session(
            ExecutionMode::Live,
            "ops",
            "done",
            Provenance::new(ProvenanceSource::Chat, "thread/42"),
        )
        .unwrap();
        let entries = gov.ledger().entries().unwrap();
        assert_eq!(entries.len(), before + 1);
        assert!(matches!(
            &entries[before].payload,
            LedgerPayload::SessionCompletion(s) if s.agent_id == "ops"
        ));
    }
}
