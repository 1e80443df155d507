// optr.rs — OPTR path scoring, gating and selection.
//
// π* = argmin over admissible paths of
//      ttv + λC·cost + λR·risk − λP·ln(max(p, ε))
//
// Each candidate is scored once from cached features, then every gate runs
// against the same cached features. A gated candidate's total becomes +∞ and
// its denials merge into one trace. Selection takes the lowest finite total,
// ties going to the lexically smallest path id. A run where every candidate
// is gated selects nothing; that is a valid outcome, not an error.
//
// Scoring and gating are pure, so large candidate sets are split across
// scoped threads. Only selection runs on the calling thread.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use cg_canon::CanonLookup;
use cg_types::{
    Action, AgentContext, CandidateFeatures, CandidatePath, CandidateSummary, DenialReasonCode,
    OptrBounds, OptrScore, OptrWeights, ScoreComponents, WhyNotTrace, SUCCESS_PROB_EPSILON,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::authority::require_canon_refs;
use crate::error::PolicyError;
use crate::features::FeatureModel;
use crate::interference::{check_non_interference, estimate_ttv_impact};
use crate::whynot;

/// Candidate count at or above which scoring is spread across threads.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 8;

/// Score one path's features. Bit-identical for identical inputs.
pub fn score_path(features: &CandidateFeatures, weights: &OptrWeights) -> OptrScore {
    let cost = weights.lambda_c * features.cost;
    let risk = weights.lambda_r * features.risk;
    let prob = -weights.lambda_p * features.success_prob.max(SUCCESS_PROB_EPSILON).ln();
    OptrScore {
        ttv: features.ttv,
        cost: features.cost,
        risk: features.risk,
        success_prob: features.success_prob,
        total: features.ttv + cost + risk + prob,
        components: ScoreComponents {
            ttv: features.ttv,
            cost,
            risk,
            prob,
        },
    }
}

/// Deny when the next action needs canon that is not yet satisfied.
pub fn gate_missing_prereqs(
    action: &Action,
    satisfied: &BTreeSet<String>,
    timestamp: DateTime<Utc>,
) -> Option<WhyNotTrace> {
    let missing: Vec<&String> = action
        .prerequisite_canon_ids
        .iter()
        .filter(|id| !satisfied.contains(*id))
        .collect();
    if missing.is_empty() {
        return None;
    }
    let listed = missing
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Some(
        whynot::deny(
            timestamp,
            &action.id,
            DenialReasonCode::MissingCanonPrereqs,
            format!(
                "\"{}\" is too early: missing prerequisite canon items: {listed}",
                action.name
            ),
        )
        .with_missing(missing.into_iter().cloned())
        .build(),
    )
}

/// Deny when the cited canon refs fail the authority boundary.
pub fn gate_authority_boundary<L>(
    action: &Action,
    canon_refs: &[String],
    store: &L,
    timestamp: DateTime<Utc>,
) -> Option<WhyNotTrace>
where
    L: CanonLookup + ?Sized,
{
    let check = require_canon_refs(&action.id, canon_refs, store);
    if check.ok {
        return None;
    }
    let message = check
        .message
        .unwrap_or_else(|| "authority boundary violation".to_string());
    Some(
        whynot::deny(
            timestamp,
            &action.id,
            DenialReasonCode::AuthorityBoundaryFail,
            message,
        )
        .with_missing(check.missing_refs)
        .with_context(json!({ "invalid_refs": check.invalid_refs }))
        .build(),
    )
}

pub fn gate_risk_bounds(
    features: &CandidateFeatures,
    max_risk: f64,
    timestamp: DateTime<Utc>,
) -> Option<WhyNotTrace> {
    if features.risk <= max_risk {
        return None;
    }
    Some(
        whynot::deny(
            timestamp,
            &features.next_action.id,
            DenialReasonCode::RiskBoundExceeded,
            format!("risk {:.2} exceeds bound {max_risk:.2}", features.risk),
        )
        .with_context(json!({ "risk": features.risk, "max_risk": max_risk }))
        .build(),
    )
}

pub fn gate_cost_bounds(
    features: &CandidateFeatures,
    max_cost: f64,
    timestamp: DateTime<Utc>,
) -> Option<WhyNotTrace> {
    if features.cost <= max_cost {
        return None;
    }
    Some(
        whynot::deny(
            timestamp,
            &features.next_action.id,
            DenialReasonCode::CostBoundExceeded,
            format!("cost {:.2} exceeds bound {max_cost:.2}", features.cost),
        )
        .with_context(json!({ "cost": features.cost, "max_cost": max_cost }))
        .build(),
    )
}

pub fn gate_success_prob(
    features: &CandidateFeatures,
    min_success_prob: f64,
    timestamp: DateTime<Utc>,
) -> Option<WhyNotTrace> {
    if features.success_prob >= min_success_prob {
        return None;
    }
    Some(
        whynot::deny(
            timestamp,
            &features.next_action.id,
            DenialReasonCode::SuccessProbTooLow,
            format!(
                "success probability {:.2} below minimum {min_success_prob:.2}",
                features.success_prob
            ),
        )
        .with_context(json!({
            "success_prob": features.success_prob,
            "min_success_prob": min_success_prob,
        }))
        .build(),
    )
}

/// Deny when the action would worsen another agent's expected TTV.
pub fn gate_non_interference(
    action: &Action,
    actor: &AgentContext,
    others: &[AgentContext],
    projected: &BTreeMap<String, f64>,
    tolerance: f64,
    timestamp: DateTime<Utc>,
) -> Option<WhyNotTrace> {
    let result = check_non_interference(actor, others, projected, tolerance);
    if result.allowed {
        return None;
    }
    let agent = result.violated_agent.clone().unwrap_or_default();
    let delta = result.delta_ttv.unwrap_or(f64::INFINITY);
    Some(
        whynot::deny(
            timestamp,
            &action.id,
            DenialReasonCode::NonInterferenceViolation,
            format!("action increases expected TTV of agent '{agent}' by {delta}"),
        )
        .with_context(json!({
            "acting_agent": actor.agent_id,
            "violated_agent": agent,
            // JSON has no infinity; an unbounded delta is recorded as null.
            "delta_ttv": delta.is_finite().then_some(delta),
            "tolerance": tolerance,
        }))
        .build(),
    )
}

/// Non-interference inputs for one run.
#[derive(Debug, Clone, Copy)]
pub struct InterferenceContext<'a> {
    pub actor: &'a AgentContext,
    pub others: &'a [AgentContext],
    pub tolerance: f64,
}

/// Everything a run reads besides the candidates themselves.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub timestamp: DateTime<Utc>,
    pub canon: &'a (dyn CanonLookup + Sync),
    pub canon_refs_used: &'a [String],
    /// Canon ids treated as satisfied prerequisites.
    pub satisfied_canon_ids: &'a BTreeSet<String>,
    pub interference: Option<InterferenceContext<'a>>,
}

/// Result of one OPTR run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptrRun {
    pub timestamp: DateTime<Utc>,
    /// Candidates with cached features and scores, in input order.
    pub candidates: Vec<CandidatePath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_path_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_next_action_id: Option<String>,
    /// One trace per gated candidate, in input order.
    #[serde(default)]
    pub deny_traces: Vec<WhyNotTrace>,
    pub canon_refs_used: Vec<String>,
}

impl OptrRun {
    pub fn selected(&self) -> Option<&CandidatePath> {
        let id = self.selected_path_id.as_deref()?;
        self.candidates.iter().find(|c| c.id == id)
    }

    pub fn summaries(&self) -> Vec<CandidateSummary> {
        self.candidates
            .iter()
            .map(|c| {
                let admissible = c.score.as_ref().is_some_and(OptrScore::is_admissible);
                CandidateSummary {
                    path_id: c.id.clone(),
                    next_action_id: c.features.as_ref().map(|f| f.next_action.id.clone()),
                    total: c.score.as_ref().map(|s| s.total).filter(|t| t.is_finite()),
                    admissible,
                }
            })
            .collect()
    }
}

/// The OPTR engine: weights, bounds and the parallel-scoring threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptrEngine {
    pub weights: OptrWeights,
    pub bounds: OptrBounds,
    pub parallel_threshold: usize,
}

impl Default for OptrEngine {
    fn default() -> Self {
        Self::new(OptrWeights::default(), OptrBounds::default())
    }
}

impl OptrEngine {
    pub fn new(weights: OptrWeights, bounds: OptrBounds) -> Self {
        Self {
            weights,
            bounds,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// `0` disables parallel scoring.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    fn check_parameters(&self) -> Result<(), PolicyError> {
        let params = [
            ("lambda_c", Some(self.weights.lambda_c)),
            ("lambda_r", Some(self.weights.lambda_r)),
            ("lambda_p", Some(self.weights.lambda_p)),
            ("max_risk", self.bounds.max_risk),
            ("max_cost", self.bounds.max_cost),
            ("min_success_prob", self.bounds.min_success_prob),
        ];
        for (name, value) in params {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(PolicyError::NonFiniteParameter { name });
            }
        }
        Ok(())
    }

    /// Score, gate and select over `candidates`.
    pub fn resolve(
        &self,
        ctx: &ResolveContext<'_>,
        mut candidates: Vec<CandidatePath>,
        model: &dyn FeatureModel,
    ) -> Result<OptrRun, PolicyError> {
        self.check_parameters()?;
        let mut seen = HashSet::new();
        for candidate in &candidates {
            if !seen.insert(candidate.id.as_str()) {
                return Err(PolicyError::DuplicatePath {
                    path_id: candidate.id.clone(),
                });
            }
        }

        let outcomes = if self.parallel_threshold > 0 && candidates.len() >= self.parallel_threshold
        {
            self.evaluate_parallel(ctx, &mut candidates, model)?
        } else {
            candidates
                .iter_mut()
                .map(|path| self.evaluate(ctx, path, model))
                .collect::<Result<Vec<_>, _>>()?
        };
        let deny_traces: Vec<WhyNotTrace> = outcomes.into_iter().flatten().collect();

        let selected = candidates
            .iter()
            .filter_map(|c| c.score.as_ref().filter(|s| s.is_admissible()).map(|s| (c, s.total)))
            .min_by(|(a, ta), (b, tb)| ta.total_cmp(tb).then_with(|| a.id.cmp(&b.id)))
            .map(|(c, _)| c);

        let selected_path_id = selected.map(|c| c.id.clone());
        let selected_next_action_id =
            selected.and_then(|c| c.features.as_ref().map(|f| f.next_action.id.clone()));

        match &selected_path_id {
            Some(id) => tracing::debug!(path_id = %id, denied = deny_traces.len(), "optr selected path"),
            None => tracing::debug!(denied = deny_traces.len(), "optr run has no admissible path"),
        }

        Ok(OptrRun {
            timestamp: ctx.timestamp,
            candidates,
            selected_path_id,
            selected_next_action_id,
            deny_traces,
            canon_refs_used: ctx.canon_refs_used.to_vec(),
        })
    }

    fn evaluate_parallel(
        &self,
        ctx: &ResolveContext<'_>,
        candidates: &mut [CandidatePath],
        model: &dyn FeatureModel,
    ) -> Result<Vec<Option<WhyNotTrace>>, PolicyError> {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .clamp(1, candidates.len().max(1));
        let chunk_size = candidates.len().div_ceil(workers).max(1);

        let per_chunk = std::thread::scope(|scope| {
            let handles: Vec<_> = candidates
                .chunks_mut(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter_mut()
                            .map(|path| self.evaluate(ctx, path, model))
                            .collect::<Result<Vec<_>, PolicyError>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().map_err(|_| PolicyError::ScoringPanicked))
                .collect::<Result<Vec<_>, _>>()
        })?;

        let mut outcomes = Vec::with_capacity(candidates.len());
        for chunk in per_chunk {
            outcomes.extend(chunk?);
        }
        Ok(outcomes)
    }

    /// Score and gate one candidate, caching its features and score.
    fn evaluate(
        &self,
        ctx: &ResolveContext<'_>,
        path: &mut CandidatePath,
        model: &dyn FeatureModel,
    ) -> Result<Option<WhyNotTrace>, PolicyError> {
        let first = path.first_action()?.clone();
        let features = path.cache_features(|p| model.features(p, &first)).clone();
        features.validate(&path.id)?;

        let mut score = score_path(&features, &self.weights);
        if !score.total.is_finite() {
            return Err(PolicyError::NonFiniteScore {
                path_id: path.id.clone(),
            });
        }
        let action = &features.next_action;
        let ts = ctx.timestamp;

        let mut traces = Vec::new();
        traces.extend(gate_missing_prereqs(action, ctx.satisfied_canon_ids, ts));
        traces.extend(gate_authority_boundary(action, ctx.canon_refs_used, ctx.canon, ts));
        if let Some(max_risk) = self.bounds.max_risk {
            traces.extend(gate_risk_bounds(&features, max_risk, ts));
        }
        if let Some(max_cost) = self.bounds.max_cost {
            traces.extend(gate_cost_bounds(&features, max_cost, ts));
        }
        if let Some(min_prob) = self.bounds.min_success_prob {
            traces.extend(gate_success_prob(&features, min_prob, ts));
        }
        if let Some(ni) = &ctx.interference {
            let projected = match &path.projected_ttv {
                Some(projected) => projected.clone(),
                None => estimate_ttv_impact(action, ni.others),
            };
            traces.extend(gate_non_interference(
                action,
                ni.actor,
                ni.others,
                &projected,
                ni.tolerance,
                ts,
            ));
        }

        let trace = whynot::merge(Some(&path.id), traces);
        if trace.is_some() {
            score.make_inadmissible();
        }
        tracing::debug!(
            path_id = %path.id,
            total = score.total,
            gated = trace.is_some(),
            "optr candidate scored"
        );
        path.score = Some(score);
        Ok(trace)
    }
}
