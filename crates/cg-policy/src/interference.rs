// interference.rs — Multi-agent non-interference.
//
// An action is inadmissible if it makes any other agent's expected
// time-to-value worse: Δttv_j = projected_j − baseline_j must not exceed the
// tolerance for any j other than the actor. Everything here is pure and may
// run concurrently and speculatively.

use std::collections::BTreeMap;

use cg_types::{Action, AgentContext};
use serde::{Deserialize, Serialize};

/// TTV added per resource the action uses that another agent depends on.
pub const RESOURCE_CONFLICT_TTV: f64 = 50.0;
/// TTV added per shared state key the action modifies that another agent reads.
pub const STATE_CONFLICT_TTV: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonInterferenceResult {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violated_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_ttv: Option<f64>,
}

impl NonInterferenceResult {
    fn allowed() -> Self {
        Self {
            allowed: true,
            violated_agent: None,
            delta_ttv: None,
        }
    }
}

/// Compare projected TTVs against baselines for every agent except the actor.
///
/// Agents without a projection are unaffected. A non-finite projection counts
/// as unbounded harm. The reported agent is the one with the largest delta,
/// the lowest agent id winning ties.
pub fn check_non_interference(
    actor: &AgentContext,
    others: &[AgentContext],
    projected: &BTreeMap<String, f64>,
    tolerance: f64,
) -> NonInterferenceResult {
    let mut worst: Option<(&str, f64)> = None;

    for other in others {
        if other.agent_id == actor.agent_id {
            continue;
        }
        let Some(&projection) = projected.get(&other.agent_id) else {
            continue;
        };
        let mut delta = projection - other.ttv_baseline;
        if delta.is_nan() {
            delta = f64::INFINITY;
        }
        let replace = match worst {
            None => true,
            Some((id, best)) => delta > best || (delta == best && other.agent_id.as_str() < id),
        };
        if replace {
            worst = Some((other.agent_id.as_str(), delta));
        }
    }

    match worst {
        Some((agent, delta)) if delta > tolerance => NonInterferenceResult {
            allowed: false,
            violated_agent: Some(agent.to_string()),
            delta_ttv: Some(delta),
        },
        _ => NonInterferenceResult::allowed(),
    }
}

/// Estimate each other agent's projected TTV if `action` runs.
///
/// Starts from the agent's baseline and adds a fixed penalty per contended
/// resource and per shared state key the action modifies.
pub fn estimate_ttv_impact(action: &Action, others: &[AgentContext]) -> BTreeMap<String, f64> {
    others
        .iter()
        .map(|agent| {
            (
                agent.agent_id.clone(),
                agent.ttv_baseline + impact_delta(action, agent),
            )
        })
        .collect()
}

fn impact_delta(action: &Action, agent: &AgentContext) -> f64 {
    let resources = action
        .resources_used
        .iter()
        .filter(|r| agent.depends_on_resources.contains(r))
        .count();
    let state = action
        .shared_state_modified
        .iter()
        .filter(|s| agent.depends_on_state.contains(s))
        .count();
    resources as f64 * RESOURCE_CONFLICT_TTV + state as f64 * STATE_CONFLICT_TTV
}

/// An agent together with the actions it intends to take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAgent {
    pub context: AgentContext,
    #[serde(default)]
    pub planned_actions: Vec<Action>,
}

/// One agent's planned action slowing another agent down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub actor: String,
    pub affected: String,
    pub action_id: String,
    pub delta_ttv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumReport {
    pub equilibrium: bool,
    pub conflicts: Vec<Conflict>,
}

/// Check every ordered pair of agents for interference between their plans.
///
/// The joint plan is in equilibrium when no agent's planned action raises any
/// other agent's estimated TTV.
pub fn check_multi_agent_equilibrium(agents: &[PlannedAgent]) -> EquilibriumReport {
    let mut conflicts = Vec::new();
    for (i, first) in agents.iter().enumerate() {
        for second in &agents[i + 1..] {
            collect_conflicts(first, second, &mut conflicts);
            collect_conflicts(second, first, &mut conflicts);
        }
    }
    EquilibriumReport {
        equilibrium: conflicts.is_empty(),
        conflicts,
    }
}

fn collect_conflicts(actor: &PlannedAgent, affected: &PlannedAgent, out: &mut Vec<Conflict>) {
    for action in &actor.planned_actions {
        let delta = impact_delta(action, &affected.context);
        if delta > 0.0 {
            out.push(Conflict {
                actor: actor.context.agent_id.clone(),
                affected: affected.context.agent_id.clone(),
                action_id: action.id.clone(),
                delta_ttv: delta,
            });
        }
    }
}
