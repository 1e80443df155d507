// features.rs — Turning a candidate path into scoring features.
//
// The engine calls the model at most once per path; the result is cached on
// the path and every later step (scoring, gates, selection) reads the cache.

use std::collections::BTreeMap;

use cg_types::{Action, CandidateFeatures, CandidatePath, RiskLevel};
use serde::{Deserialize, Serialize};

/// Computes features for paths that arrive without them.
pub trait FeatureModel: Sync {
    fn features(&self, path: &CandidatePath, next_action: &Action) -> CandidateFeatures;
}

/// Lookup-table model: per-action TTV and cost with defaults, risk by level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFeatureModel {
    #[serde(default)]
    pub ttv: BTreeMap<String, f64>,
    #[serde(default)]
    pub cost: BTreeMap<String, f64>,
    pub default_ttv: f64,
    pub default_cost: f64,
    pub risk_low: f64,
    pub risk_medium: f64,
    pub risk_high: f64,
    pub success_prob: f64,
}

impl Default for TableFeatureModel {
    fn default() -> Self {
        Self {
            ttv: BTreeMap::new(),
            cost: BTreeMap::new(),
            default_ttv: 300_000.0,
            default_cost: 50.0,
            risk_low: 0.1,
            risk_medium: 0.3,
            risk_high: 0.7,
            success_prob: 0.9,
        }
    }
}

impl TableFeatureModel {
    pub fn with_ttv(mut self, action_id: impl Into<String>, ttv: f64) -> Self {
        self.ttv.insert(action_id.into(), ttv);
        self
    }

    pub fn with_cost(mut self, action_id: impl Into<String>, cost: f64) -> Self {
        self.cost.insert(action_id.into(), cost);
        self
    }

    fn risk(&self, level: RiskLevel) -> f64 {
        match level {
            RiskLevel::Low => self.risk_low,
            RiskLevel::Medium => self.risk_medium,
            RiskLevel::High => self.risk_high,
        }
    }
}

impl FeatureModel for TableFeatureModel {
    fn features(&self, _path: &CandidatePath, next_action: &Action) -> CandidateFeatures {
        CandidateFeatures {
            ttv: self.ttv.get(&next_action.id).copied().unwrap_or(self.default_ttv),
            cost: self.cost.get(&next_action.id).copied().unwrap_or(self.default_cost),
            risk: self.risk(next_action.risk_level),
            success_prob: self.success_prob,
            next_action: next_action.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_model_uses_overrides_and_defaults() {
        let model = TableFeatureModel::default()
            .with_ttv("rollback", 120_000.0)
            .with_cost("rollback", 10.0);
        let rollback = Action::new("rollback", "Rollback", RiskLevel::Low);
        let scale = Action::new("scale", "Scale up", RiskLevel::High);
        let path = CandidatePath::new("p", vec![rollback.clone()]);

        let f = model.features(&path, &rollback);
        assert_eq!((f.ttv, f.cost, f.risk), (120_000.0, 10.0, 0.1));

        let f = model.features(&path, &scale);
        assert_eq!((f.ttv, f.cost, f.risk), (300_000.0, 50.0, 0.7));
        assert_eq!(f.next_action.id, "scale");
    }
}
