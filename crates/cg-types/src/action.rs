// action.rs — Proposed actions and the candidate paths that sequence them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::TypesError;
use crate::optr::OptrScore;

/// Coarse risk classification attached to an action by intent ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// A proposed action. Immutable once a path containing it has been scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Canon ids that must be CANON before this action may run.
    #[serde(default)]
    pub prerequisite_canon_ids: BTreeSet<String>,
    pub risk_level: RiskLevel,
    /// Resources this action holds while running (contention with other agents).
    #[serde(default)]
    pub resources_used: Vec<String>,
    /// Shared state keys this action writes.
    #[serde(default)]
    pub shared_state_modified: Vec<String>,
}

impl Action {
    pub fn new(id: impl Into<String>, name: impl Into<String>, risk_level: RiskLevel) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            prerequisite_canon_ids: BTreeSet::new(),
            risk_level,
            resources_used: Vec::new(),
            shared_state_modified: Vec::new(),
        }
    }

    pub fn with_prerequisites<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisite_canon_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources_used = resources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_shared_state<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared_state_modified = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// Features of a candidate path, computed once and cached on the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFeatures {
    pub ttv: f64,
    pub cost: f64,
    pub risk: f64,
    pub success_prob: f64,
    pub next_action: Action,
}

impl CandidateFeatures {
    /// Reject NaN/infinite features and probabilities outside [0, 1].
    pub fn validate(&self, path_id: &str) -> Result<(), TypesError> {
        for (field, value) in [
            ("ttv", self.ttv),
            ("cost", self.cost),
            ("risk", self.risk),
            ("success_prob", self.success_prob),
        ] {
            if !value.is_finite() {
                return Err(TypesError::NonFiniteFeature {
                    path_id: path_id.to_string(),
                    field,
                });
            }
        }
        if !(0.0..=1.0).contains(&self.success_prob) {
            return Err(TypesError::ProbabilityOutOfRange {
                path_id: path_id.to_string(),
                value: self.success_prob,
            });
        }
        Ok(())
    }
}

/// A candidate execution path: an ordered sequence of actions.
///
/// `features` is written at most once (see [`CandidatePath::cache_features`]);
/// scoring, gating and selection all read the cached value so the path that
/// is selected is the path that was scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePath {
    pub id: String,
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<CandidateFeatures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<OptrScore>,
    /// Projected TTV per other agent if this path runs. When absent the
    /// projection is estimated from the next action's resource and state use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projected_ttv: Option<BTreeMap<String, f64>>,
}

impl CandidatePath {
    pub fn new(id: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            id: id.into(),
            actions,
            features: None,
            score: None,
            projected_ttv: None,
        }
    }

    pub fn with_features(mut self, features: CandidateFeatures) -> Self {
        self.features = Some(features);
        self
    }

    pub fn with_projected_ttv(mut self, projected: BTreeMap<String, f64>) -> Self {
        self.projected_ttv = Some(projected);
        self
    }

    /// The first action of the path.
    pub fn first_action(&self) -> Result<&Action, TypesError> {
        self.actions.first().ok_or_else(|| TypesError::EmptyPath {
            path_id: self.id.clone(),
        })
    }

    /// Return the cached features, computing them with `compute` only if
    /// they have never been set.
    pub fn cache_features<F>(&mut self, compute: F) -> &CandidateFeatures
    where
        F: FnOnce(&CandidatePath) -> CandidateFeatures,
    {
        let features = match self.features.take() {
            Some(cached) => cached,
            None => compute(self),
        };
        self.features.insert(features)
    }
}
