// optr.rs — OPTR scoring types.
//
// The OPTR objective for one candidate path:
//
//   total = ttv + λC·cost + λR·risk − λP·ln(max(successProb, ε))
//
// A gated (inadmissible) path has `total = +∞`. JSON cannot carry infinity,
// so `total` serializes as `null` when it is not finite and deserializes
// `null` back to `+∞`.

use serde::{Deserialize, Serialize};

/// Floor applied to success probability before taking its logarithm.
pub const SUCCESS_PROB_EPSILON: f64 = 1e-9;

/// Objective weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptrWeights {
    /// Cost coefficient (λC).
    pub lambda_c: f64,
    /// Risk coefficient (λR).
    pub lambda_r: f64,
    /// Success-probability coefficient (λP).
    pub lambda_p: f64,
}

impl Default for OptrWeights {
    fn default() -> Self {
        Self {
            lambda_c: 0.1,
            lambda_r: 0.2,
            lambda_p: 0.05,
        }
    }
}

/// Admissibility bounds applied by the OPTR gates. `None` disables a gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OptrBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_risk: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_success_prob: Option<f64>,
}

/// Weighted contribution of each term to the total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub ttv: f64,
    pub cost: f64,
    pub risk: f64,
    pub prob: f64,
}

/// Score of one candidate path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptrScore {
    pub ttv: f64,
    pub cost: f64,
    pub risk: f64,
    pub success_prob: f64,
    #[serde(with = "non_finite_as_null")]
    pub total: f64,
    pub components: ScoreComponents,
}

impl OptrScore {
    /// A path is admissible while its total is finite.
    pub fn is_admissible(&self) -> bool {
        self.total.is_finite()
    }

    /// Mark the path inadmissible.
    pub fn make_inadmissible(&mut self) {
        self.total = f64::INFINITY;
    }
}

mod non_finite_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}
