// promotion.rs — Promotion gate records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canon::CanonLevel;

/// Outcome of the four promotion tests for one canon item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionTests {
    /// The item survived adversarial challenge.
    pub resistance: bool,
    /// The supporting result was reproduced.
    pub reproducible: bool,
    /// Promoting the item breaks no existing invariant.
    pub invariant_safe: bool,
    /// The item measurably changes feasibility of some action.
    pub feasibility_impact: bool,
    /// Evidence backing the tests.
    #[serde(default)]
    pub evidence_refs: Vec<String>,
}

impl PromotionTests {
    pub fn all_passed(&self) -> bool {
        self.resistance && self.reproducible && self.invariant_safe && self.feasibility_impact
    }

    /// Names of the tests that did not pass, in fixed order.
    pub fn failed(&self) -> Vec<&'static str> {
        [
            ("resistance", self.resistance),
            ("reproducible", self.reproducible),
            ("invariant_safe", self.invariant_safe),
            ("feasibility_impact", self.feasibility_impact),
        ]
        .into_iter()
        .filter(|(_, passed)| !passed)
        .map(|(name, _)| name)
        .collect()
    }
}

/// The recorded result of a promotion request. Ledgered whether or not it
/// was approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionDecision {
    pub timestamp: DateTime<Utc>,
    pub item_id: String,
    pub from: CanonLevel,
    /// `Canon` when approved, otherwise equal to `from`.
    pub to: CanonLevel,
    pub tests: PromotionTests,
    pub approved: bool,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tests(r: bool, p: bool, i: bool, f: bool) -> PromotionTests {
        PromotionTests {
            resistance: r,
            reproducible: p,
            invariant_safe: i,
            feasibility_impact: f,
            evidence_refs: vec![],
        }
    }

    #[test]
    fn all_passed_requires_every_test() {
        assert!(tests(true, true, true, true).all_passed());
        assert!(!tests(false, true, true, true).all_passed());
        assert!(!tests(true, true, true, false).all_passed());
    }

    #[test]
    fn failed_lists_names_in_order() {
        assert_eq!(
            tests(false, true, false, true).failed(),
            vec!["resistance", "invariant_safe"]
        );
        assert!(tests(true, true, true, true).failed().is_empty());
    }
}
