//! Property tests for OPTR scoring and selection.

use std::collections::{BTreeSet, HashMap};

use cg_policy::{score_path, OptrEngine, ResolveContext, TableFeatureModel};
use cg_types::{
    Action, CandidateFeatures, CandidatePath, CanonItem, CanonKind, CanonLevel, OptrBounds,
    OptrWeights, Provenance, ProvenanceSource, RiskLevel,
};
use chrono::Utc;
use proptest::prelude::*;

fn features_strategy() -> impl Strategy<Value = CandidateFeatures> {
    (0.0f64..1e6, 0.0f64..1e4, 0.0f64..1.0, 0.0f64..=1.0).prop_map(|(ttv, cost, risk, p)| {
        CandidateFeatures {
            ttv,
            cost,
            risk,
            success_prob: p,
            next_action: Action::new("a", "a", RiskLevel::Low),
        }
    })
}

fn weights_strategy() -> impl Strategy<Value = OptrWeights> {
    (0.0f64..10.0, 0.0f64..10.0, 0.0f64..10.0).prop_map(|(c, r, p)| OptrWeights {
        lambda_c: c,
        lambda_r: r,
        lambda_p: p,
    })
}

fn canon() -> HashMap<String, CanonItem> {
    let mut item = CanonItem::evidence(
        "DEF_OK",
        "ok",
        Provenance::new(ProvenanceSource::Test, "props"),
        CanonKind::Definition {
            term: "ok".to_string(),
            text: "ok".to_string(),
        },
    );
    item.level = CanonLevel::Canon;
    HashMap::from([(item.id.clone(), item)])
}

proptest! {
    #[test]
    fn scoring_is_bit_identical(features in features_strategy(), weights in weights_strategy()) {
        let a = score_path(&features, &weights);
        let b = score_path(&features.clone(), &weights);
        prop_assert_eq!(a.total.to_bits(), b.total.to_bits());
        prop_assert!(a.total.is_finite());
    }

    #[test]
    fn lone_admissible_candidate_is_always_selected(
        features in proptest::collection::vec(features_strategy(), 1..12),
        pick in any::<prop::sample::Index>(),
    ) {
        let keep = pick.index(features.len());
        let candidates: Vec<CandidatePath> = features
            .into_iter()
            .enumerate()
            .map(|(i, mut f)| {
                // Everything but `keep` busts the cost bound.
                f.cost = if i == keep { 1.0 } else { 1e9 };
                let action = Action::new(format!("a{i}"), "act", RiskLevel::Low);
                f.next_action = action.clone();
                CandidatePath::new(format!("p{i:02}"), vec![action]).with_features(f)
            })
            .collect();

        let canon = canon();
        let refs = vec!["DEF_OK".to_string()];
        let satisfied = BTreeSet::new();
        let ctx = ResolveContext {
            timestamp: Utc::now(),
            canon: &canon,
            canon_refs_used: &refs,
            satisfied_canon_ids: &satisfied,
            interference: None,
        };
        let engine = OptrEngine::new(
            OptrWeights::default(),
            OptrBounds { max_risk: None, max_cost: Some(10.0), min_success_prob: None },
        );
        let total = candidates.len();
        let run = engine.resolve(&ctx, candidates, &TableFeatureModel::default()).unwrap();

        let expected = format!("p{keep:02}");
        prop_assert_eq!(run.selected_path_id.as_deref(), Some(expected.as_str()));
        prop_assert_eq!(run.deny_traces.len(), total - 1);
    }
}
