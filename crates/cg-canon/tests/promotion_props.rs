//! Property tests for promotion monotonicity: a request is approved exactly
//! when all four tests pass, and a rejected request never changes the level.

use cg_canon::{import, CanonLookup, CanonStore, PromotionGate, PromotionRequest};
use cg_ledger::Ledger;
use cg_types::{
    CanonItem, CanonKind, CanonLevel, ExecutionMode, PromotionTests, Provenance,
    ProvenanceSource,
};
use proptest::prelude::*;

fn item(level: CanonLevel) -> CanonItem {
    let mut item = CanonItem::evidence(
        "DEF_LEAD_TIME",
        "Lead time",
        Provenance::new(ProvenanceSource::Prod, "dashboards/lead-time"),
        CanonKind::Definition {
            term: "lead time".to_string(),
            text: "Commit to production latency".to_string(),
        },
    );
    item.level = level;
    item
}

proptest! {
    #[test]
    fn approval_is_the_and_of_four_tests(
        resistance in any::<bool>(),
        reproducible in any::<bool>(),
        invariant_safe in any::<bool>(),
        feasibility_impact in any::<bool>(),
        from_proposed in any::<bool>(),
    ) {
        let from = if from_proposed { CanonLevel::Proposed } else { CanonLevel::Evidence };
        let store = CanonStore::in_memory();
        let ledger = Ledger::in_memory();
        import(ExecutionMode::Live, &store, &ledger, vec![item(from)]).unwrap();

        let tests = PromotionTests {
            resistance,
            reproducible,
            invariant_safe,
            feasibility_impact,
            evidence_refs: Vec::new(),
        };
        let decision = PromotionGate::new(&store, &ledger)
            .promote(ExecutionMode::Live, PromotionRequest::new("DEF_LEAD_TIME", from, tests))
            .unwrap();

        let all = resistance && reproducible && invariant_safe && feasibility_impact;
        prop_assert_eq!(decision.approved, all);
        if all {
            prop_assert_eq!(decision.to, CanonLevel::Canon);
            prop_assert!(store.is_canon("DEF_LEAD_TIME"));
        } else {
            prop_assert_eq!(decision.to, from);
            let stored = store.try_get("DEF_LEAD_TIME").unwrap().unwrap();
            prop_assert_eq!(stored.level, from);
        }
        // The import plus the promotion decision, approved or not.
        prop_assert_eq!(ledger.len().unwrap(), 2);
        prop_assert!(ledger.verify_chain().unwrap().valid);
    }
}
