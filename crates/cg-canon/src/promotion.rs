// promotion.rs — The four-test promotion gate.
//
// The only path by which an item's level rises. A request either passes all
// four tests and moves the item to CANON, or it leaves the level exactly where
// it was. Both outcomes are ledgered before the store changes, so no reader
// can observe a CANON item without a matching decision in the ledger.

use chrono::Utc;
use cg_ledger::{Ledger, LedgerPayload};
use cg_types::{CanonLevel, ExecutionMode, PromotionDecision, PromotionTests};
use serde::{Deserialize, Serialize};

use crate::error::CanonError;
use crate::store::CanonStore;

/// What a caller asks the gate to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRequest {
    pub item_id: String,
    /// The level the caller believes the item is at.
    pub from: CanonLevel,
    /// Requested target. Only CANON is accepted; absent means CANON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<CanonLevel>,
    pub tests: PromotionTests,
}

impl PromotionRequest {
    pub fn new(item_id: impl Into<String>, from: CanonLevel, tests: PromotionTests) -> Self {
        Self {
            item_id: item_id.into(),
            from,
            to: None,
            tests,
        }
    }
}

/// Gate bound to one store and one ledger.
pub struct PromotionGate<'a> {
    store: &'a CanonStore,
    ledger: &'a Ledger,
}

impl<'a> PromotionGate<'a> {
    pub fn new(store: &'a CanonStore, ledger: &'a Ledger) -> Self {
        Self { store, ledger }
    }

    /// Evaluate a promotion request.
    ///
    /// Holds the store's write lock across the ledger append, so the
    /// decision and the level change are one step to every reader.
    pub fn promote(
        &self,
        mode: ExecutionMode,
        request: PromotionRequest,
    ) -> Result<PromotionDecision, CanonError> {
        let mut state = self.store.write()?;
        let current = state
            .items
            .get(&request.item_id)
            .cloned()
            .ok_or_else(|| CanonError::NotFound(request.item_id.clone()))?;

        if current.level == CanonLevel::Canon {
            return Err(CanonError::AlreadyCanon {
                item_id: request.item_id,
            });
        }
        if request.from != current.level {
            return Err(CanonError::StaleLevel {
                item_id: request.item_id,
                requested: request.from,
                current: current.level,
            });
        }
        if let Some(to) = request.to.filter(|to| *to != CanonLevel::Canon) {
            return Err(CanonError::InvalidTarget {
                item_id: request.item_id,
                to,
            });
        }

        let decision = decide(&request.item_id, request.from, request.tests);
        if !mode.is_live() {
            return Ok(decision);
        }

        let staged = if decision.approved {
            let mut promoted = current;
            promoted.level = CanonLevel::Canon;
            Some(self.store.stage(vec![promoted])?)
        } else {
            None
        };

        self.ledger
            .append(mode, LedgerPayload::Promotion(decision.clone()))?;

        if let Some(staged) = staged {
            self.store.commit(&mut state, staged);
            tracing::info!(item_id = %decision.item_id, from = %decision.from, "canon item promoted");
        } else {
            tracing::warn!(
                item_id = %decision.item_id,
                reason = %decision.reason,
                "canon promotion rejected"
            );
        }
        Ok(decision)
    }
}

/// The gate's pure core: approval is the AND of the four tests.
pub fn decide(item_id: &str, from: CanonLevel, tests: PromotionTests) -> PromotionDecision {
    let approved = tests.all_passed();
    let (to, reason) = if approved {
        (
            CanonLevel::Canon,
            "all four promotion tests passed".to_string(),
        )
    } else {
        (from, format!("failed tests: {}", tests.failed().join(", ")))
    };
    PromotionDecision {
        timestamp: Utc::now(),
        item_id: item_id.to_string(),
        from,
        to,
        tests,
        approved,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::import;
    use crate::store::CanonLookup;
    use cg_types::{CanonItem, CanonKind, Provenance, ProvenanceSource};

    fn passing() -> PromotionTests {
        PromotionTests {
            resistance: true,
            reproducible: true,
            invariant_safe: true,
            feasibility_impact: true,
            evidence_refs: vec!["test://ci/1234".to_string()],
        }
    }

    fn seeded(level: CanonLevel) -> (CanonStore, Ledger) {
        let store = CanonStore::in_memory();
        let ledger = Ledger::in_memory();
        let mut item = CanonItem::evidence(
            "CON_BUDGET",
            "Budget cap",
            Provenance::new(ProvenanceSource::Repo, "policy/budget.md"),
            CanonKind::Constraint {
                applies_to: vec!["spend".to_string()],
                rule: "cost <= 500".to_string(),
            },
        );
        item.level = level;
        import(ExecutionMode::Live, &store, &ledger, vec![item]).unwrap();
        (store, ledger)
    }

    #[test]
    fn approved_promotion_reaches_canon_and_is_ledgered() {
        let (store, ledger) = seeded(CanonLevel::Evidence);
        let gate = PromotionGate::new(&store, &ledger);
        let decision = gate
            .promote(
                ExecutionMode::Live,
                PromotionRequest::new("CON_BUDGET", CanonLevel::Evidence, passing()),
            )
            .unwrap();

        assert!(decision.approved);
        assert_eq!(decision.to, CanonLevel::Canon);
        assert!(store.is_canon("CON_BUDGET"));

        let entries = ledger.entries().unwrap();
        assert!(matches!(
            &entries[1].payload,
            LedgerPayload::Promotion(d) if d.approved && d.item_id == "CON_BUDGET"
        ));
    }

    #[test]
    fn one_failed_test_keeps_level_and_is_still_ledgered() {
        let (store, ledger) = seeded(CanonLevel::Proposed);
        let gate = PromotionGate::new(&store, &ledger);
        let mut tests = passing();
        tests.reproducible = false;

        let decision = gate
            .promote(
                ExecutionMode::Live,
                PromotionRequest::new("CON_BUDGET", CanonLevel::Proposed, tests),
            )
            .unwrap();

        assert!(!decision.approved);
        assert_eq!(decision.to, CanonLevel::Proposed);
        assert!(decision.reason.contains("reproducible"));
        assert!(!store.is_canon("CON_BUDGET"));
        assert_eq!(ledger.len().unwrap(), 2);
    }

    #[test]
    fn canon_item_cannot_be_promoted_again() {
        let (store, ledger) = seeded(CanonLevel::Evidence);
        let gate = PromotionGate::new(&store, &ledger);
        let request = PromotionRequest::new("CON_BUDGET", CanonLevel::Evidence, passing());
        gate.promote(ExecutionMode::Live, request).unwrap();

        let again = PromotionRequest::new("CON_BUDGET", CanonLevel::Canon, passing());
        let err = gate.promote(ExecutionMode::Live, again).unwrap_err();
        assert!(matches!(err, CanonError::AlreadyCanon { .. }));
    }

    #[test]
    fn stale_from_level_is_rejected() {
        let (store, ledger) = seeded(CanonLevel::Proposed);
        let gate = PromotionGate::new(&store, &ledger);
        let err = gate
            .promote(
                ExecutionMode::Live,
                PromotionRequest::new("CON_BUDGET", CanonLevel::Evidence, passing()),
            )
            .unwrap_err();
        assert!(matches!(err, CanonError::StaleLevel { .. }));
        assert_eq!(ledger.len().unwrap(), 1);
    }

    #[test]
    fn non_canon_target_is_rejected() {
        let (store, ledger) = seeded(CanonLevel::Evidence);
        let gate = PromotionGate::new(&store, &ledger);
        let mut request = PromotionRequest::new("CON_BUDGET", CanonLevel::Evidence, passing());
        request.to = Some(CanonLevel::Proposed);
        let err = gate.promote(ExecutionMode::Live, request).unwrap_err();
        assert!(matches!(err, CanonError::InvalidTarget { .. }));
    }

    #[test]
    fn unknown_item_is_not_found() {
        let store = CanonStore::in_memory();
        let ledger = Ledger::in_memory();
        let gate = PromotionGate::new(&store, &ledger);
        let err = gate
            .promote(
                ExecutionMode::Live,
                PromotionRequest::new("NOPE", CanonLevel::Evidence, passing()),
            )
            .unwrap_err();
        assert!(matches!(err, CanonError::NotFound(_)));
    }

    #[test]
    fn replay_promotion_mutates_nothing() {
        let (store, ledger) = seeded(CanonLevel::Evidence);
        let gate = PromotionGate::new(&store, &ledger);
        let decision = gate
            .promote(
                ExecutionMode::Replay,
                PromotionRequest::new("CON_BUDGET", CanonLevel::Evidence, passing()),
            )
            .unwrap();
        assert!(decision.approved);
        assert!(!store.is_canon("CON_BUDGET"));
        assert_eq!(ledger.len().unwrap(), 1);
    }

    #[test]
    fn ledger_failure_leaves_level_on_disk_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = CanonStore::open(dir.path()).unwrap();
        let item = CanonItem::evidence(
            "DEF_QUORUM",
            "Quorum",
            Provenance::new(ProvenanceSource::Repo, "docs/raft.md"),
            CanonKind::Definition {
                term: "quorum".to_string(),
                text: "A majority of voters".to_string(),
            },
        );
        import(ExecutionMode::Live, &store, &Ledger::in_memory(), vec![item]).unwrap();

        let mut sink = cg_ledger::MemorySink::new();
        sink.fail_next_append();
        let failing = Ledger::with_sink(Box::new(sink)).unwrap();
        let err = PromotionGate::new(&store, &failing)
            .promote(
                ExecutionMode::Live,
                PromotionRequest::new("DEF_QUORUM", CanonLevel::Evidence, passing()),
            )
            .unwrap_err();
        assert!(matches!(err, CanonError::Ledger(_)));
        assert!(!store.is_canon("DEF_QUORUM"));

        let reopened = CanonStore::open(dir.path()).unwrap();
        let on_disk = reopened.try_get("DEF_QUORUM").unwrap().unwrap();
        assert_eq!(on_disk.level, CanonLevel::Evidence);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
