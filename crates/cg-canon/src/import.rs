// import.rs — The canon ingestion boundary.
//
// Items enter at EVIDENCE or PROPOSED. An item already claiming CANON would
// bypass the promotion gate, so the whole batch is rejected. A batch is
// validated and staged to disk in full before the ledger record is written.
// Nothing after the ledger append can fail.

use std::collections::HashSet;

use chrono::Utc;
use cg_ledger::{Ledger, LedgerPayload};
use cg_types::{CanonImportRecord, CanonItem, CanonLevel, ExecutionMode};

use crate::error::CanonError;
use crate::store::CanonStore;

/// Import a batch of new canon items.
///
/// In replay mode the batch is validated and the would-be record returned,
/// but neither the ledger nor the store changes.
pub fn import(
    mode: ExecutionMode,
    store: &CanonStore,
    ledger: &Ledger,
    items: Vec<CanonItem>,
) -> Result<CanonImportRecord, CanonError> {
    if items.is_empty() {
        return Err(CanonError::EmptyImport);
    }

    let mut state = store.write()?;
    let mut seen = HashSet::new();
    for item in &items {
        item.validate()?;
        if item.level == CanonLevel::Canon {
            tracing::warn!(item_id = %item.id, "rejected CANON-level item at import");
            return Err(CanonError::CanonAtImport {
                item_id: item.id.clone(),
            });
        }
        if state.items.contains_key(&item.id) || !seen.insert(item.id.as_str()) {
            return Err(CanonError::AlreadyExists {
                item_id: item.id.clone(),
            });
        }
    }

    let record = CanonImportRecord {
        timestamp: Utc::now(),
        item_ids: items.iter().map(|item| item.id.clone()).collect(),
    };
    if !mode.is_live() {
        return Ok(record);
    }

    let staged = store.stage(items)?;
    ledger.append(mode, LedgerPayload::CanonImport(record.clone()))?;
    store.commit(&mut state, staged);
    tracing::info!(count = record.item_ids.len(), "canon items imported");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cg_ledger::{LedgerPayload, MemorySink};
    use cg_types::{CanonKind, Provenance, ProvenanceSource, Severity};
    use tempfile::tempdir;

    fn invariant(id: &str) -> CanonItem {
        CanonItem::evidence(
            id,
            "No deploy on Fridays",
            Provenance::new(ProvenanceSource::Chat, "thread/42"),
            CanonKind::Invariant {
                statement: "Deploys never start on Friday".to_string(),
                formal: None,
                severity: Severity::HardFail,
            },
        )
    }

    #[test]
    fn import_ledgers_then_stores() {
        let store = CanonStore::in_memory();
        let ledger = Ledger::in_memory();
        let record = import(
            ExecutionMode::Live,
            &store,
            &ledger,
            vec![invariant("INV_A"), invariant("INV_B")],
        )
        .unwrap();

        assert_eq!(record.item_ids, vec!["INV_A", "INV_B"]);
        assert_eq!(store.list().unwrap().len(), 2);
        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0].payload, LedgerPayload::CanonImport(_)));
    }

    #[test]
    fn canon_level_item_rejects_whole_batch() {
        let store = CanonStore::in_memory();
        let ledger = Ledger::in_memory();
        let mut forged = invariant("INV_B");
        forged.level = CanonLevel::Canon;

        let err = import(
            ExecutionMode::Live,
            &store,
            &ledger,
            vec![invariant("INV_A"), forged],
        )
        .unwrap_err();
        assert!(matches!(err, CanonError::CanonAtImport { ref item_id } if item_id == "INV_B"));
        assert!(store.list().unwrap().is_empty());
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn reimport_cannot_reset_level() {
        let store = CanonStore::in_memory();
        let ledger = Ledger::in_memory();
        import(ExecutionMode::Live, &store, &ledger, vec![invariant("INV_A")]).unwrap();

        let err = import(ExecutionMode::Live, &store, &ledger, vec![invariant("INV_A")])
            .unwrap_err();
        assert!(matches!(err, CanonError::AlreadyExists { .. }));

        let err = import(
            ExecutionMode::Live,
            &store,
            &ledger,
            vec![invariant("INV_C"), invariant("INV_C")],
        )
        .unwrap_err();
        assert!(matches!(err, CanonError::AlreadyExists { .. }));
    }

    #[test]
    fn replay_import_changes_nothing() {
        let store = CanonStore::in_memory();
        let ledger = Ledger::in_memory();
        let record = import(ExecutionMode::Replay, &store, &ledger, vec![invariant("INV_A")])
            .unwrap();
        assert_eq!(record.item_ids, vec!["INV_A"]);
        assert!(store.list().unwrap().is_empty());
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn missing_provenance_is_rejected() {
        let store = CanonStore::in_memory();
        let ledger = Ledger::in_memory();
        let mut item = invariant("INV_A");
        item.provenance.reference.clear();
        let err = import(ExecutionMode::Live, &store, &ledger, vec![item]).unwrap_err();
        assert!(matches!(err, CanonError::InvalidItem(_)));
    }

    fn dir_entries(path: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(path)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn unsafe_id_leaves_ledger_and_directory_untouched() {
        let dir = tempdir().unwrap();
        let canon_dir = dir.path().join("canon");
        let ledger_path = dir.path().join("ledger.jsonl");
        let store = CanonStore::open(&canon_dir).unwrap();
        let ledger = Ledger::open(&ledger_path).unwrap();

        let err = import(
            ExecutionMode::Live,
            &store,
            &ledger,
            vec![invariant("INV_OK"), invariant("nested/INV_BAD")],
        )
        .unwrap_err();
        assert!(matches!(err, CanonError::InvalidItem(_)));
        assert!(ledger.is_empty().unwrap());
        assert!(Ledger::read_all(&ledger_path).unwrap().is_empty());
        assert!(store.list().unwrap().is_empty());
        assert!(dir_entries(&canon_dir).is_empty());
    }

    #[test]
    fn failed_ledger_append_discards_staged_files() {
        let dir = tempdir().unwrap();
        let canon_dir = dir.path().join("canon");
        let store = CanonStore::open(&canon_dir).unwrap();
        let mut sink = MemorySink::new();
        sink.fail_next_append();
        let ledger = Ledger::with_sink(Box::new(sink)).unwrap();

        let err = import(
            ExecutionMode::Live,
            &store,
            &ledger,
            vec![invariant("INV_A"), invariant("INV_B")],
        )
        .unwrap_err();
        assert!(matches!(err, CanonError::Ledger(_)));
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.generation().unwrap(), 0);
        assert!(dir_entries(&canon_dir).is_empty());

        // The next attempt goes through and lands both files.
        import(
            ExecutionMode::Live,
            &store,
            &ledger,
            vec![invariant("INV_A"), invariant("INV_B")],
        )
        .unwrap();
        assert_eq!(dir_entries(&canon_dir), vec!["INV_A.json", "INV_B.json"]);
        assert_eq!(CanonStore::open(&canon_dir).unwrap().list().unwrap().len(), 2);
    }
}
