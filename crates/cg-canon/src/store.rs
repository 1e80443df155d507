// store.rs — CanonStore: the versioned knowledge base.
//
// Items are kept in memory behind a RwLock and, when the store has a
// directory, mirrored as one JSON file per item: `<canon_dir>/<item_id>.json`.
// Many readers, one writer. The only writers are the import boundary (new
// items below CANON) and the promotion gate (level changes).
//
// Every write bumps `generation`, which lets a caller detect that canon
// changed between evaluating a decision and committing it.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cg_types::{CanonItem, CanonLevel};

use crate::error::CanonError;

/// Read access to canon, as needed by the authority enforcer and OPTR gates.
pub trait CanonLookup {
    fn get(&self, id: &str) -> Option<CanonItem>;

    /// True only if the item exists and is at CANON level.
    fn is_canon(&self, id: &str) -> bool {
        self.get(id).is_some_and(|item| item.is_canon())
    }
}

impl CanonLookup for HashMap<String, CanonItem> {
    fn get(&self, id: &str) -> Option<CanonItem> {
        HashMap::get(self, id).cloned()
    }
}

impl CanonLookup for BTreeMap<String, CanonItem> {
    fn get(&self, id: &str) -> Option<CanonItem> {
        BTreeMap::get(self, id).cloned()
    }
}

#[derive(Debug, Default)]
pub(crate) struct CanonState {
    pub(crate) items: HashMap<String, CanonItem>,
    pub(crate) generation: u64,
}

/// The canon store.
#[derive(Debug)]
pub struct CanonStore {
    state: RwLock<CanonState>,
    dir: Option<PathBuf>,
}

impl CanonStore {
    /// A store that keeps nothing on disk.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(CanonState::default()),
            dir: None,
        }
    }

    /// Open a directory-backed store, loading every `*.json` item in it.
    /// Creates the directory if it doesn't exist.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CanonError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| CanonError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut items = HashMap::new();
        let listing = fs::read_dir(&dir).map_err(|source| CanonError::Io {
            path: dir.clone(),
            source,
        })?;
        for entry in listing {
            let entry = entry.map_err(|source| CanonError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let json = fs::read_to_string(&path).map_err(|source| CanonError::Io {
                path: path.clone(),
                source,
            })?;
            let item: CanonItem = serde_json::from_str(&json)?;
            item.validate()?;
            items.insert(item.id.clone(), item);
        }

        tracing::debug!(dir = %dir.display(), items = items.len(), "canon store opened");
        Ok(Self {
            state: RwLock::new(CanonState {
                items,
                generation: 0,
            }),
            dir: Some(dir),
        })
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, CanonState>, CanonError> {
        self.state.read().map_err(|_| CanonError::LockPoisoned)
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, CanonState>, CanonError> {
        self.state.write().map_err(|_| CanonError::LockPoisoned)
    }

    /// Look up one item.
    pub fn try_get(&self, id: &str) -> Result<Option<CanonItem>, CanonError> {
        Ok(self.read()?.items.get(id).cloned())
    }

    /// Every item, sorted by id.
    pub fn list(&self) -> Result<Vec<CanonItem>, CanonError> {
        let mut items: Vec<CanonItem> = self.read()?.items.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    /// Items at exactly `level`, sorted by id.
    pub fn list_by_level(&self, level: CanonLevel) -> Result<Vec<CanonItem>, CanonError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|item| item.level == level)
            .collect())
    }

    /// Ids of every CANON item, the "satisfied" set for prerequisite gating.
    pub fn canon_ids(&self) -> Result<Vec<String>, CanonError> {
        Ok(self
            .list_by_level(CanonLevel::Canon)?
            .into_iter()
            .map(|item| item.id)
            .collect())
    }

    /// Monotonic counter bumped on every write.
    pub fn generation(&self) -> Result<u64, CanonError> {
        Ok(self.read()?.generation)
    }

    /// Hold a read lock on the whole store.
    ///
    /// No import or promotion can land while the pin is alive, so a caller can
    /// check the generation it evaluated against and append to the ledger
    /// knowing canon did not move underneath it.
    pub fn pin(&self) -> Result<PinnedCanon<'_>, CanonError> {
        Ok(PinnedCanon { state: self.read()? })
    }

    /// Write `items` to temp files next to their final paths.
    ///
    /// Every fallible disk write happens here, before the caller touches the
    /// ledger. Dropping the returned [`StagedItems`] without committing
    /// removes the temp files.
    pub(crate) fn stage(&self, items: Vec<CanonItem>) -> Result<StagedItems, CanonError> {
        let mut staged = StagedItems {
            items,
            files: Vec::new(),
        };
        let Some(dir) = &self.dir else {
            return Ok(staged);
        };
        for item in &staged.items {
            let path = dir.join(format!("{}.json", item.id));
            let tmp = dir.join(format!(".{}.json.tmp", item.id));
            let json = serde_json::to_string_pretty(item)?;
            staged.files.push((tmp.clone(), path));
            fs::write(&tmp, json).map_err(|source| CanonError::Io { path: tmp, source })?;
        }
        Ok(staged)
    }

    /// Move staged items into place under an already-held write guard.
    ///
    /// Called after the ledger append, so it does not fail: memory always
    /// takes the items, and a rename that goes wrong is logged.
    pub(crate) fn commit(&self, state: &mut CanonState, mut staged: StagedItems) {
        for (tmp, path) in staged.files.drain(..) {
            if let Err(err) = fs::rename(&tmp, &path) {
                tracing::error!(
                    error = %err,
                    path = %path.display(),
                    "canon item ledgered but not persisted"
                );
            }
        }
        for item in staged.items.drain(..) {
            state.items.insert(item.id.clone(), item);
        }
        state.generation += 1;
    }

    /// Stage and commit in one step. For writes with no ledger record.
    #[cfg(test)]
    pub(crate) fn put(&self, state: &mut CanonState, item: CanonItem) -> Result<(), CanonError> {
        let staged = self.stage(vec![item])?;
        self.commit(state, staged);
        Ok(())
    }
}

/// Items written to temp files but not yet visible. See [`CanonStore::stage`].
#[derive(Debug)]
pub(crate) struct StagedItems {
    items: Vec<CanonItem>,
    files: Vec<(PathBuf, PathBuf)>,
}

impl Drop for StagedItems {
    fn drop(&mut self) {
        for (tmp, _) in &self.files {
            let _ = fs::remove_file(tmp);
        }
    }
}

impl CanonLookup for CanonStore {
    fn get(&self, id: &str) -> Option<CanonItem> {
        match self.try_get(id) {
            Ok(item) => item,
            Err(err) => {
                tracing::warn!(error = %err, id, "canon lookup failed");
                None
            }
        }
    }
}

/// A read-locked view of the store. See [`CanonStore::pin`].
pub struct PinnedCanon<'a> {
    state: RwLockReadGuard<'a, CanonState>,
}

impl PinnedCanon<'_> {
    pub fn generation(&self) -> u64 {
        self.state.generation
    }
}

impl CanonLookup for PinnedCanon<'_> {
    fn get(&self, id: &str) -> Option<CanonItem> {
        self.state.items.get(id).cloned()
    }
}
