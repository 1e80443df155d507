// ledger.rs — The append-only, hash-chained ledger.
//
// All appends go through one mutex, so sequence indices are dense and
// every entry links to the one committed before it. The in-memory chain only
// advances after the sink accepted the whole batch; a failed write leaves the
// ledger exactly as it was.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use cg_types::{ExecutionMode, WhyNotTrace};

use crate::entry::{self, LedgerEntry, VerifyReport};
use crate::error::LedgerError;
use crate::hasher::GENESIS_HASH;
use crate::payload::LedgerPayload;
use crate::query::{self, WhyNotFilter};
use crate::sink::{FileSink, LedgerSink, MemorySink};
use crate::subscribe::{
    Subscribers, Subscription, SubscriptionId, DEFAULT_SUBSCRIBER_CAPACITY,
};

/// Append-only ledger over a [`LedgerSink`].
pub struct Ledger {
    state: Mutex<LedgerState>,
}

struct LedgerState {
    sink: Box<dyn LedgerSink>,
    entries: Vec<LedgerEntry>,
    /// Set when the stored chain failed verification on open.
    broken_at: Option<u64>,
    subscribers: Subscribers,
}

impl LedgerState {
    fn head_hash(&self) -> String {
        self.entries
            .last()
            .map(|e| e.current_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string())
    }
}

impl Ledger {
    /// Open (or create) a JSONL ledger file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Self::with_sink(Box::new(FileSink::open(path)?))
    }

    /// A ledger that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                sink: Box::new(MemorySink::new()),
                entries: Vec::new(),
                broken_at: None,
                subscribers: Subscribers::default(),
            }),
        }
    }

    /// Load and verify whatever the sink already holds.
    ///
    /// A broken chain does not fail the open: the verified prefix stays
    /// readable, and appends are refused with [`LedgerError::ChainBroken`].
    pub fn with_sink(mut sink: Box<dyn LedgerSink>) -> Result<Self, LedgerError> {
        let records = sink.load()?;
        let report = entry::verify_records(&records);
        let trusted = report.verified as usize;

        let entries = records[..trusted]
            .iter()
            .enumerate()
            .map(|(i, record)| {
                serde_json::from_value(record.clone())
                    .map_err(|source| LedgerError::CorruptRecord { line: i + 1, source })
            })
            .collect::<Result<Vec<LedgerEntry>, _>>()?;

        if let Some(index) = report.broken_at_index {
            tracing::error!(
                index,
                stored = records.len(),
                "ledger chain broken on open; appends disabled"
            );
        } else {
            tracing::debug!(entries = entries.len(), "ledger opened");
        }

        Ok(Self {
            state: Mutex::new(LedgerState {
                sink,
                entries,
                broken_at: report.broken_at_index,
                subscribers: Subscribers::default(),
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, LedgerError> {
        self.state.lock().map_err(|_| LedgerError::LockPoisoned)
    }

    /// Append one payload. Returns the committed entry.
    pub fn append(
        &self,
        mode: ExecutionMode,
        payload: LedgerPayload,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut committed = self.append_batch(mode, vec![payload])?;
        committed.pop().ok_or(LedgerError::EmptyBatch)
    }

    /// Append several payloads as one atomic unit.
    ///
    /// The entries get consecutive sequence indices and are written to the
    /// sink in a single call. Either all of them commit or none does.
    pub fn append_batch(
        &self,
        mode: ExecutionMode,
        payloads: Vec<LedgerPayload>,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        if !mode.is_live() {
            return Err(LedgerError::ReplayMode);
        }
        if payloads.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }

        let mut state = self.lock()?;
        if let Some(index) = state.broken_at {
            return Err(LedgerError::ChainBroken { index });
        }

        let mut previous = state.head_hash();
        let mut sequence = state.entries.len() as u64;
        let mut staged = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let entry = LedgerEntry::chained(sequence, &previous, payload, Utc::now())?;
            previous = entry.current_hash.clone();
            sequence += 1;
            staged.push(entry);
        }

        if let Err(err) = state.sink.append(&staged) {
            tracing::error!(error = %err, batch = staged.len(), "ledger append failed");
            return Err(err);
        }

        for entry in &staged {
            tracing::debug!(
                sequence_index = entry.sequence_index,
                kind = entry.payload.kind(),
                "ledger entry committed"
            );
        }
        state.entries.extend(staged.iter().cloned());
        state.subscribers.publish(&staged);
        Ok(staged)
    }

    /// Snapshot of every trusted entry, oldest first.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.lock()?.entries.clone())
    }

    pub fn len(&self) -> Result<usize, LedgerError> {
        Ok(self.lock()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len()? == 0)
    }

    /// Hash the next entry will link to.
    pub fn head_hash(&self) -> Result<String, LedgerError> {
        Ok(self.lock()?.head_hash())
    }

    /// Re-read the sink and verify the whole stored chain.
    pub fn verify_chain(&self) -> Result<VerifyReport, LedgerError> {
        let mut state = self.lock()?;
        let records = state.sink.load()?;
        Ok(entry::verify_records(&records))
    }

    /// Whether appends are currently refused because of a broken chain.
    pub fn broken_at(&self) -> Result<Option<u64>, LedgerError> {
        Ok(self.lock()?.broken_at)
    }

    /// Receive every entry committed from now on.
    ///
    /// Buffers up to [`DEFAULT_SUBSCRIBER_CAPACITY`] undrained entries.
    pub fn subscribe(&self) -> Result<Subscription, LedgerError> {
        self.subscribe_with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    /// Like [`Ledger::subscribe`], with an explicit buffer size. A subscriber
    /// that falls `capacity` entries behind is dropped rather than blocking
    /// appends.
    pub fn subscribe_with_capacity(&self, capacity: usize) -> Result<Subscription, LedgerError> {
        Ok(self.lock()?.subscribers.add(capacity))
    }

    /// Stop delivering to `id`. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, LedgerError> {
        Ok(self.lock()?.subscribers.remove(id))
    }

    pub fn subscriber_count(&self) -> Result<usize, LedgerError> {
        Ok(self.lock()?.subscribers.len())
    }

    /// Denial traces matching `filter`, in sequence order.
    pub fn whynot(&self, filter: &WhyNotFilter) -> Result<Vec<WhyNotTrace>, LedgerError> {
        let state = self.lock()?;
        Ok(query::whynot(&state.entries, filter))
    }

    /// Read every entry of a ledger file without opening it for append.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<LedgerEntry>, LedgerError> {
        FileSink::read_records(path)?
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                serde_json::from_value(record)
                    .map_err(|source| LedgerError::CorruptRecord { line: i + 1, source })
            })
            .collect()
    }

    /// Verify a ledger file's chain without opening it for append.
    pub fn verify_file(path: impl AsRef<Path>) -> Result<VerifyReport, LedgerError> {
        Ok(entry::verify_records(&FileSink::read_records(path)?))
    }
}
