// entry.rs — Ledger entries and chain verification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::hasher::{self, GENESIS_HASH};
use crate::payload::LedgerPayload;

/// One line of the ledger. Created exactly once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub sequence_index: u64,
    pub payload: LedgerPayload,
    pub timestamp: DateTime<Utc>,
    pub previous_hash: String,
    pub current_hash: String,
}

impl LedgerEntry {
    /// Build the entry that follows `previous_hash` at `sequence_index`.
    pub fn chained(
        sequence_index: u64,
        previous_hash: &str,
        payload: LedgerPayload,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let current_hash = hasher::chain_hash(previous_hash, &payload, &timestamp)?;
        Ok(Self {
            sequence_index,
            payload,
            timestamp,
            previous_hash: previous_hash.to_string(),
            current_hash,
        })
    }

    /// Recompute this entry's hash from its own fields.
    pub fn recompute_hash(&self) -> Result<String, LedgerError> {
        hasher::chain_hash(&self.previous_hash, &self.payload, &self.timestamp)
    }
}

/// Result of walking a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub valid: bool,
    /// Index of the first entry that failed; everything from here on is untrusted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broken_at_index: Option<u64>,
    /// Entries that verified before the walk stopped.
    pub verified: u64,
}

/// Walk `entries` in order, recomputing each hash from its predecessor.
///
/// An entry fails when its sequence index is out of place, its
/// `previous_hash` does not match the prior entry's `current_hash` (or the
/// genesis sentinel), or its stored `current_hash` does not match the
/// recomputed one. The walk stops at the first failure.
pub fn verify(entries: &[LedgerEntry]) -> VerifyReport {
    walk(entries.iter().map(|entry| Link {
        sequence_index: Some(entry.sequence_index),
        previous_hash: &entry.previous_hash,
        current_hash: &entry.current_hash,
        recomputed: entry.recompute_hash().ok(),
    }))
}

/// Same walk over stored records as raw JSON.
///
/// Hashing the stored JSON rather than a re-parsed entry means a field
/// injected into a record is caught even though deserialization would
/// silently drop it.
pub fn verify_records(records: &[serde_json::Value]) -> VerifyReport {
    walk(records.iter().map(|record| {
        let previous_hash = record["previous_hash"].as_str().unwrap_or_default();
        Link {
            sequence_index: record["sequence_index"].as_u64(),
            previous_hash,
            current_hash: record["current_hash"].as_str().unwrap_or_default(),
            recomputed: hasher::chain_hash(previous_hash, &record["payload"], &record["timestamp"])
                .ok(),
        }
    }))
}

struct Link<'a> {
    sequence_index: Option<u64>,
    previous_hash: &'a str,
    current_hash: &'a str,
    recomputed: Option<String>,
}

fn walk<'a>(links: impl Iterator<Item = Link<'a>>) -> VerifyReport {
    let mut expected_previous = GENESIS_HASH.to_string();
    let mut verified = 0u64;

    for (position, link) in links.enumerate() {
        let index = position as u64;
        let intact = link.sequence_index == Some(index)
            && link.previous_hash == expected_previous
            && link.recomputed.as_deref() == Some(link.current_hash);

        if !intact {
            tracing::warn!(index, stored = %link.current_hash, "ledger chain broken");
            return VerifyReport {
                valid: false,
                broken_at_index: Some(index),
                verified: index,
            };
        }
        expected_previous = link.current_hash.to_string();
        verified += 1;
    }

    VerifyReport {
        valid: true,
        broken_at_index: None,
        verified,
    }
}
