// hasher.rs — SHA-256 hashing and canonical payload bytes.
//
// All hashes are SHA-256, hex-encoded as 64 lowercase characters.
//
// Canonical bytes: the value is first converted to a `serde_json::Value`,
// whose object map is a BTreeMap (the workspace never enables serde_json's
// `preserve_order`), then written compactly. Keys therefore always appear in
// sorted order regardless of struct field order or HashMap iteration order.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::LedgerError;

/// `previous_hash` of the first entry: hex encoding of an all-zero digest.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Hash arbitrary bytes, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash a UTF-8 string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Deterministic JSON bytes for any serializable value (sorted keys, compact).
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, LedgerError> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&value)?)
}

#[derive(Serialize)]
struct Hashed<'a, P, T> {
    payload: &'a P,
    timestamp: &'a T,
}

/// Compute an entry hash: `H(previous_hash ∥ canonical({payload, timestamp}))`.
///
/// Generic so the same digest is produced from a typed entry being appended
/// and from the raw JSON of a stored record being verified.
pub fn chain_hash<P: Serialize, T: Serialize>(
    previous_hash: &str,
    payload: &P,
    timestamp: &T,
) -> Result<String, LedgerError> {
    let body = canonical_bytes(&Hashed { payload, timestamp })?;
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(&body);
    Ok(format!("{:x}", hasher.finalize()))
}
