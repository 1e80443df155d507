// authority.rs — The authority boundary.
//
// An action is admissible only if every canon item it cites exists and is at
// CANON level. Citing nothing at all fails too: unpromoted evidence cannot
// widen what an agent may do.

use cg_canon::CanonLookup;
use serde::{Deserialize, Serialize};

/// Result of [`require_canon_refs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityCheckResult {
    pub ok: bool,
    pub action_id: String,
    pub canon_refs_used: Vec<String>,
    /// Cited ids that are not in the store.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_refs: Vec<String>,
    /// Cited ids present in the store but below CANON.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Check that `action_id` cites only CANON-level items.
///
/// Every resolver calls this before admitting an action.
pub fn require_canon_refs<L>(action_id: &str, refs: &[String], store: &L) -> AuthorityCheckResult
where
    L: CanonLookup + ?Sized,
{
    if refs.is_empty() {
        return AuthorityCheckResult {
            ok: false,
            action_id: action_id.to_string(),
            canon_refs_used: Vec::new(),
            missing_refs: Vec::new(),
            invalid_refs: Vec::new(),
            message: Some(format!(
                "authority boundary violation: action '{action_id}' cites zero canon refs"
            )),
        };
    }

    let mut missing_refs = Vec::new();
    let mut invalid_refs = Vec::new();
    for id in refs {
        match store.get(id) {
            None => missing_refs.push(id.clone()),
            Some(item) if !item.is_canon() => invalid_refs.push(id.clone()),
            Some(_) => {}
        }
    }

    let ok = missing_refs.is_empty() && invalid_refs.is_empty();
    let message = (!ok).then(|| {
        format!(
            "authority boundary violation: {} missing refs, {} non-CANON refs",
            missing_refs.len(),
            invalid_refs.len()
        )
    });

    AuthorityCheckResult {
        ok,
        action_id: action_id.to_string(),
        canon_refs_used: refs.to_vec(),
        missing_refs,
        invalid_refs,
        message,
    }
}
