// payload.rs — What a ledger entry records.
//
// One variant per event kind. Consumers match exhaustively instead of probing
// fields of an untyped blob.

use cg_types::{
    CanonImportRecord, DecisionRecord, DenialRecord, PromotionDecision, SessionCompletion,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum LedgerPayload {
    /// Outcome of a decision request (allowed or denied).
    Decision(DecisionRecord),
    /// Result of a promotion request (approved or not).
    Promotion(PromotionDecision),
    /// One WhyNot trace.
    Denial(DenialRecord),
    /// An agent session finished.
    SessionCompletion(SessionCompletion),
    /// A batch of canon items entered at the import boundary.
    CanonImport(CanonImportRecord),
}

impl LedgerPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerPayload::Decision(_) => "decision",
            LedgerPayload::Promotion(_) => "promotion",
            LedgerPayload::Denial(_) => "denial",
            LedgerPayload::SessionCompletion(_) => "session_completion",
            LedgerPayload::CanonImport(_) => "canon_import",
        }
    }

    /// The action id this payload concerns, if any.
    pub fn action_id(&self) -> Option<&str> {
        match self {
            LedgerPayload::Decision(record) => Some(&record.action_id),
            LedgerPayload::Denial(record) => Some(&record.trace.action_id),
            LedgerPayload::Promotion(_)
            | LedgerPayload::SessionCompletion(_)
            | LedgerPayload::CanonImport(_) => None,
        }
    }
}
