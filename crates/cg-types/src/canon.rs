// canon.rs — Canon items and authority levels.
//
// A canon item is one piece of versioned knowledge: a definition, an
// invariant, or a constraint. Items enter as EVIDENCE (or PROPOSED) and only
// the promotion gate can raise them to CANON. Only CANON items may be cited
// as authority for an action.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Authority level of a canon item.
///
/// Ordered: `Evidence < Proposed < Canon`. Levels never regress automatically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonLevel {
    Evidence,
    Proposed,
    Canon,
}

impl fmt::Display for CanonLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonLevel::Evidence => write!(f, "EVIDENCE"),
            CanonLevel::Proposed => write!(f, "PROPOSED"),
            CanonLevel::Canon => write!(f, "CANON"),
        }
    }
}

/// Where a canon item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceSource {
    Chat,
    Repo,
    Test,
    Prod,
    Import,
}

/// Provenance of a canon item. Mandatory on every item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: ProvenanceSource,
    /// Non-empty reference to the originating artifact (commit, document, ticket).
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Provenance {
    pub fn new(source: ProvenanceSource, reference: impl Into<String>) -> Self {
        Self {
            source,
            reference: reference.into(),
            author: None,
            hash: None,
        }
    }
}

/// How hard an invariant fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    HardFail,
    SoftFail,
}

/// Kind-specific payload of a canon item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonKind {
    Definition {
        term: String,
        text: String,
    },
    Invariant {
        statement: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        formal: Option<String>,
        severity: Severity,
    },
    Constraint {
        applies_to: Vec<String>,
        rule: String,
    },
}

impl CanonKind {
    pub fn name(&self) -> &'static str {
        match self {
            CanonKind::Definition { .. } => "DEFINITION",
            CanonKind::Invariant { .. } => "INVARIANT",
            CanonKind::Constraint { .. } => "CONSTRAINT",
        }
    }
}

/// One item of versioned knowledge.
///
/// `timestamp` and `provenance` are required fields: an item serialized
/// without them fails to deserialize, so it can never reach the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonItem {
    pub id: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub provenance: Provenance,
    pub level: CanonLevel,
    #[serde(flatten)]
    pub kind: CanonKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CanonItem {
    /// Create a new item at EVIDENCE level, timestamped now.
    pub fn evidence(
        id: impl Into<String>,
        title: impl Into<String>,
        provenance: Provenance,
        kind: CanonKind,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            timestamp: Utc::now(),
            provenance,
            level: CanonLevel::Evidence,
            kind,
            notes: None,
        }
    }

    pub fn is_canon(&self) -> bool {
        self.level == CanonLevel::Canon
    }

    /// Structural checks that serde cannot express: non-empty id and
    /// non-empty provenance reference.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.id.trim().is_empty() {
            return Err(TypesError::EmptyId);
        }
        if !is_safe_id(&self.id) {
            return Err(TypesError::UnsafeId {
                item_id: self.id.clone(),
            });
        }
        if self.provenance.reference.trim().is_empty() {
            return Err(TypesError::MissingProvenance {
                item_id: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// Item ids name files in the canon directory.
fn is_safe_id(id: &str) -> bool {
    !id.starts_with('.')
        && !id.contains("..")
        && !id.contains(['/', '\\', '\0'])
}
