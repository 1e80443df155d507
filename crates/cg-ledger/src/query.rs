// query.rs — Read-side filters over ledger entries.

use chrono::{DateTime, Utc};
use cg_types::{DenialRecord, WhyNotTrace};
use serde::{Deserialize, Serialize};

use crate::entry::LedgerEntry;
use crate::payload::LedgerPayload;

/// Which denial traces to return. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhyNotFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Inclusive lower bound on the trace timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the trace timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
}

impl WhyNotFilter {
    pub fn for_action(action_id: impl Into<String>) -> Self {
        Self {
            action_id: Some(action_id.into()),
            ..Self::default()
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_window(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    /// An action filter matches either the requested action or the action
    /// the trace itself names.
    fn matches(&self, record: &DenialRecord) -> bool {
        let trace = &record.trace;
        self.action_id.as_deref().map_or(true, |a| {
            a == trace.action_id || record.action_id.as_deref() == Some(a)
        }) && self.tenant_id.as_deref().map_or(true, |t| t == record.tenant_id)
            && self.since.map_or(true, |s| trace.timestamp >= s)
            && self.until.map_or(true, |u| trace.timestamp <= u)
    }
}

/// Denial traces matching `filter`, in ledger order.
pub fn whynot<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
    filter: &WhyNotFilter,
) -> Vec<WhyNotTrace> {
    entries
        .into_iter()
        .filter_map(|entry| match &entry.payload {
            LedgerPayload::Denial(record) if filter.matches(record) => {
                Some(record.trace.clone())
            }
            _ => None,
        })
        .collect()
}
