// whynot.rs — The WhyNot tracer.
//
// Every denial in the pipeline is built here, so a trace always carries at
// least one reason code and a message. When several gates reject the same
// candidate, their traces merge into one trace for that candidate.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use cg_types::{DenialReasonCode, WhyNotTrace};

/// Builder for a single denial.
#[derive(Debug, Clone)]
pub struct TraceBuilder {
    trace: WhyNotTrace,
}

/// Start a denial of `action_id` for `code`.
pub fn deny(
    timestamp: DateTime<Utc>,
    action_id: impl Into<String>,
    code: DenialReasonCode,
    message: impl Into<String>,
) -> TraceBuilder {
    TraceBuilder {
        trace: WhyNotTrace {
            timestamp,
            action_id: action_id.into(),
            path_id: None,
            reason_codes: BTreeSet::from([code]),
            missing_canon_ids: Vec::new(),
            violated_invariant_ids: Vec::new(),
            message: message.into(),
            context: serde_json::Value::Null,
        },
    }
}

impl TraceBuilder {
    pub fn with_code(mut self, code: DenialReasonCode) -> Self {
        self.trace.reason_codes.insert(code);
        self
    }

    pub fn with_path(mut self, path_id: impl Into<String>) -> Self {
        self.trace.path_id = Some(path_id.into());
        self
    }

    pub fn with_missing<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        extend_unique(&mut self.trace.missing_canon_ids, ids.into_iter().map(Into::into));
        self
    }

    pub fn with_invariants<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        extend_unique(
            &mut self.trace.violated_invariant_ids,
            ids.into_iter().map(Into::into),
        );
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.trace.context = context;
        self
    }

    pub fn build(self) -> WhyNotTrace {
        self.trace
    }
}

/// Fold every trace raised against one candidate into a single trace.
///
/// Reason codes and ids are unioned, messages joined in gate order, and each
/// gate's context kept under its reason code. Returns `None` for no traces.
pub fn merge(path_id: Option<&str>, traces: Vec<WhyNotTrace>) -> Option<WhyNotTrace> {
    let mut iter = traces.into_iter();
    let mut merged = iter.next()?;
    let mut contexts = serde_json::Map::new();
    let mut messages = vec![merged.message.clone()];
    stash_context(&mut contexts, &merged);

    for trace in iter {
        stash_context(&mut contexts, &trace);
        merged.reason_codes.extend(trace.reason_codes);
        extend_unique(&mut merged.missing_canon_ids, trace.missing_canon_ids);
        extend_unique(&mut merged.violated_invariant_ids, trace.violated_invariant_ids);
        messages.push(trace.message);
    }

    if let Some(path_id) = path_id {
        merged.path_id = Some(path_id.to_string());
    }
    merged.message = messages.join("; ");
    merged.context = if contexts.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::Value::Object(contexts)
    };
    Some(merged)
}

fn stash_context(contexts: &mut serde_json::Map<String, serde_json::Value>, trace: &WhyNotTrace) {
    if trace.context.is_null() {
        return;
    }
    let key = trace
        .reason_codes
        .iter()
        .next()
        .map(|code| code.as_str().to_string())
        .unwrap_or_default();
    contexts.insert(key, trace.context.clone());
}

fn extend_unique(target: &mut Vec<String>, items: impl IntoIterator<Item = String>) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}
