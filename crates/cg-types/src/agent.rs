// agent.rs — Per-agent context for the non-interference check.

use serde::{Deserialize, Serialize};

/// An agent's baseline expected time-to-value plus what it depends on.
///
/// Held in memory by the governor; the core never persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentContext {
    pub agent_id: String,
    pub ttv_baseline: f64,
    /// Resources whose contention delays this agent.
    #[serde(default)]
    pub depends_on_resources: Vec<String>,
    /// Shared state keys this agent reads.
    #[serde(default)]
    pub depends_on_state: Vec<String>,
}

impl AgentContext {
    pub fn new(agent_id: impl Into<String>, ttv_baseline: f64) -> Self {
        Self {
            agent_id: agent_id.into(),
            ttv_baseline,
            depends_on_resources: Vec::new(),
            depends_on_state: Vec::new(),
        }
    }

    pub fn depending_on_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on_resources = resources.into_iter().map(Into::into).collect();
        self
    }

    pub fn depending_on_state<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on_state = keys.into_iter().map(Into::into).collect();
        self
    }
}
