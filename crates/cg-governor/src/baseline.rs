// baseline.rs — Versioned registry of agent baselines.
//
// Non-interference is judged against every other agent's baseline TTV. A
// decision reads a snapshot, evaluates without holding any lock, and then
// commits only if the registry version is still the one it read. The commit
// handle holds the write lock, so the version check, the ledger append and
// the baseline update are one step to every other decision.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockWriteGuard};

use cg_types::AgentContext;
use serde::{Deserialize, Serialize};

use crate::error::GovernorError;

/// A consistent copy of every registered agent at one version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    pub version: u64,
    pub agents: BTreeMap<String, AgentContext>,
}

impl BaselineSnapshot {
    /// The acting agent's context. Unregistered agents act with a zero baseline.
    pub fn actor(&self, agent_id: &str) -> AgentContext {
        self.agents
            .get(agent_id)
            .cloned()
            .unwrap_or_else(|| AgentContext::new(agent_id, 0.0))
    }

    /// Every registered agent except `agent_id`, ordered by id.
    pub fn others(&self, agent_id: &str) -> Vec<AgentContext> {
        self.agents
            .values()
            .filter(|agent| agent.agent_id != agent_id)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct BaselineRegistry {
    state: RwLock<BaselineSnapshot>,
}

impl BaselineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agents(agents: impl IntoIterator<Item = AgentContext>) -> Self {
        let agents = agents
            .into_iter()
            .map(|agent| (agent.agent_id.clone(), agent))
            .collect();
        Self {
            state: RwLock::new(BaselineSnapshot { version: 0, agents }),
        }
    }

    pub fn snapshot(&self) -> Result<BaselineSnapshot, GovernorError> {
        Ok(self
            .state
            .read()
            .map_err(|_| GovernorError::LockPoisoned)?
            .clone())
    }

    pub fn version(&self) -> Result<u64, GovernorError> {
        Ok(self
            .state
            .read()
            .map_err(|_| GovernorError::LockPoisoned)?
            .version)
    }

    /// Insert or replace an agent. Returns the new version.
    pub fn register(&self, agent: AgentContext) -> Result<u64, GovernorError> {
        let mut state = self.write()?;
        tracing::info!(agent_id = %agent.agent_id, ttv_baseline = agent.ttv_baseline, "agent baseline registered");
        state.agents.insert(agent.agent_id.clone(), agent);
        state.version += 1;
        Ok(state.version)
    }

    /// Take the write lock if the registry is still at `expected_version`.
    ///
    /// Returns `None` when another commit got there first.
    pub fn begin_commit(
        &self,
        expected_version: u64,
    ) -> Result<Option<BaselineCommit<'_>>, GovernorError> {
        let state = self.write()?;
        if state.version != expected_version {
            return Ok(None);
        }
        Ok(Some(BaselineCommit { state }))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BaselineSnapshot>, GovernorError> {
        self.state.write().map_err(|_| GovernorError::LockPoisoned)
    }
}

/// Exclusive access to the registry between a successful version check and
/// the end of the commit.
pub struct BaselineCommit<'a> {
    state: RwLockWriteGuard<'a, BaselineSnapshot>,
}

impl BaselineCommit<'_> {
    /// Move other agents' baselines to their projected TTVs after an allowed
    /// action. Unregistered agents and the actor are left alone. The version
    /// advances only if some baseline actually changed.
    pub fn apply(&mut self, actor: &str, projected: &BTreeMap<String, f64>) -> bool {
        let mut changed = false;
        for (agent_id, ttv) in projected {
            if agent_id == actor || !ttv.is_finite() {
                continue;
            }
            if let Some(agent) = self.state.agents.get_mut(agent_id) {
                if agent.ttv_baseline != *ttv {
                    agent.ttv_baseline = *ttv;
                    changed = true;
                }
            }
        }
        if changed {
            self.state.version += 1;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BaselineRegistry {
        BaselineRegistry::with_agents([
            AgentContext::new("A", 100.0),
            AgentContext::new("B", 150.0),
            AgentContext::new("C", 200.0),
        ])
    }

    #[test]
    fn snapshot_splits_actor_from_others() {
        let snap = registry().snapshot().unwrap();
        assert_eq!(snap.actor("A").ttv_baseline, 100.0);
        let others: Vec<_> = snap.others("A").into_iter().map(|a| a.agent_id).collect();
        assert_eq!(others, vec!["B", "C"]);
        assert_eq!(snap.actor("nobody").ttv_baseline, 0.0);
    }

    #[test]
    fn register_bumps_version() {
        let reg = registry();
        assert_eq!(reg.version().unwrap(), 0);
        assert_eq!(reg.register(AgentContext::new("D", 10.0)).unwrap(), 1);
        assert_eq!(reg.snapshot().unwrap().agents.len(), 4);
    }

    #[test]
    fn stale_commit_is_refused() {
        let reg = registry();
        reg.register(AgentContext::new("D", 10.0)).unwrap();
        assert!(reg.begin_commit(0).unwrap().is_none());
        assert!(reg.begin_commit(1).unwrap().is_some());
    }

    #[test]
    fn apply_moves_other_baselines_only() {
        let reg = registry();
        let projected = BTreeMap::from([
            ("A".to_string(), 999.0),
            ("B".to_string(), 175.0),
            ("C".to_string(), 200.0),
            ("ghost".to_string(), 1.0),
        ]);
        {
            let mut commit = reg.begin_commit(0).unwrap().unwrap();
            assert!(commit.apply("A", &projected));
        }
        let snap = reg.snapshot().unwrap();
        assert_eq!(snap.version, 1);
        assert_eq!(snap.agents["A"].ttv_baseline, 100.0);
        assert_eq!(snap.agents["B"].ttv_baseline, 175.0);
        assert!(!snap.agents.contains_key("ghost"));
    }

    #[test]
    fn unchanged_projection_keeps_version() {
        let reg = registry();
        let projected = BTreeMap::from([("B".to_string(), 150.0)]);
        let mut commit = reg.begin_commit(0).unwrap().unwrap();
        assert!(!commit.apply("A", &projected));
        drop(commit);
        assert_eq!(reg.version().unwrap(), 0);
    }
}
