// config.rs — Governor configuration.
//
// GovernorConfig determines where the governor keeps its state (the ledger
// file and the canon directory) and the default OPTR parameters. The
// `for_project()` constructor lays everything out under a `.cg/` directory in
// the project root; `load()` overlays `.cg/governor.toml` when it exists.

use std::path::{Path, PathBuf};

use cg_policy::TableFeatureModel;
use cg_types::{AgentContext, OptrBounds, OptrWeights};
use serde::{Deserialize, Serialize};

use crate::error::GovernorError;

/// Name of the per-project state directory.
pub const STATE_DIR: &str = ".cg";
/// Name of the config file inside [`STATE_DIR`].
pub const CONFIG_FILE: &str = "governor.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Tenant recorded on decisions and denials unless a request overrides it.
    pub tenant_id: String,

    /// Path to the append-only ledger (JSON lines).
    pub ledger_path: PathBuf,

    /// Directory holding one JSON file per canon item.
    pub canon_dir: PathBuf,

    pub weights: OptrWeights,

    pub bounds: OptrBounds,

    /// A decision is denied if it raises another agent's expected TTV by more
    /// than this. Zero means any increase at all.
    pub non_interference_tolerance: f64,

    /// How many times a decision is re-evaluated when canon or baselines
    /// changed before it could commit.
    pub max_commit_retries: u32,

    /// Candidate count at which scoring moves onto scoped threads.
    pub parallel_scoring_threshold: usize,

    /// Features for candidates that arrive without them.
    pub features: TableFeatureModel,

    /// Agents registered at startup, with their baseline TTVs.
    pub agents: Vec<AgentContext>,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        let state_dir = PathBuf::from(STATE_DIR);
        Self {
            tenant_id: "default".to_string(),
            ledger_path: state_dir.join("ledger.jsonl"),
            canon_dir: state_dir.join("canon"),
            weights: OptrWeights::default(),
            bounds: OptrBounds::default(),
            non_interference_tolerance: 0.0,
            max_commit_retries: 3,
            parallel_scoring_threshold: cg_policy::optr::DEFAULT_PARALLEL_THRESHOLD,
            features: TableFeatureModel::default(),
            agents: Vec::new(),
        }
    }
}

impl GovernorConfig {
    /// Create a config with the standard `.cg/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let mut config = Self::default();
        config.rebase(project_root.as_ref());
        config
    }

    /// Load `<root>/.cg/governor.toml` if present, else the project defaults.
    ///
    /// Relative paths in the file are resolved against `project_root`.
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self, GovernorError> {
        let root = project_root.as_ref();
        let path = Self::config_path(root);
        if !path.exists() {
            return Ok(Self::for_project(root));
        }
        let content = std::fs::read_to_string(&path).map_err(|source| GovernorError::ConfigRead {
            path: path.clone(),
            source,
        })?;
        let mut config: Self =
            toml::from_str(&content).map_err(|source| GovernorError::ConfigParse {
                path: path.clone(),
                source,
            })?;
        config.validate().map_err(|reason| GovernorError::ConfigInvalid {
            path: path.clone(),
            reason,
        })?;
        config.rebase(root);
        tracing::debug!(path = %path.display(), "loaded governor config");
        Ok(config)
    }

    pub fn config_path(project_root: impl AsRef<Path>) -> PathBuf {
        project_root.as_ref().join(STATE_DIR).join(CONFIG_FILE)
    }

    fn validate(&self) -> Result<(), String> {
        let tolerance = self.non_interference_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(format!(
                "non_interference_tolerance must be finite and >= 0, got {tolerance}"
            ));
        }
        Ok(())
    }

    fn rebase(&mut self, root: &Path) {
        if self.ledger_path.is_relative() {
            self.ledger_path = root.join(&self.ledger_path);
        }
        if self.canon_dir.is_relative() {
            self.canon_dir = root.join(&self.canon_dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn for_project_uses_state_dir() {
        let config = GovernorConfig::for_project("/work/proj");
        assert_eq!(config.ledger_path, PathBuf::from("/work/proj/.cg/ledger.jsonl"));
        assert_eq!(config.canon_dir, PathBuf::from("/work/proj/.cg/canon"));
        assert_eq!(config.max_commit_retries, 3);
        assert_eq!(config.non_interference_tolerance, 0.0);
        assert_eq!(config.weights, OptrWeights::default());
    }

    #[test]
    fn load_without_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let config = GovernorConfig::load(dir.path()).unwrap();
        assert_eq!(config, GovernorConfig::for_project(dir.path()));
    }

    #[test]
    fn load_overlays_toml_and_rebases_paths() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(STATE_DIR)).unwrap();
        std::fs::write(
            GovernorConfig::config_path(dir.path()),
            r#"
tenant_id = "acme"
ledger_path = "audit/ledger.jsonl"
non_interference_tolerance = 2.5

[bounds]
max_risk = 0.5

[[agents]]
agent_id = "billing"
ttv_baseline = 120.0
depends_on_resources = ["db"]
"#,
        )
        .unwrap();

        let config = GovernorConfig::load(dir.path()).unwrap();
        assert_eq!(config.tenant_id, "acme");
        assert_eq!(config.ledger_path, dir.path().join("audit/ledger.jsonl"));
        assert_eq!(config.canon_dir, dir.path().join(".cg/canon"));
        assert_eq!(config.bounds.max_risk, Some(0.5));
        assert_eq!(config.bounds.max_cost, None);
        assert_eq!(config.non_interference_tolerance, 2.5);
        assert_eq!(config.agents.len(), 1);
        assert_eq!(config.agents[0].depends_on_resources, vec!["db"]);
        assert_eq!(config.max_commit_retries, 3);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(STATE_DIR)).unwrap();
        std::fs::write(GovernorConfig::config_path(dir.path()), "tenant_id = [").unwrap();
        let err = GovernorConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, GovernorError::ConfigParse { .. }));
    }

    #[test]
    fn tolerance_must_be_finite_and_non_negative() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(STATE_DIR)).unwrap();
        for value in ["nan", "inf", "-0.5"] {
            std::fs::write(
                GovernorConfig::config_path(dir.path()),
                format!("non_interference_tolerance = {value}\n"),
            )
            .unwrap();
            let err = GovernorConfig::load(dir.path()).unwrap_err();
            assert!(
                matches!(err, GovernorError::ConfigInvalid { ref reason, .. }
                    if reason.contains("non_interference_tolerance")),
                "{value}: {err}"
            );
        }
    }
}
