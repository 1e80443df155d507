//! # cg-governor
//!
//! The decision pipeline that ties canon, policy and the ledger together.
//!
//! A [`Governor`] owns one ledger, one canon store and the registry of agent
//! baselines. [`Governor::decide`] runs an intent through the authority
//! boundary and the invariant registry, lets OPTR choose among the candidate
//! paths, and ledgers every denial trace together with the decision before
//! returning. Canon changes go through [`Governor::import_canon`] and
//! [`Governor::promote`]; finished sessions through
//! [`Governor::complete_session`].
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use cg_governor::{DecisionRequest, Governor, GovernorConfig};
//! use cg_types::{Action, ExecutionMode, RiskLevel};
//!
//! let config = GovernorConfig::load(".").unwrap();
//! let governor = Governor::open(config).unwrap();
//! let request = DecisionRequest::new("ops", Action::new("restart", "Restart", RiskLevel::Low))
//!     .with_canon_refs(["DEF_OPS"]);
//! let response = governor.decide(ExecutionMode::Live, request).unwrap();
//! println!("{} ({} traces)", response.decision, response.why_not_traces.len());
//! ```

pub mod baseline;
pub mod config;
pub mod error;
pub mod governor;
pub mod request;

pub use baseline::{BaselineCommit, BaselineRegistry, BaselineSnapshot};
pub use config::GovernorConfig;
pub use error::GovernorError;
pub use governor::Governor;
pub use request::{DecisionRequest, DecisionResponse};
