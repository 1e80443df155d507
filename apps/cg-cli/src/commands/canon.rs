// canon.rs — Canon subcommands: import, promote, show, list.

use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use cg_canon::{CanonStore, PromotionRequest};
use cg_governor::{Governor, GovernorConfig};
use cg_types::{CanonItem, CanonLevel, ExecutionMode, PromotionTests};
use serde::Deserialize;

#[derive(Subcommand)]
pub enum CanonCommands {
    /// Import EVIDENCE or PROPOSED items from a JSON file (one item or a list).
    Import {
        file: PathBuf,
        /// Validate without writing anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Run an item through the four-test promotion gate.
    Promote {
        item_id: String,
        /// Level the item is expected to be at (defaults to its current level).
        #[arg(long, value_parser = parse_level)]
        from: Option<CanonLevel>,
        /// The claim survived adversarial challenge.
        #[arg(long)]
        resistance: bool,
        /// The claim reproduces from its evidence.
        #[arg(long)]
        reproducible: bool,
        /// Promoting it breaks no existing invariant.
        #[arg(long)]
        invariant_safe: bool,
        /// It measurably affects feasibility or time-to-value.
        #[arg(long)]
        feasibility_impact: bool,
        /// Evidence reference backing the tests (repeatable).
        #[arg(long = "evidence")]
        evidence_refs: Vec<String>,
    },
    /// Show one item as JSON.
    Show { item_id: String },
    /// List items, optionally at one level.
    List {
        #[arg(long, value_parser = parse_level)]
        level: Option<CanonLevel>,
    },
}

fn parse_level(value: &str) -> Result<CanonLevel, String> {
    serde_json::from_value(serde_json::Value::String(value.to_uppercase()))
        .map_err(|_| format!("unknown canon level '{}' (EVIDENCE, PROPOSED, CANON)", value))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportFile {
    Many(Vec<CanonItem>),
    One(Box<CanonItem>),
}

pub fn execute(cmd: &CanonCommands, config: &GovernorConfig) -> anyhow::Result<()> {
    match cmd {
        CanonCommands::Import { file, dry_run } => {
            let items = match super::read_json::<ImportFile>(file)? {
                ImportFile::Many(items) => items,
                ImportFile::One(item) => vec![*item],
            };
            let governor = Governor::open(config.clone())?;
            let mode = if *dry_run {
                ExecutionMode::Replay
            } else {
                ExecutionMode::Live
            };
            let record = governor.import_canon(mode, items)?;
            let verb = if *dry_run { "Would import" } else { "Imported" };
            println!("{} {} item(s):", verb, record.item_ids.len());
            for id in &record.item_ids {
                println!("  {}", id);
            }
        }

        CanonCommands::Promote {
            item_id,
            from,
            resistance,
            reproducible,
            invariant_safe,
            feasibility_impact,
            evidence_refs,
        } => {
            let governor = Governor::open(config.clone())?;
            let from = match from {
                Some(level) => *level,
                None => {
                    governor
                        .canon()
                        .try_get(item_id)?
                        .with_context(|| format!("canon item not found: {}", item_id))?
                        .level
                }
            };
            let tests = PromotionTests {
                resistance: *resistance,
                reproducible: *reproducible,
                invariant_safe: *invariant_safe,
                feasibility_impact: *feasibility_impact,
                evidence_refs: evidence_refs.clone(),
            };
            let decision = governor.promote(
                ExecutionMode::Live,
                PromotionRequest::new(item_id.clone(), from, tests),
            )?;
            if decision.approved {
                println!("Promoted {}: {} -> {}", decision.item_id, decision.from, decision.to);
            } else {
                println!("Not promoted {}: stays {}", decision.item_id, decision.to);
                println!("  {}", decision.reason);
            }
        }

        CanonCommands::Show { item_id } => {
            let store = CanonStore::open(&config.canon_dir)?;
            let item = store
                .try_get(item_id)?
                .with_context(|| format!("canon item not found: {}", item_id))?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }

        CanonCommands::List { level } => {
            let store = CanonStore::open(&config.canon_dir)?;
            let items = match level {
                Some(level) => store.list_by_level(*level)?,
                None => store.list()?,
            };
            if items.is_empty() {
                println!("No canon items.");
                return Ok(());
            }
            println!("{:<28} {:<10} {:<12} TITLE", "ID", "LEVEL", "KIND");
            println!("{}", "-".repeat(72));
            for item in &items {
                println!(
                    "{:<28} {:<10} {:<12} {}",
                    item.id,
                    item.level.to_string(),
                    item.kind.name(),
                    item.title
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_is_case_insensitive() {
        assert_eq!(parse_level("evidence").unwrap(), CanonLevel::Evidence);
        assert_eq!(parse_level("CANON").unwrap(), CanonLevel::Canon);
        assert!(parse_level("gospel").is_err());
    }
}
