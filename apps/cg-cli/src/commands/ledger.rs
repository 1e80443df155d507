// ledger.rs — Ledger subcommands: verify, tail.

use std::path::PathBuf;

use clap::Subcommand;
use cg_governor::GovernorConfig;
use cg_ledger::{Ledger, LedgerEntry, LedgerPayload};

#[derive(Subcommand)]
pub enum LedgerCommands {
    /// Verify the hash chain by recomputing every entry's hash.
    Verify {
        /// Path to the ledger (defaults to .cg/ledger.jsonl).
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the most recent entries.
    Tail {
        /// Path to the ledger (defaults to .cg/ledger.jsonl).
        #[arg(long)]
        path: Option<PathBuf>,
        /// Number of entries to show.
        #[arg(short, default_value = "10")]
        n: usize,
        /// Print full entries as JSON lines.
        #[arg(long)]
        json: bool,
    },
}

pub fn execute(cmd: &LedgerCommands, config: &GovernorConfig) -> anyhow::Result<()> {
    match cmd {
        LedgerCommands::Verify { path } => {
            let path = path.clone().unwrap_or_else(|| config.ledger_path.clone());
            if !path.exists() {
                println!("No ledger found at {}", path.display());
                return Ok(());
            }

            let report = Ledger::verify_file(&path)?;
            if report.valid {
                println!(
                    "Ledger verified: {} entr{}, hash chain intact.",
                    report.verified,
                    if report.verified == 1 { "y" } else { "ies" }
                );
            } else {
                let index = report
                    .broken_at_index
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "?".to_string());
                println!("INTEGRITY VIOLATION at entry {}:", index);
                println!("  {} entr(ies) verified before the break.", report.verified);
                println!("  Entries from index {} on are untrusted.", index);
                println!();
                println!("The ledger may have been tampered with.");
                anyhow::bail!("Ledger integrity check failed");
            }
        }

        LedgerCommands::Tail { path, n, json } => {
            let path = path.clone().unwrap_or_else(|| config.ledger_path.clone());
            if !path.exists() {
                println!("No ledger found at {}", path.display());
                return Ok(());
            }

            let entries = Ledger::read_all(&path)?;
            let start = entries.len().saturating_sub(*n);
            let recent = &entries[start..];

            if *json {
                for entry in recent {
                    println!("{}", serde_json::to_string(entry)?);
                }
                return Ok(());
            }
            if recent.is_empty() {
                println!("No ledger entries.");
                return Ok(());
            }

            println!("{:<6} {:<20} {:<19} SUMMARY", "SEQ", "TIMESTAMP", "KIND");
            println!("{}", "-".repeat(80));
            for entry in recent {
                println!(
                    "{:<6} {:<20} {:<19} {}",
                    entry.sequence_index,
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.payload.kind(),
                    summary(entry),
                );
            }
        }
    }

    Ok(())
}

fn summary(entry: &LedgerEntry) -> String {
    match &entry.payload {
        LedgerPayload::Decision(d) => format!(
            "{} {} by {} ({} denial(s))",
            d.decision, d.action_id, d.agent_id, d.denial_count
        ),
        LedgerPayload::Promotion(p) => format!(
            "{} {} -> {} ({})",
            p.item_id,
            p.from,
            p.to,
            if p.approved { "approved" } else { "rejected" }
        ),
        LedgerPayload::Denial(d) => format!("{}: {}", d.trace.action_id, d.trace.message),
        LedgerPayload::SessionCompletion(s) => format!("{} {}", s.agent_id, s.outcome),
        LedgerPayload::CanonImport(c) => c.item_ids.join(", "),
    }
}
