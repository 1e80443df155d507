// whynot.rs — Query ledgered denial traces.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Args;
use cg_governor::GovernorConfig;
use cg_ledger::{Ledger, WhyNotFilter};
use cg_types::WhyNotTrace;

#[derive(Args)]
pub struct WhyNotArgs {
    /// Only traces for this action id.
    #[arg(long)]
    action: Option<String>,
    /// Only traces recorded for this tenant.
    #[arg(long)]
    tenant: Option<String>,
    /// Only traces at or after this RFC 3339 timestamp.
    #[arg(long)]
    since: Option<String>,
    /// Only traces at or before this RFC 3339 timestamp.
    #[arg(long)]
    until: Option<String>,
    /// Print traces as JSON lines.
    #[arg(long)]
    json: bool,
}

fn parse_time(value: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("invalid timestamp '{}'", value))?
        .with_timezone(&Utc))
}

pub fn execute(args: &WhyNotArgs, config: &GovernorConfig) -> anyhow::Result<()> {
    let path = &config.ledger_path;
    if !path.exists() {
        println!("No ledger found at {}", path.display());
        return Ok(());
    }

    let filter = WhyNotFilter {
        action_id: args.action.clone(),
        tenant_id: args.tenant.clone(),
        since: args.since.as_deref().map(parse_time).transpose()?,
        until: args.until.as_deref().map(parse_time).transpose()?,
    };
    let entries = Ledger::read_all(path)?;
    let traces = cg_ledger::query::whynot(&entries, &filter);

    if args.json {
        for trace in &traces {
            println!("{}", serde_json::to_string(trace)?);
        }
        return Ok(());
    }
    if traces.is_empty() {
        println!("No matching denials.");
        return Ok(());
    }
    for trace in &traces {
        print_trace(trace);
    }
    println!();
    println!("{} denial(s).", traces.len());
    Ok(())
}

pub fn print_trace(trace: &WhyNotTrace) {
    let codes: Vec<&str> = trace.reason_codes.iter().map(|c| c.as_str()).collect();
    println!(
        "  {} {}{} [{}]",
        trace.timestamp.format("%Y-%m-%d %H:%M:%S"),
        trace.action_id,
        trace
            .path_id
            .as_ref()
            .map(|p| format!(" via {}", p))
            .unwrap_or_default(),
        codes.join(", ")
    );
    println!("    {}", trace.message);
    if !trace.missing_canon_ids.is_empty() {
        println!("    missing canon: {}", trace.missing_canon_ids.join(", "));
    }
    if !trace.violated_invariant_ids.is_empty() {
        println!("    invariants:    {}", trace.violated_invariant_ids.join(", "));
    }
}
