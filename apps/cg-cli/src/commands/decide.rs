// decide.rs — Run a decision request through the governor.

use std::path::Path;

use cg_governor::{DecisionRequest, DecisionResponse, Governor, GovernorConfig};
use cg_types::ExecutionMode;

pub fn execute(
    config: &GovernorConfig,
    request_path: &Path,
    replay: bool,
    json: bool,
) -> anyhow::Result<()> {
    let request: DecisionRequest = super::read_json(request_path)?;
    let governor = Governor::open(config.clone())?;
    let mode = if replay {
        ExecutionMode::Replay
    } else {
        ExecutionMode::Live
    };
    let response = governor.decide(mode, request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response, mode);
    }
    Ok(())
}

fn print_response(response: &DecisionResponse, mode: ExecutionMode) {
    println!("Request:   {}", response.request_id);
    println!("Decision:  {}", response.decision);
    if let Some(path) = &response.selected_path_id {
        println!(
            "Selected:  {} (next action: {})",
            path,
            response.selected_next_action_id.as_deref().unwrap_or("-")
        );
    }
    match response.ledger_sequence {
        Some(seq) => println!("Ledgered:  #{}", seq),
        None => println!("Ledgered:  no ({} mode)", mode),
    }

    if !response.candidates.is_empty() {
        println!();
        println!("{:<24} {:<20} {:>14} ADMISSIBLE", "PATH", "NEXT ACTION", "TOTAL");
        println!("{}", "-".repeat(72));
        for candidate in &response.candidates {
            println!(
                "{:<24} {:<20} {:>14} {}",
                candidate.path_id,
                candidate.next_action_id.as_deref().unwrap_or("-"),
                candidate
                    .total
                    .map(|t| format!("{:.3}", t))
                    .unwrap_or_else(|| "inf".to_string()),
                if candidate.admissible { "yes" } else { "no" },
            );
        }
    }

    if !response.why_not_traces.is_empty() {
        println!();
        println!("Why not:");
        for trace in &response.why_not_traces {
            super::whynot::print_trace(trace);
        }
    }
}
