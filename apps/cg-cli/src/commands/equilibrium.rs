// equilibrium.rs — Pairwise interference check over agents' plans.

use std::path::Path;

use cg_policy::{check_multi_agent_equilibrium, PlannedAgent};

pub fn execute(plan: &Path) -> anyhow::Result<()> {
    let agents: Vec<PlannedAgent> = super::read_json(plan)?;
    let report = check_multi_agent_equilibrium(&agents);

    if report.equilibrium {
        println!("Equilibrium: no agent's plan slows another ({} agents).", agents.len());
        return Ok(());
    }

    println!("{:<16} {:<16} {:<20} {:>10}", "ACTOR", "AFFECTED", "ACTION", "ΔTTV");
    println!("{}", "-".repeat(66));
    for conflict in &report.conflicts {
        println!(
            "{:<16} {:<16} {:<20} {:>10.1}",
            conflict.actor, conflict.affected, conflict.action_id, conflict.delta_ttv
        );
    }
    anyhow::bail!("{} interference conflict(s) found", report.conflicts.len())
}
