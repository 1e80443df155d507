// session.rs — Session subcommands: complete.

use clap::Subcommand;
use cg_governor::{Governor, GovernorConfig};
use cg_types::{ExecutionMode, Provenance, ProvenanceSource};

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Ledger that an agent session finished.
    Complete {
        /// Agent whose session ended.
        #[arg(long)]
        agent: String,
        /// Free-form outcome, e.g. "goal met".
        #[arg(long)]
        outcome: String,
        /// Provenance reference (chat thread, PR, run id).
        #[arg(long)]
        reference: String,
        /// Who closed the session.
        #[arg(long)]
        author: Option<String>,
    },
}

pub fn execute(cmd: &SessionCommands, config: &GovernorConfig) -> anyhow::Result<()> {
    match cmd {
        SessionCommands::Complete {
            agent,
            outcome,
            reference,
            author,
        } => {
            let governor = Governor::open(config.clone())?;
            let mut provenance = Provenance::new(ProvenanceSource::Chat, reference.clone());
            provenance.author = author.clone();
            let completion = governor.complete_session(
                ExecutionMode::Live,
                agent.clone(),
                outcome.clone(),
                provenance,
            )?;
            println!("Session {} completed for {}.", completion.session_id, completion.agent_id);
        }
    }
    Ok(())
}
