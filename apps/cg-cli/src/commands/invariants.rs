// invariants.rs — List the builtin invariant registry.

use cg_policy::InvariantId;

pub fn execute(json: bool) -> anyhow::Result<()> {
    if json {
        let items: Vec<_> = InvariantId::ALL.iter().map(|id| id.to_canon_item()).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    for id in InvariantId::ALL {
        println!("{}: {}", id, id.title());
        println!("  {}", id.statement());
        println!("  formal: {}", id.formal());
        println!();
    }
    Ok(())
}
