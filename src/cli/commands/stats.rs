//! `kb stats` — aggregate counts across items, statuses, tags, and types.

use crate::cli::Cli;
use crate::error::Result;

/// # Errors
///
/// Returns an error if any underlying count query fails.
pub fn execute(cli: &Cli) -> Result<()> {
    let engine = super::open_engine(cli)?;
    let stats = engine.get_stats()?;
    match super::effective_format(cli) {
        crate::cli::OutputFormat::Json => println!("{}", serde_json::to_string(&stats)?),
        _ => {
            println!("items:    {}", stats.items);
            println!("statuses: {}", stats.statuses);
            println!("tags:     {}", stats.tags);
            println!("types:    {}", stats.types);
        }
    }
    Ok(())
}
