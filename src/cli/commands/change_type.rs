//! `kb change-type` — C6.7.

use crate::cli::Cli;
use crate::error::Result;

/// # Errors
///
/// Propagates any error from [`crate::store::Engine::change_item_type`].
pub fn execute(cli: &Cli, reference: &str, to_type: &str) -> Result<()> {
    let (from_type, from_id) = super::split_reference(reference, None)?;

    if crate::is_dry_run() {
        println!("would move {from_type}-{from_id} to {to_type}");
        return Ok(());
    }

    let mut engine = super::open_engine(cli)?;
    let result = engine.change_item_type(&from_type, &from_id, to_type)?;

    if crate::is_silent() {
        println!("{to_type}-{}", result.new_id);
        return Ok(());
    }
    match super::effective_format(cli) {
        crate::cli::OutputFormat::Json => println!("{}", serde_json::to_string(&result)?),
        _ => {
            println!("Moved {from_type}-{from_id} to {to_type}-{}", result.new_id);
            println!("Rewrote {} inbound reference(s)", result.rewritten_references);
        }
    }
    Ok(())
}
