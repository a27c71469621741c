//! `kb delete` — C6.4.

use crate::cli::Cli;
use crate::error::Result;

/// # Errors
///
/// Propagates any error from [`crate::store::Engine::delete`].
pub fn execute(cli: &Cli, reference: &str, id: Option<String>) -> Result<()> {
    let (item_type, id) = super::split_reference(reference, id)?;

    if crate::is_dry_run() {
        println!("would delete {item_type}-{id}");
        return Ok(());
    }

    let mut engine = super::open_engine(cli)?;
    let removed = engine.delete(&item_type, &id)?;

    if crate::is_silent() {
        println!("{item_type}-{id}");
        return Ok(());
    }
    match super::effective_format(cli) {
        crate::cli::OutputFormat::Json => {
            println!("{}", serde_json::json!({"type": item_type, "id": id, "removed": removed}));
        }
        _ => {
            if removed {
                println!("Deleted {item_type}-{id}");
            } else {
                println!("{item_type}-{id} had no file on disk; index entry removed");
            }
        }
    }
    Ok(())
}
