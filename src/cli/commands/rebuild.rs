//! `kb rebuild` — C10. Never prints from inside the engine itself (the
//! rebuild scan reports only via `tracing`); this command prints the
//! summary report once the scan returns.

use crate::cli::Cli;
use crate::error::Result;

/// # Errors
///
/// Returns an error if the filesystem scan or index writes fail.
pub fn execute(cli: &Cli) -> Result<()> {
    let mut engine = super::open_engine(cli)?;
    let report = engine.rebuild_index()?;
    match super::effective_format(cli) {
        crate::cli::OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
        _ => {
            println!("items_indexed:    {}", report.items_indexed);
            println!("types_registered: {}", report.types_registered);
            println!("files_skipped:    {}", report.files_skipped);
        }
    }
    Ok(())
}
