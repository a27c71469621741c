//! `kb status` — C3. Read-only at the tool surface: the status registry is
//! seeded once at `Engine::open` and not mutated through the CLI.

use crate::cli::Cli;
use crate::error::Result;

/// # Errors
///
/// Returns an error if the registry query fails.
pub fn execute(cli: &Cli) -> Result<()> {
    let engine = super::open_engine(cli)?;
    let statuses = engine.list_statuses()?;
    let headers = ["id", "name", "closed"];
    let rows: Vec<Vec<String>> = statuses
        .iter()
        .map(|s| vec![s.id.to_string(), s.name.clone(), s.is_closed.to_string()])
        .collect();
    super::render_rows(super::effective_format(cli), &headers, &rows, &statuses)
}
