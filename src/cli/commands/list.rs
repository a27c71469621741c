//! `kb list` — C6.5.

use crate::cli::Cli;
use crate::error::Result;

/// # Errors
///
/// Propagates any error from [`crate::store::Engine::list`].
pub fn execute(cli: &Cli, item_type: &str, all: bool, statuses: Vec<String>) -> Result<()> {
    let engine = super::open_engine(cli)?;
    let statuses = (!statuses.is_empty()).then_some(statuses);
    let items = engine.list(item_type, all, statuses.as_deref())?;

    let headers = ["type", "id", "title", "status", "priority", "tags", "updated_at"];
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|s| {
            vec![
                s.item_type.clone(),
                s.id.clone(),
                s.title.clone(),
                s.status_name.clone(),
                s.priority.as_str().to_string(),
                s.tags.iter().cloned().collect::<Vec<_>>().join(";"),
                s.updated_at.to_rfc3339(),
            ]
        })
        .collect();

    super::render_rows(super::effective_format(cli), &headers, &rows, &items)
}
