//! `kb search` / `kb suggest` / `kb count` — C9.

use crate::cli::Cli;
use crate::error::Result;

/// # Errors
///
/// `InvalidQuery` if the query cannot be parsed.
pub fn search(cli: &Cli, query: &str, types: Vec<String>, limit: usize, offset: usize) -> Result<()> {
    let engine = super::open_engine(cli)?;
    let types = (!types.is_empty()).then_some(types);
    let hits = engine.search(query, types.as_deref(), limit, offset)?;
    render_hits(cli, &hits)
}

/// # Errors
///
/// `InvalidQuery` if the prefix cannot be parsed.
pub fn suggest(cli: &Cli, prefix: &str, types: Vec<String>, limit: usize) -> Result<()> {
    let engine = super::open_engine(cli)?;
    let types = (!types.is_empty()).then_some(types);
    let hits = engine.suggest(prefix, types.as_deref(), limit)?;
    render_hits(cli, &hits)
}

/// # Errors
///
/// `InvalidQuery` if the query cannot be parsed.
pub fn count(cli: &Cli, query: &str, types: Vec<String>) -> Result<()> {
    let engine = super::open_engine(cli)?;
    let types = (!types.is_empty()).then_some(types);
    let n = engine.count(query, types.as_deref())?;
    match super::effective_format(cli) {
        crate::cli::OutputFormat::Json => println!("{}", serde_json::json!({"count": n})),
        _ => println!("{n}"),
    }
    Ok(())
}

fn render_hits(cli: &Cli, hits: &[crate::search::SearchHit]) -> Result<()> {
    let headers = ["type", "id", "title", "rank", "snippet"];
    let rows: Vec<Vec<String>> = hits
        .iter()
        .map(|h| {
            vec![
                h.item_type.clone(),
                h.id.clone(),
                h.title.clone(),
                format!("{:.4}", h.rank),
                h.snippet.clone(),
            ]
        })
        .collect();
    super::render_rows(super::effective_format(cli), &headers, &rows, &hits)
}
