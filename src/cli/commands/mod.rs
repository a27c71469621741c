//! Command implementations, one module per subcommand group.

pub mod change_type;
pub mod completions;
pub mod create;
pub mod delete;
pub mod get;
pub mod init;
pub mod list;
pub mod rebuild;
pub mod related;
pub mod search;
pub mod state;
pub mod stats;
pub mod statuses;
pub mod tags;
pub mod types;
pub mod update;
pub mod version;

use colored::Colorize;
use serde::Serialize;

use crate::cli::{Cli, OutputFormat};
use crate::error::{Error, Result};
use crate::model::item::parse_reference;
use crate::model::Item;
use crate::store::Engine;

/// Resolve global flags into an effective output format. `--json` wins over
/// `--format` when both are given.
#[must_use]
pub fn effective_format(cli: &Cli) -> OutputFormat {
    if cli.json {
        return OutputFormat::Json;
    }
    cli.format.unwrap_or(OutputFormat::Table)
}

/// Open the engine using the CLI's resolved data root, index path, and actor.
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined or the
/// engine fails to open.
pub fn open_engine(cli: &Cli) -> Result<Engine> {
    let data_root = crate::config::resolve_data_dir(cli.data_dir.as_deref())
        .ok_or_else(|| Error::Config("could not determine data directory; set KB_DATA_DIR".to_string()))?;
    let db_path = crate::config::resolve_database_path(cli.database_url.as_deref(), &data_root);
    let actor = cli.actor.clone().unwrap_or_else(crate::config::default_actor);
    Engine::open(data_root, &db_path, actor)
}

/// Split a `reference`/optional-`id` pair into `(type, id)`. Accepts both
/// `kb get issues-7` and the friendlier `kb get issues 7`.
///
/// # Errors
///
/// Returns `InvalidArgument` if neither form parses.
pub fn split_reference(reference: &str, id: Option<String>) -> Result<(String, String)> {
    match id {
        Some(id) => Ok((reference.to_string(), id)),
        None => parse_reference(reference).ok_or_else(|| {
            Error::InvalidArgument(format!("expected `type-id` or `type id`, got `{reference}`"))
        }),
    }
}

/// Turn a CLI `Option<String>` into an `UpdatePatch`-style nullable field:
/// absent means "leave unchanged", an empty string means "clear", anything
/// else means "set".
#[must_use]
pub fn nullable(v: Option<String>) -> Option<Option<String>> {
    v.map(|s| if s.is_empty() { None } else { Some(s) })
}

/// Render a single item per the effective output format. Respects
/// `--silent` (prints only the reference) ahead of the format itself.
pub fn print_item(format: OutputFormat, item: &Item) -> Result<()> {
    if crate::is_silent() {
        println!("{}-{}", item.item_type, item.id);
        return Ok(());
    }
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(item)?),
        OutputFormat::Csv => render_csv(
            &["type", "id", "title", "status", "priority", "tags", "related", "created_at", "updated_at"],
            &[vec![
                item.item_type.clone(),
                item.id.clone(),
                item.title.clone(),
                item.status_name.clone(),
                item.priority.as_str().to_string(),
                item.tags.iter().cloned().collect::<Vec<_>>().join(";"),
                item.related.join(";"),
                item.created_at.to_rfc3339(),
                item.updated_at.to_rfc3339(),
            ]],
        ),
        OutputFormat::Table => {
            println!("{}: {}-{}", "reference".bold(), item.item_type, item.id);
            println!("{}: {}", "title".bold(), item.title);
            println!("{}: {}", "status".bold(), item.status_name);
            println!("{}: {}", "priority".bold(), item.priority.as_str());
            if let Some(desc) = &item.description {
                println!("{}: {desc}", "description".bold());
            }
            if !item.tags.is_empty() {
                println!("{}: {}", "tags".bold(), item.tags.iter().cloned().collect::<Vec<_>>().join(", "));
            }
            if !item.related.is_empty() {
                println!("{}: {}", "related".bold(), item.related.join(", "));
            }
            println!("{}: {}", "created_at".bold(), item.created_at.to_rfc3339());
            println!("{}: {}", "updated_at".bold(), item.updated_at.to_rfc3339());
            if let Some(content) = &item.content {
                println!();
                println!("{content}");
            }
        }
    }
    Ok(())
}

/// Render a list of rows per the effective output format: a JSON array in
/// JSON mode, an aligned text table in table mode, a header-plus-rows CSV
/// blob in CSV mode.
pub fn render_rows<T: Serialize>(
    format: OutputFormat,
    headers: &[&str],
    rows: &[Vec<String>],
    json_items: &T,
) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(json_items)?),
        OutputFormat::Table => render_table(headers, rows),
        OutputFormat::Csv => render_csv(headers, rows),
    }
    Ok(())
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        println!("(no results)");
        return;
    }
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }
    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:<width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_line.join("  ").bold());
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths.get(i).copied().unwrap_or(0)))
            .collect();
        println!("{}", line.join("  "));
    }
}

fn render_csv(headers: &[&str], rows: &[Vec<String>]) {
    println!("{}", headers.join(","));
    for row in rows {
        let escaped: Vec<String> = row.iter().map(|c| crate::csv_escape(c)).collect();
        println!("{}", escaped.join(","));
    }
}
