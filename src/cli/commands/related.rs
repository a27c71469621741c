//! `kb related` / `kb relate` — C7.

use crate::cli::Cli;
use crate::error::Result;

/// # Errors
///
/// Propagates any error from [`crate::store::Engine::get_related`].
pub fn related(cli: &Cli, reference: &str, depth: u32) -> Result<()> {
    let (item_type, id) = super::split_reference(reference, None)?;
    let engine = super::open_engine(cli)?;
    let related = engine.get_related(&item_type, &id, depth)?;

    let headers = ["type", "id", "hop"];
    let rows: Vec<Vec<String>> = related
        .iter()
        .map(|r| vec![r.item_type.clone(), r.id.clone(), r.hop.to_string()])
        .collect();
    super::render_rows(super::effective_format(cli), &headers, &rows, &related)
}

/// # Errors
///
/// `SelfReference`/`UnknownReference` from [`crate::store::Engine::add_relations`].
pub fn relate(cli: &Cli, source: &str, targets: Vec<String>) -> Result<()> {
    if crate::is_dry_run() {
        println!("would relate {source} to {}", targets.join(", "));
        return Ok(());
    }
    let mut engine = super::open_engine(cli)?;
    let item = engine.add_relations(source, &targets)?;
    super::print_item(super::effective_format(cli), &item)
}
