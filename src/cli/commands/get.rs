//! `kb get` — C6.2.

use crate::cli::Cli;
use crate::error::Result;

/// # Errors
///
/// `NotFound` if no such item exists, or a parse/IO error from the engine.
pub fn execute(cli: &Cli, reference: &str, id: Option<String>) -> Result<()> {
    let (item_type, id) = super::split_reference(reference, id)?;
    let engine = super::open_engine(cli)?;
    let item = engine.get(&item_type, &id)?;
    super::print_item(super::effective_format(cli), &item)
}
