//! `kb tag` — C4.

use crate::cli::{Cli, TagCommands};
use crate::error::Result;
use crate::model::TagWithCount;

/// # Errors
///
/// Propagates any error from the underlying tag-registry operation.
pub fn execute(cli: &Cli, command: TagCommands) -> Result<()> {
    match command {
        TagCommands::List => {
            let engine = super::open_engine(cli)?;
            render(cli, &engine.list_tags()?)
        }
        TagCommands::Search { pattern } => {
            let engine = super::open_engine(cli)?;
            render(cli, &engine.search_tags(&pattern)?)
        }
        TagCommands::Delete { name } => {
            let mut engine = super::open_engine(cli)?;
            let removed = engine.delete_tag(&name)?;
            if removed {
                println!("Deleted tag {name}");
            } else {
                println!("No such tag: {name}");
            }
            Ok(())
        }
    }
}

fn render(cli: &Cli, tags: &[TagWithCount]) -> Result<()> {
    let headers = ["name", "count"];
    let rows: Vec<Vec<String>> = tags.iter().map(|t| vec![t.name.clone(), t.count.to_string()]).collect();
    super::render_rows(super::effective_format(cli), &headers, &rows, &tags)
}
