//! `kb state` — the singleton current-state record.

use crate::cli::{Cli, StateCommands};
use crate::error::{Error, Result};

/// # Errors
///
/// Propagates any error from the underlying current-state operation, or
/// `InvalidArgument` if `--metadata` is not valid JSON.
pub fn execute(cli: &Cli, command: StateCommands) -> Result<()> {
    match command {
        StateCommands::Get => {
            let engine = super::open_engine(cli)?;
            render(cli, &engine.get_current_state()?)
        }
        StateCommands::Update { content, tags, metadata } => {
            let metadata = match metadata {
                Some(raw) => serde_json::from_str(&raw)
                    .map_err(|e| Error::InvalidArgument(format!("--metadata is not valid JSON: {e}")))?,
                None => serde_json::json!({}),
            };
            let mut engine = super::open_engine(cli)?;
            render(cli, &engine.update_current_state(&content, &tags, &metadata)?)
        }
    }
}

fn render(cli: &Cli, state: &crate::model::CurrentState) -> Result<()> {
    match super::effective_format(cli) {
        crate::cli::OutputFormat::Json => println!("{}", serde_json::to_string(state)?),
        _ => {
            println!("version:   {}", state.version);
            println!("active:    {}", state.is_active);
            println!("tags:      {}", state.tags.join(", "));
            println!("created_at:{}", state.created_at.to_rfc3339());
            println!();
            println!("{}", state.content);
        }
    }
    Ok(())
}
