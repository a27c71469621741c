//! `kb type` — C5.

use crate::cli::{Cli, TypeCommands};
use crate::error::Result;

/// # Errors
///
/// Propagates any error from the underlying type-registry operation.
pub fn execute(cli: &Cli, command: TypeCommands) -> Result<()> {
    match command {
        TypeCommands::List => list(cli),
        TypeCommands::Create { name, base, description } => create(cli, &name, base.into(), &description),
        TypeCommands::UpdateDescription { name, description } => update_description(cli, &name, &description),
        TypeCommands::Delete { name } => delete(cli, &name),
    }
}

fn list(cli: &Cli) -> Result<()> {
    let engine = super::open_engine(cli)?;
    let types = engine.list_types()?;
    let headers = ["type", "base", "description", "sequence"];
    let rows: Vec<Vec<String>> = types
        .iter()
        .map(|t| vec![t.type_name.clone(), t.base_type.as_str().to_string(), t.description.clone(), t.sequence.to_string()])
        .collect();
    super::render_rows(super::effective_format(cli), &headers, &rows, &types)
}

fn create(cli: &Cli, name: &str, base: crate::model::BaseType, description: &str) -> Result<()> {
    if crate::is_dry_run() {
        println!("would create type {name} ({})", base.as_str());
        return Ok(());
    }
    let mut engine = super::open_engine(cli)?;
    engine.create_type(name, base, description)?;
    println!("Created type {name}");
    Ok(())
}

fn update_description(cli: &Cli, name: &str, description: &str) -> Result<()> {
    let mut engine = super::open_engine(cli)?;
    engine.update_type_description(name, description)?;
    println!("Updated description for {name}");
    Ok(())
}

fn delete(cli: &Cli, name: &str) -> Result<()> {
    if crate::is_dry_run() {
        println!("would delete type {name}");
        return Ok(());
    }
    let mut engine = super::open_engine(cli)?;
    engine.delete_type(name)?;
    println!("Deleted type {name}");
    Ok(())
}
