//! Initialize the data root and index.
//!
//! This engine has a single data root: `kb init` creates it (and the index
//! file inside it) eagerly, so a first `create`/`list` call never pays for
//! it implicitly.

use std::fs;

use crate::cli::{Cli, OutputFormat};
use crate::error::{Error, Result};

#[derive(serde::Serialize)]
struct InitOutput {
    data_dir: std::path::PathBuf,
    database: std::path::PathBuf,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if the index already exists and `force` is
/// not set, or an I/O error if the directory cannot be created.
pub fn execute(cli: &Cli, force: bool) -> Result<()> {
    let data_root = crate::config::resolve_data_dir(cli.data_dir.as_deref())
        .ok_or_else(|| Error::Config("could not determine data directory; set KB_DATA_DIR".to_string()))?;
    let db_path = crate::config::resolve_database_path(cli.database_url.as_deref(), &data_root);

    if db_path.exists() && !force {
        return Err(Error::AlreadyInitialized { path: db_path });
    }

    fs::create_dir_all(&data_root).map_err(|e| Error::io(&data_root, e))?;
    let actor = cli.actor.clone().unwrap_or_else(crate::config::default_actor);
    // Opening the engine applies the schema and seeds the default registries.
    let _ = crate::store::Engine::open(data_root.clone(), &db_path, actor)?;

    let output = InitOutput { data_dir: data_root, database: db_path };
    match super::effective_format(cli) {
        OutputFormat::Json => println!("{}", serde_json::to_string(&output)?),
        OutputFormat::Table | OutputFormat::Csv => {
            println!("Initialized knowledge base");
            println!("  Data directory: {}", output.data_dir.display());
            println!("  Index:          {}", output.database.display());
        }
    }
    Ok(())
}
