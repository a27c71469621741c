//! Command-line front end (A4): `clap`-derived subcommands adapting the
//! external tool surface (C11) to argv.
//!
//! A global flags struct, a `Commands` enum dispatched from `main.rs`, and
//! one module per command under [`commands`], covering the knowledge-base
//! engine's create/get/update/delete/search surface.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output rendering mode, selected by `--format` or implied by `--json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(name = "kb", version, about = "A dual-storage knowledge-base engine for coding agents and CLIs.")]
pub struct Cli {
    /// Data root directory (overrides `KB_DATA_DIR`).
    #[arg(long, global = true, env = "KB_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Index (SQLite) file path or `file:` URL (overrides `KB_DATABASE_URL`).
    #[arg(long, global = true, env = "KB_DATABASE_URL")]
    pub database_url: Option<PathBuf>,

    /// Actor name recorded on audit events (overrides `KB_ACTOR`).
    #[arg(long, global = true, env = "KB_ACTOR")]
    pub actor: Option<String>,

    /// Emit a single JSON object/array instead of table output.
    #[arg(long, global = true)]
    pub json: bool,

    /// Explicit output format. `--json` is shorthand for `--format json`.
    #[arg(long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    /// Print only the bare id on mutating commands.
    #[arg(long, global = true)]
    pub silent: bool,

    /// Preview a mutation without writing anything.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase log verbosity (`-v`, `-vv`).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all non-error log output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Initialize the data root and index.
    Init {
        /// Re-initialize even if already present.
        #[arg(long)]
        force: bool,
    },
    /// Print the engine version.
    Version,
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Create a new item (C6.1).
    Create(CreateArgs),
    /// Fetch a single item by reference or `type id` (C6.2).
    Get {
        /// `type-id` reference, or the item type if `id` is given separately.
        reference: String,
        /// Id, when `reference` is a bare type.
        id: Option<String>,
    },
    /// Apply a partial update to an item (C6.3).
    Update(UpdateArgs),
    /// Delete an item (C6.4).
    Delete {
        reference: String,
        id: Option<String>,
    },
    /// List items of a type (C6.5).
    List {
        item_type: String,
        /// Include items whose status is closed.
        #[arg(long)]
        all: bool,
        /// Restrict to these status names (repeatable).
        #[arg(long = "status")]
        statuses: Vec<String>,
    },
    /// Move an item to a different type sharing the same base kind (C6.7).
    ChangeType {
        reference: String,
        to_type: String,
    },

    /// Full-text search (C9).
    Search {
        query: String,
        #[arg(long = "type")]
        types: Vec<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Prefix suggestions over the rightmost search term (C9).
    Suggest {
        prefix: String,
        #[arg(long = "type")]
        types: Vec<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Count search hits without returning them (C9).
    Count {
        query: String,
        #[arg(long = "type")]
        types: Vec<String>,
    },

    /// Relationship graph operations (C7).
    Related {
        reference: String,
        #[arg(long, default_value_t = 1)]
        depth: u32,
    },
    /// Add bidirectional relations from `source` to each target.
    Relate {
        source: String,
        targets: Vec<String>,
    },

    /// Dynamic type registry (C5).
    Type {
        #[command(subcommand)]
        command: TypeCommands,
    },
    /// Tag registry (C4).
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Workflow status registry (C3, read-only at the tool surface).
    Status,

    /// Singleton current-state record.
    State {
        #[command(subcommand)]
        command: StateCommands,
    },

    /// Aggregate counts across items, statuses, tags, and types.
    Stats,
    /// Rescan the data root and rebuild the index from scratch (C10).
    Rebuild,
}

#[derive(Debug, Clone, clap::Args)]
pub struct CreateArgs {
    pub item_type: String,
    #[arg(long)]
    pub title: String,
    /// Caller-chosen id. Honored only for `sessions`; required (a date) for `dailies`.
    #[arg(long)]
    pub id: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub content: Option<String>,
    #[arg(long, value_enum)]
    pub priority: Option<PriorityArg>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    #[arg(long)]
    pub start_date: Option<String>,
    #[arg(long)]
    pub end_date: Option<String>,
    #[arg(long)]
    pub start_time: Option<String>,
    #[arg(long = "related")]
    pub related: Vec<String>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct UpdateArgs {
    pub reference: String,
    pub id: Option<String>,
    #[arg(long)]
    pub title: Option<String>,
    /// Pass an empty string to clear the field.
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub content: Option<String>,
    #[arg(long, value_enum)]
    pub priority: Option<PriorityArg>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub start_date: Option<String>,
    #[arg(long)]
    pub end_date: Option<String>,
    #[arg(long)]
    pub start_time: Option<String>,
    /// Replaces the full tag set when given (repeatable).
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Replaces the full related list when given (repeatable).
    #[arg(long = "related")]
    pub related: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    High,
    Medium,
    Low,
}

impl From<PriorityArg> for crate::model::Priority {
    fn from(p: PriorityArg) -> Self {
        match p {
            PriorityArg::High => Self::High,
            PriorityArg::Medium => Self::Medium,
            PriorityArg::Low => Self::Low,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum TypeCommands {
    List,
    Create {
        name: String,
        #[arg(long, value_enum)]
        base: BaseTypeArg,
        #[arg(long, default_value = "")]
        description: String,
    },
    UpdateDescription {
        name: String,
        description: String,
    },
    Delete {
        name: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BaseTypeArg {
    Tasks,
    Documents,
    Sessions,
}

impl From<BaseTypeArg> for crate::model::BaseType {
    fn from(b: BaseTypeArg) -> Self {
        match b {
            BaseTypeArg::Tasks => Self::Tasks,
            BaseTypeArg::Documents => Self::Documents,
            BaseTypeArg::Sessions => Self::Sessions,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum TagCommands {
    List,
    Search {
        pattern: String,
    },
    Delete {
        name: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum StateCommands {
    Get,
    Update {
        content: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Raw JSON object merged in as `metadata`.
        #[arg(long)]
        metadata: Option<String>,
    },
}
