//! A dual-storage knowledge-base engine for coding agents and CLIs.
//!
//! Every item is a Markdown file with YAML front matter (the source of
//! truth) plus a SQLite index kept in sync for fast lookup, full-text
//! search, and the relationship graph.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (`Item`, `Status`, `Tag`, `TypeDefinition`, `CurrentState`)
//! - [`markdown`] - Front-matter/body codec (C1)
//! - [`path`] - Path resolution and id validation (C2)
//! - [`storage`] - SQLite index layer (C3/C4/C5/C8)
//! - [`store`] - The item store facade tying files to the index (C6/C7)
//! - [`search`] - Full-text search query language (C9)
//! - [`rebuild`] - Index reconstruction from disk (C10)
//! - [`enrich`] - Optional post-create enrichment hook
//! - [`config`] - Configuration management
//! - [`validate`] - Fuzzy-match helpers for error hints
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod enrich;
pub mod error;
pub mod markdown;
pub mod model;
pub mod path;
pub mod rebuild;
pub mod search;
pub mod store;
pub mod storage;
pub mod validate;

pub use error::{Error, Result};

/// Global silent mode flag for `--silent` output.
///
/// When set, create/mutate commands print only the id instead of full
/// output. Avoids threading a `silent` bool through every handler
/// signature.
pub static SILENT: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Global dry-run flag for `--dry-run`.
///
/// When set, mutate commands preview what would happen without writing.
pub static DRY_RUN: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Global CSV output flag (set when `--format csv`).
pub static CSV_OUTPUT: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Check if silent mode is active.
#[inline]
pub fn is_silent() -> bool {
    SILENT.load(std::sync::atomic::Ordering::Relaxed)
}

/// Check if dry-run mode is active.
#[inline]
pub fn is_dry_run() -> bool {
    DRY_RUN.load(std::sync::atomic::Ordering::Relaxed)
}

/// Check if CSV output is requested.
#[inline]
pub fn is_csv() -> bool {
    CSV_OUTPUT.load(std::sync::atomic::Ordering::Relaxed)
}

/// Escape a value for CSV output (wrap in quotes if it contains commas, quotes, or newlines).
pub fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
