//! SQLite index layer (C8) backing the registries (C3/C4/C5) and the
//! relationship graph (C7).
//!
//! Every mutation runs inside an `IMMEDIATE` transaction via
//! [`MutationContext`] and records an audit event in the same commit.
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod events;
pub mod schema;
pub mod sqlite;

pub use sqlite::{ItemRow, MutationContext, SqliteStorage};
