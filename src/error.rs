//! Error types for the knowledge-base engine.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes for the CLI wrapper
//! - Retryability flags so callers know whether to retry with corrected input
//! - Structured JSON rendering for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Agents match on the string; shell scripts on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidRequest,
    NotFound,
    Conflict,
    InvalidQuery,
    IoError,
    IndexError,
    Internal,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::InvalidQuery => "INVALID_QUERY",
            Self::IoError => "IO_ERROR",
            Self::IndexError => "INDEX_ERROR",
            Self::Internal => "INTERNAL",
        }
    }

    /// Category-based exit code for the CLI wrapper.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Internal => 1,
            Self::IndexError => 2,
            Self::NotFound => 3,
            Self::InvalidRequest => 4,
            Self::Conflict => 5,
            Self::InvalidQuery => 6,
            Self::IoError => 8,
        }
    }

    /// Whether a caller should retry with corrected input.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidRequest | Self::InvalidQuery | Self::IndexError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in knowledge-base engine operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown type: {type_name}")]
    UnknownType { type_name: String },

    #[error("unknown status: {name}")]
    UnknownStatus { name: String },

    #[error("invalid id: {id}")]
    InvalidId { id: String },

    #[error("invalid type name: {name} (must match ^[a-z][a-z0-9_]{{0,49}}$)")]
    InvalidTypeName { name: String },

    #[error("reserved type: {name}")]
    ReservedType { name: String },

    #[error("{item_type}-{id} not found")]
    NotFound { item_type: String, id: String },

    #[error("duplicate daily entry for {date}")]
    DuplicateDaily { date: String },

    #[error("type {name} already exists")]
    DuplicateType { name: String },

    #[error("type {name} has existing items and cannot be deleted")]
    TypeInUse { name: String },

    #[error("status {name} is referenced by existing items and cannot be deleted")]
    StatusInUse { name: String },

    #[error("cannot change type across base kinds: {from} -> {to}")]
    BaseTypeMismatch { from: String, to: String },

    #[error("unknown reference: {reference}")]
    UnknownReference { reference: String },

    #[error("self-reference is not allowed: {reference}")]
    SelfReference { reference: String },

    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("parse error in {file}: {cause}")]
    ParseError { file: PathBuf, cause: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("index write failed after a successful file write: {0}")]
    Index(String),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("data root is not initialized; run `kb init` first")]
    NotInitialized,

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl Error {
    /// Construct an `Io` error tagged with the path that failed.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnknownType { .. }
            | Self::UnknownStatus { .. }
            | Self::InvalidId { .. }
            | Self::InvalidTypeName { .. }
            | Self::ReservedType { .. }
            | Self::UnknownReference { .. }
            | Self::SelfReference { .. }
            | Self::InvalidArgument(_) => ErrorCode::InvalidRequest,

            Self::NotFound { .. } | Self::NotInitialized => ErrorCode::NotFound,

            Self::DuplicateDaily { .. }
            | Self::DuplicateType { .. }
            | Self::TypeInUse { .. }
            | Self::StatusInUse { .. }
            | Self::BaseTypeMismatch { .. } => ErrorCode::Conflict,

            Self::InvalidQuery { .. } => ErrorCode::InvalidQuery,

            Self::ParseError { .. } | Self::Io { .. } => ErrorCode::IoError,

            Self::Database(_) | Self::Index(_) => ErrorCode::IndexError,

            Self::Yaml(_) | Self::Json(_) | Self::Config(_) | Self::Internal(_) => {
                ErrorCode::Internal
            }

            Self::AlreadyInitialized { .. } => ErrorCode::Conflict,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint. Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::UnknownType { type_name } => {
                Some(format!("Create it first: `kb type create {type_name} --base tasks`"))
            }
            Self::UnknownStatus { .. } => {
                Some("Use `kb status list` to see available statuses".to_string())
            }
            Self::InvalidId { .. } => Some(
                "IDs may not contain `..`, `/`, `\\`, `%`, NUL, and must match ^[A-Za-z0-9._-]+$"
                    .to_string(),
            ),
            Self::DuplicateDaily { date } => {
                Some(format!("A dailies entry for {date} already exists; use `kb update` instead"))
            }
            Self::TypeInUse { name } => {
                Some(format!("Delete all items under `{name}` before deleting the type"))
            }
            Self::BaseTypeMismatch { .. } => {
                Some("change_item_type only moves items between types sharing a base kind".to_string())
            }
            _ => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
