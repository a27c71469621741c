//! Dynamic type registry entries (C5).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The base kind that governs an item type's default field set and id policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
    Tasks,
    Documents,
    Sessions,
}

impl BaseType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Documents => "documents",
            Self::Sessions => "sessions",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tasks" => Some(Self::Tasks),
            "documents" => Some(Self::Documents),
            "sessions" => Some(Self::Sessions),
            _ => None,
        }
    }
}

/// Names reserved by the system; cannot be created or deleted by users.
pub const RESERVED_TYPES: &[&str] = &["sessions", "dailies"];

/// A single entry in the dynamic type registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDefinition {
    #[serde(rename = "type")]
    pub type_name: String,
    pub base_type: BaseType,
    pub description: String,
    /// Current value of the per-type auto-increment sequence.
    pub sequence: i64,
}

static TYPE_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,49}$").expect("static regex"));

/// Validate a user-supplied type name against the registry naming rule.
#[must_use]
pub fn is_valid_type_name(name: &str) -> bool {
    TYPE_NAME_PATTERN.is_match(name)
}

/// Field names a base kind adds beyond the common `Item` shape.
///
/// Informs tool-argument validation; storage itself is not constrained by it.
#[must_use]
pub fn fields_for_base(base: BaseType) -> &'static [&'static str] {
    match base {
        BaseType::Tasks => &["priority", "status", "start_date", "end_date", "related"],
        BaseType::Documents => &["related"],
        BaseType::Sessions => &["content", "start_time", "related"],
    }
}

/// Mapping table used by the rebuild engine (C10) to classify unregistered
/// directories found on disk.
#[must_use]
pub fn guess_base_type(dir_name: &str) -> BaseType {
    match dir_name {
        "issues" | "plans" => BaseType::Tasks,
        "docs" | "knowledge" | "decisions" | "features" => BaseType::Documents,
        "sessions" | "dailies" => BaseType::Sessions,
        _ => BaseType::Documents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_type_names() {
        assert!(is_valid_type_name("issues"));
        assert!(is_valid_type_name("my_type_1"));
        assert!(!is_valid_type_name("Issues"));
        assert!(!is_valid_type_name("1issues"));
        assert!(!is_valid_type_name(""));
        assert!(!is_valid_type_name(&"a".repeat(51)));
    }

    #[test]
    fn reserved_types_are_sessions_and_dailies() {
        assert_eq!(RESERVED_TYPES, &["sessions", "dailies"]);
    }
}
