//! Tag records (C4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unique, globally-named tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A tag with its usage count across all item types, as returned by
/// `get_with_counts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagWithCount {
    pub id: i64,
    pub name: String,
    pub count: i64,
}

/// Trim and validate a raw tag name.
///
/// # Errors
///
/// Returns an error message if the name is empty after trimming.
pub fn normalize_tag_name(raw: &str) -> Result<String, &'static str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("tag name cannot be empty");
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_rejects_empty() {
        assert_eq!(normalize_tag_name("  bug  ").unwrap(), "bug");
        assert!(normalize_tag_name("   ").is_err());
    }
}
