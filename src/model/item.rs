//! The unified `Item` record.
//!
//! One `Item` covers every content kind (issues, plans, docs, knowledge,
//! sessions, dailies, user-defined types). Field relevance varies by base
//! type but the shape is always the same.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Item priority. Defaults to `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Parse from a string, defaulting to `Medium` on anything unrecognized.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

/// The full item record, as reconstructed from (or about to be written to)
/// a Markdown file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "type")]
    pub item_type: String,
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// Required for most types; optional for `sessions`.
    pub content: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    pub status_id: i64,
    /// Resolved status name, populated by the item store on read.
    #[serde(skip)]
    pub status_name: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub start_time: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub related: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Front-matter keys this engine does not model, preserved verbatim
    /// across read/write round-trips (C1 invariant: unknown keys survive).
    #[serde(default, skip_serializing)]
    pub unknown_fields: std::collections::BTreeMap<String, serde_yaml::Value>,
}

/// Lightweight summary returned by `list`, omitting `content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSummary {
    #[serde(rename = "type")]
    pub item_type: String,
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status_id: i64,
    pub status_name: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Item> for ItemSummary {
    fn from(item: &Item) -> Self {
        Self {
            item_type: item.item_type.clone(),
            id: item.id.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            priority: item.priority,
            status_id: item.status_id,
            status_name: item.status_name.clone(),
            start_date: item.start_date.clone(),
            end_date: item.end_date.clone(),
            tags: item.tags.clone(),
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

/// A fully qualified reference, `"<type>-<id>"`.
///
/// Splits on the *first* `-` only.
#[must_use]
pub fn format_reference(item_type: &str, id: &str) -> String {
    format!("{item_type}-{id}")
}

/// Parse a `"<type>-<id>"` reference, splitting on the first `-`.
#[must_use]
pub fn parse_reference(reference: &str) -> Option<(String, String)> {
    let (item_type, id) = reference.split_once('-')?;
    if item_type.is_empty() || id.is_empty() {
        return None;
    }
    Some((item_type.to_string(), id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_round_trips() {
        assert_eq!(format_reference("issues", "7"), "issues-7");
        assert_eq!(
            parse_reference("issues-7"),
            Some(("issues".to_string(), "7".to_string()))
        );
    }

    #[test]
    fn reference_splits_on_first_dash_only() {
        // Session ids contain dashes themselves.
        assert_eq!(
            parse_reference("sessions-2025-01-15-10.30.00.123"),
            Some(("sessions".to_string(), "2025-01-15-10.30.00.123".to_string()))
        );
    }

    #[test]
    fn priority_defaults_to_medium() {
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(Priority::parse("bogus"), Priority::Medium);
        assert_eq!(Priority::parse("HIGH"), Priority::High);
    }
}
