//! The singleton "current state" record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest-version snapshot of free-form working state, independent of the
/// item store. Exposed via `get_current_state` / `update_current_state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentState {
    pub content: String,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub version: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl CurrentState {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            content: String::new(),
            tags: Vec::new(),
            metadata: serde_json::json!({}),
            version: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}
