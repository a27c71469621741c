//! Workflow status records (C3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named workflow state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub id: i64,
    pub name: String,
    pub is_closed: bool,
    pub created_at: DateTime<Utc>,
}

/// The default status set seeded on first initialisation of the index.
///
/// `Completed`, `Closed`, and `Cancelled` are closed; the rest are open.
pub const DEFAULT_STATUSES: &[(&str, bool)] = &[
    ("Open", false),
    ("In Progress", false),
    ("Review", false),
    ("Completed", true),
    ("Closed", true),
    ("On Hold", false),
    ("Cancelled", true),
];
