//! Audit event storage and retrieval (A1/A3, invariant 10).
//!
//! Every successful mutating core operation appends exactly one event row,
//! inside the same transaction as its index write.

use rusqlite::{Connection, Result};

/// Event types for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    ItemCreated,
    ItemUpdated,
    ItemDeleted,
    ItemTypeChanged,
    RelationAdded,
    CurrentStateUpdated,
    TypeCreated,
    TypeDescriptionUpdated,
    TypeDeleted,
    TagDeleted,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ItemCreated => "item_created",
            Self::ItemUpdated => "item_updated",
            Self::ItemDeleted => "item_deleted",
            Self::ItemTypeChanged => "item_type_changed",
            Self::RelationAdded => "relation_added",
            Self::CurrentStateUpdated => "current_state_updated",
            Self::TypeCreated => "type_created",
            Self::TypeDescriptionUpdated => "type_description_updated",
            Self::TypeDeleted => "type_deleted",
            Self::TagDeleted => "tag_deleted",
        }
    }
}

/// An audit event record.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub event_type: EventType,
    pub actor: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub comment: Option<String>,
    pub created_at: i64,
}

impl Event {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(entity_type: &str, entity_id: &str, event_type: EventType, actor: &str) -> Self {
        Self {
            id: 0,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            event_type,
            actor: actor.to_string(),
            old_value: None,
            new_value: None,
            comment: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Add old/new values for field change tracking.
    #[must_use]
    pub fn with_values(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }

    /// Add a comment to the event.
    #[must_use]
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (entity_type, entity_id, event_type, actor, old_value, new_value, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            event.entity_type,
            event.entity_id,
            event.event_type.as_str(),
            event.actor,
            event.old_value,
            event.new_value,
            event.comment,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get events for an entity, most recent first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_events(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
    limit: Option<u32>,
) -> Result<Vec<Event>> {
    let limit = limit.unwrap_or(100);
    let mut stmt = conn.prepare(
        "SELECT id, entity_type, entity_id, event_type, actor, old_value, new_value, comment, created_at
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY created_at DESC
         LIMIT ?3",
    )?;

    let rows = stmt.query_map(rusqlite::params![entity_type, entity_id, limit], |row| {
        Ok(Event {
            id: row.get(0)?,
            entity_type: row.get(1)?,
            entity_id: row.get(2)?,
            event_type: parse_event_type(row.get::<_, String>(3)?.as_str()),
            actor: row.get(4)?,
            old_value: row.get(5)?,
            new_value: row.get(6)?,
            comment: row.get(7)?,
            created_at: row.get(8)?,
        })
    })?;

    rows.collect()
}

fn parse_event_type(s: &str) -> EventType {
    match s {
        "item_created" => EventType::ItemCreated,
        "item_updated" => EventType::ItemUpdated,
        "item_deleted" => EventType::ItemDeleted,
        "item_type_changed" => EventType::ItemTypeChanged,
        "relation_added" => EventType::RelationAdded,
        "current_state_updated" => EventType::CurrentStateUpdated,
        "type_created" => EventType::TypeCreated,
        "type_description_updated" => EventType::TypeDescriptionUpdated,
        "type_deleted" => EventType::TypeDeleted,
        "tag_deleted" => EventType::TagDeleted,
        _ => EventType::ItemUpdated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::apply;

    #[test]
    fn insert_and_get_roundtrip() {
        let conn = Connection::open_in_memory().unwrap();
        apply(&conn).unwrap();

        let event = Event::new("issues", "1", EventType::ItemCreated, "test-actor")
            .with_comment("created via test");

        let id = insert_event(&conn, &event).unwrap();
        assert!(id > 0);

        let events = get_events(&conn, "issues", "1", Some(10)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, "test-actor");
        assert_eq!(events[0].comment, Some("created via test".to_string()));
    }
}
