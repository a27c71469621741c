//! SQLite index engine (C8), plus the registries it backs (C3/C4/C5).
//!
//! Follows the `MutationContext` pattern for transaction discipline and
//! audit logging: every mutation runs inside an `IMMEDIATE` transaction,
//! collects events as it goes, and writes them in the same commit.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::error::{Error, Result};
use crate::model::item::{ItemSummary, Priority};
use crate::model::status::{Status, DEFAULT_STATUSES};
use crate::model::tag::TagWithCount;
use crate::model::type_def::{BaseType, TypeDefinition};
use crate::storage::events::{insert_event, Event, EventType};
use crate::storage::schema;

/// SQLite-backed index.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, tracking audit events to persist.
pub struct MutationContext {
    pub op_name: String,
    pub actor: String,
    pub events: Vec<Event>,
}

impl MutationContext {
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor));
    }

    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value),
        );
    }
}

/// A minimal row shape for the items table, used for upsert and rebuild.
pub struct ItemRow<'a> {
    pub item_type: &'a str,
    pub id: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub content: Option<&'a str>,
    pub priority: Priority,
    pub status_id: i64,
    pub start_date: Option<&'a str>,
    pub end_date: Option<&'a str>,
    pub start_time: Option<&'a str>,
    pub tags: &'a BTreeSet<String>,
    pub related: &'a [String],
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SqliteStorage {
    /// Open a database at the given path, applying the schema if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// schema cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// schema cannot be applied.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5000)))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::apply(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database, for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::apply(&conn)?;
        Ok(Self { conn })
    }

    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run a mutation inside an `IMMEDIATE` transaction, writing any events
    /// the closure recorded before committing.
    ///
    /// # Errors
    ///
    /// Returns an error if the closure fails or the transaction cannot be
    /// committed; the transaction is rolled back in either case.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);
        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;
        Ok(result)
    }

    // ====================
    // Status registry (C3)
    // ====================

    /// Seed the default status set if the table is empty. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn seed_default_statuses(&mut self) -> Result<()> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM statuses", [], |r| r.get(0))?;
        if count > 0 {
            return Ok(());
        }
        let now = Utc::now().timestamp_millis();
        let tx = self.conn.transaction()?;
        for (name, is_closed) in DEFAULT_STATUSES {
            tx.execute(
                "INSERT OR IGNORE INTO statuses (name, is_closed, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![name, *is_closed as i64, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// List all statuses.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_statuses(&self) -> Result<Vec<Status>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, is_closed, created_at FROM statuses ORDER BY id")?;
        let rows = stmt.query_map([], Self::map_status)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Look up a status by id.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStatus` if no status has that id.
    pub fn status_by_id(&self, id: i64) -> Result<Status> {
        self.conn
            .query_row(
                "SELECT id, name, is_closed, created_at FROM statuses WHERE id = ?1",
                [id],
                Self::map_status,
            )
            .optional()?
            .ok_or_else(|| Error::UnknownStatus { name: id.to_string() })
    }

    /// Look up a status by name (case-sensitive).
    ///
    /// # Errors
    ///
    /// Returns `UnknownStatus` if no status has that name.
    pub fn status_by_name(&self, name: &str) -> Result<Status> {
        self.conn
            .query_row(
                "SELECT id, name, is_closed, created_at FROM statuses WHERE name = ?1",
                [name],
                Self::map_status,
            )
            .optional()?
            .ok_or_else(|| Error::UnknownStatus { name: name.to_string() })
    }

    /// Ids of statuses with `is_closed = true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn closed_status_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM statuses WHERE is_closed = 1")?;
        let rows = stmt.query_map([], |r| r.get(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    fn map_status(row: &rusqlite::Row) -> rusqlite::Result<Status> {
        Ok(Status {
            id: row.get(0)?,
            name: row.get(1)?,
            is_closed: row.get::<_, i64>(2)? != 0,
            created_at: millis_to_utc(row.get(3)?),
        })
    }

    // ====================
    // Tag registry (C4)
    // ====================

    /// Ensure every name in `names` exists in the tag registry, creating
    /// any that don't. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if any name is empty after trimming, or the insert
    /// fails.
    pub fn ensure_tags_exist(tx: &Transaction, names: &BTreeSet<String>) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        for name in names {
            let trimmed = crate::model::tag::normalize_tag_name(name)
                .map_err(|_| Error::InvalidArgument("tag name cannot be empty".to_string()))?;
            tx.execute(
                "INSERT OR IGNORE INTO tags (name, created_at) VALUES (?1, ?2)",
                rusqlite::params![trimmed, now],
            )?;
        }
        Ok(())
    }

    /// Return the id of an existing tag, or create it.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert/query fails.
    pub fn get_or_create_tag_id(tx: &Transaction, name: &str) -> Result<i64> {
        let now = Utc::now().timestamp_millis();
        tx.execute(
            "INSERT OR IGNORE INTO tags (name, created_at) VALUES (?1, ?2)",
            rusqlite::params![name, now],
        )?;
        tx.query_row("SELECT id FROM tags WHERE name = ?1", [name], |r| r.get(0))
            .map_err(Into::into)
    }

    /// Delete a tag and cascade its junction rows. Does not touch Markdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_tag(&mut self, name: &str, actor: &str) -> Result<bool> {
        self.mutate("delete_tag", actor, |tx, ctx| {
            let deleted = tx.execute("DELETE FROM tags WHERE name = ?1", [name])?;
            if deleted > 0 {
                ctx.record_event("tag", name, EventType::TagDeleted);
            }
            Ok(deleted > 0)
        })
    }

    /// Case-insensitive substring search over tag names, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn search_tags_by_pattern(&self, pattern: &str) -> Result<Vec<TagWithCount>> {
        let like = format!("%{}%", pattern.to_lowercase());
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.name, COUNT(it.item_type)
             FROM tags t LEFT JOIN item_tags it ON it.tag_id = t.id
             WHERE LOWER(t.name) LIKE ?1
             GROUP BY t.id, t.name
             ORDER BY t.name",
        )?;
        let rows = stmt.query_map([like], Self::map_tag_with_count)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// All tags with their cross-type usage count.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn tags_with_counts(&self) -> Result<Vec<TagWithCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.name, COUNT(it.item_type)
             FROM tags t LEFT JOIN item_tags it ON it.tag_id = t.id
             GROUP BY t.id, t.name
             ORDER BY t.name",
        )?;
        let rows = stmt.query_map([], Self::map_tag_with_count)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    fn map_tag_with_count(row: &rusqlite::Row) -> rusqlite::Result<TagWithCount> {
        Ok(TagWithCount {
            id: row.get(0)?,
            name: row.get(1)?,
            count: row.get(2)?,
        })
    }

    /// Replace the junction rows for one item with the given tag set.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn save_item_tags(
        tx: &Transaction,
        item_type: &str,
        item_id: &str,
        names: &BTreeSet<String>,
    ) -> Result<()> {
        tx.execute(
            "DELETE FROM item_tags WHERE item_type = ?1 AND item_id = ?2",
            rusqlite::params![item_type, item_id],
        )?;
        for name in names {
            let tag_id = Self::get_or_create_tag_id(tx, name)?;
            tx.execute(
                "INSERT OR IGNORE INTO item_tags (item_type, item_id, tag_id) VALUES (?1, ?2, ?3)",
                rusqlite::params![item_type, item_id, tag_id],
            )?;
        }
        Ok(())
    }

    // ====================
    // Type registry (C5) / sequences
    // ====================

    /// Seed a built-in type if it is not already registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn seed_type(&mut self, name: &str, base: BaseType, description: &str) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT OR IGNORE INTO sequences (type, base_type, description, current_value, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            rusqlite::params![name, base.as_str(), description, now],
        )?;
        Ok(())
    }

    /// List all non-reserved, registered types.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_types(&self) -> Result<Vec<TypeDefinition>> {
        let mut stmt = self
            .conn
            .prepare("SELECT type, base_type, description, current_value FROM sequences ORDER BY type")?;
        let rows = stmt.query_map([], Self::map_type_def)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Create a user-defined type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTypeName`, `ReservedType`, or `Conflict`-style errors
    /// per the caller's validation; storage itself only enforces uniqueness.
    pub fn create_type(
        &mut self,
        name: &str,
        base: BaseType,
        description: &str,
        actor: &str,
    ) -> Result<()> {
        self.mutate("create_type", actor, |tx, ctx| {
            let exists: i64 = tx.query_row(
                "SELECT COUNT(*) FROM sequences WHERE type = ?1",
                [name],
                |r| r.get(0),
            )?;
            if exists > 0 {
                return Err(Error::DuplicateType { name: name.to_string() });
            }
            let now = Utc::now().timestamp_millis();
            tx.execute(
                "INSERT INTO sequences (type, base_type, description, current_value, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                rusqlite::params![name, base.as_str(), description, now],
            )?;
            ctx.record_event("type", name, EventType::TypeCreated);
            Ok(())
        })
    }

    /// Update a type's description. Only the description may change.
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` if the type is not registered.
    pub fn update_type_description(
        &mut self,
        name: &str,
        description: &str,
        actor: &str,
    ) -> Result<()> {
        self.mutate("update_type_description", actor, |tx, ctx| {
            let updated = tx.execute(
                "UPDATE sequences SET description = ?1 WHERE type = ?2",
                rusqlite::params![description, name],
            )?;
            if updated == 0 {
                return Err(Error::UnknownType { type_name: name.to_string() });
            }
            ctx.record_event("type", name, EventType::TypeDescriptionUpdated);
            Ok(())
        })
    }

    /// Delete a type registration. Caller must have already verified no
    /// files remain under the type's directory.
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` if the type is not registered.
    pub fn delete_type(&mut self, name: &str, actor: &str) -> Result<()> {
        self.mutate("delete_type", actor, |tx, ctx| {
            let deleted = tx.execute("DELETE FROM sequences WHERE type = ?1", [name])?;
            if deleted == 0 {
                return Err(Error::UnknownType { type_name: name.to_string() });
            }
            ctx.record_event("type", name, EventType::TypeDeleted);
            Ok(())
        })
    }

    /// Base type of a registered type.
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` if the type is not registered.
    pub fn base_type_of(&self, name: &str) -> Result<BaseType> {
        let base: String = self
            .conn
            .query_row("SELECT base_type FROM sequences WHERE type = ?1", [name], |r| r.get(0))
            .optional()?
            .ok_or_else(|| Error::UnknownType { type_name: name.to_string() })?;
        BaseType::parse(&base).ok_or_else(|| Error::Internal(format!("unknown base_type {base}")))
    }

    fn map_type_def(row: &rusqlite::Row) -> rusqlite::Result<TypeDefinition> {
        let base: String = row.get(1)?;
        Ok(TypeDefinition {
            type_name: row.get(0)?,
            base_type: BaseType::parse(&base).unwrap_or(BaseType::Documents),
            description: row.get(2)?,
            sequence: row.get(3)?,
        })
    }

    /// Atomically increment and return the next id for an auto-numbered
    /// type, guarded by the write lock via the enclosing transaction.
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` if the type is not registered.
    pub fn next_sequence_value(tx: &Transaction, item_type: &str) -> Result<i64> {
        let updated = tx.execute(
            "UPDATE sequences SET current_value = current_value + 1 WHERE type = ?1",
            [item_type],
        )?;
        if updated == 0 {
            return Err(Error::UnknownType { type_name: item_type.to_string() });
        }
        tx.query_row(
            "SELECT current_value FROM sequences WHERE type = ?1",
            [item_type],
            |r| r.get(0),
        )
        .map_err(Into::into)
    }

    /// Force a type's sequence to an exact value (used by rebuild, which
    /// recomputes `max(id)` over the files actually present on disk).
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn set_sequence_value(tx: &Transaction, item_type: &str, value: i64) -> Result<()> {
        tx.execute(
            "UPDATE sequences SET current_value = ?1 WHERE type = ?2",
            rusqlite::params![value, item_type],
        )?;
        Ok(())
    }

    // ====================
    // Item index rows (C8)
    // ====================

    /// Upsert the items row, FTS row (via triggers), and tag/relation
    /// junction rows for one item.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn upsert_item(tx: &Transaction, row: &ItemRow) -> Result<()> {
        let tags_json = serde_json::to_string(row.tags)?;
        let related_json = serde_json::to_string(row.related)?;
        tx.execute(
            "INSERT INTO items (item_type, id, title, description, content, priority, status_id,
                start_date, end_date, start_time, tags_json, related_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(item_type, id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                content = excluded.content,
                priority = excluded.priority,
                status_id = excluded.status_id,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                start_time = excluded.start_time,
                tags_json = excluded.tags_json,
                related_json = excluded.related_json,
                updated_at = excluded.updated_at",
            rusqlite::params![
                row.item_type,
                row.id,
                row.title,
                row.description,
                row.content,
                row.priority.as_str(),
                row.status_id,
                row.start_date,
                row.end_date,
                row.start_time,
                tags_json,
                related_json,
                row.created_at.timestamp_millis(),
                row.updated_at.timestamp_millis(),
            ],
        )?;

        Self::save_item_tags(tx, row.item_type, row.id, row.tags)?;

        tx.execute(
            "DELETE FROM related_items WHERE source_type = ?1 AND source_id = ?2",
            rusqlite::params![row.item_type, row.id],
        )?;
        for reference in row.related {
            if let Some((target_type, target_id)) = crate::model::item::parse_reference(reference)
            {
                tx.execute(
                    "INSERT OR IGNORE INTO related_items (source_type, source_id, target_type, target_id)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![row.item_type, row.id, target_type, target_id],
                )?;
            }
        }
        Ok(())
    }

    /// Remove an item's index row and all junction/graph rows referencing
    /// it as a source. Rows where this item is only a *target* are left as
    /// stale pointers.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn delete_item_index(tx: &Transaction, item_type: &str, id: &str) -> Result<()> {
        tx.execute(
            "DELETE FROM items WHERE item_type = ?1 AND id = ?2",
            rusqlite::params![item_type, id],
        )?;
        tx.execute(
            "DELETE FROM item_tags WHERE item_type = ?1 AND item_id = ?2",
            rusqlite::params![item_type, id],
        )?;
        tx.execute(
            "DELETE FROM related_items WHERE source_type = ?1 AND source_id = ?2",
            rusqlite::params![item_type, id],
        )?;
        Ok(())
    }

    /// List item summaries for a type, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_item_summaries(
        &self,
        item_type: &str,
        include_closed: bool,
        status_filter: Option<&[i64]>,
    ) -> Result<Vec<ItemSummary>> {
        let mut sql = String::from(
            "SELECT item_type, id, title, description, priority, status_id, start_date, end_date, tags_json, created_at, updated_at
             FROM items WHERE item_type = ?1",
        );
        if let Some(ids) = status_filter {
            if !ids.is_empty() {
                let placeholders: Vec<String> =
                    ids.iter().map(std::string::ToString::to_string).collect();
                sql.push_str(&format!(" AND status_id IN ({})", placeholders.join(",")));
            }
        } else if !include_closed {
            sql.push_str(" AND status_id NOT IN (SELECT id FROM statuses WHERE is_closed = 1)");
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([item_type], Self::map_item_summary)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        self.resolve_status_names(&mut out)?;
        Ok(out)
    }

    fn resolve_status_names(&self, items: &mut [ItemSummary]) -> Result<()> {
        for item in items {
            item.status_name = self.status_by_id(item.status_id)?.name;
        }
        Ok(())
    }

    fn map_item_summary(row: &rusqlite::Row) -> rusqlite::Result<ItemSummary> {
        let tags_json: String = row.get(8)?;
        let tags: BTreeSet<String> = serde_json::from_str(&tags_json).unwrap_or_default();
        Ok(ItemSummary {
            item_type: row.get(0)?,
            id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            priority: Priority::parse(&row.get::<_, String>(4)?),
            status_id: row.get(5)?,
            status_name: String::new(),
            start_date: row.get(6)?,
            end_date: row.get(7)?,
            tags,
            created_at: millis_to_utc(row.get(9)?),
            updated_at: millis_to_utc(row.get(10)?),
        })
    }

    // ====================
    // Relationship graph (C7 backing)
    // ====================

    /// Direct neighbours of `(item_type, id)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn related_neighbors(&self, item_type: &str, id: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT target_type, target_id FROM related_items WHERE source_type = ?1 AND source_id = ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![item_type, id], |r| {
            Ok((r.get(0)?, r.get(1)?))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Whether an item row exists, used to validate relation targets.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn item_exists(&self, item_type: &str, id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM items WHERE item_type = ?1 AND id = ?2",
            rusqlite::params![item_type, id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// Source items whose `related_items` rows point at `(item_type, id)` as a target.
    ///
    /// Used by `change_item_type` to find references that need rewriting.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn related_sources(&self, item_type: &str, id: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_type, source_id FROM related_items WHERE target_type = ?1 AND target_id = ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![item_type, id], |r| {
            Ok((r.get(0)?, r.get(1)?))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Total number of indexed items, for `get_stats`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_items(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM items", [], |r| r.get(0))
            .map_err(Into::into)
    }

    // ====================
    // Current state
    // ====================

    /// Read the singleton current-state record, if any has been saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_current_state(&self) -> Result<Option<crate::model::CurrentState>> {
        self.conn
            .query_row(
                "SELECT content, tags_json, metadata_json, version, is_active, created_at
                 FROM current_state WHERE id = 1",
                [],
                |row| {
                    let tags_json: String = row.get(1)?;
                    let metadata_json: String = row.get(2)?;
                    Ok(crate::model::CurrentState {
                        content: row.get(0)?,
                        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
                        metadata: serde_json::from_str(&metadata_json)
                            .unwrap_or_else(|_| serde_json::json!({})),
                        version: row.get(3)?,
                        is_active: row.get::<_, i64>(4)? != 0,
                        created_at: millis_to_utc(row.get(5)?),
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Replace the current-state record, bumping its version.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn update_current_state(
        &mut self,
        content: &str,
        tags: &[String],
        metadata: &serde_json::Value,
        actor: &str,
    ) -> Result<crate::model::CurrentState> {
        self.mutate("update_current_state", actor, |tx, ctx| {
            let previous_version: i64 = tx
                .query_row("SELECT version FROM current_state WHERE id = 1", [], |r| r.get(0))
                .optional()?
                .unwrap_or(0);
            let version = previous_version + 1;
            let now = Utc::now();
            let tags_json = serde_json::to_string(tags)?;
            let metadata_json = serde_json::to_string(metadata)?;
            tx.execute(
                "INSERT INTO current_state (id, content, tags_json, metadata_json, version, is_active, created_at)
                 VALUES (1, ?1, ?2, ?3, ?4, 1, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    content = excluded.content,
                    tags_json = excluded.tags_json,
                    metadata_json = excluded.metadata_json,
                    version = excluded.version,
                    is_active = 1,
                    created_at = excluded.created_at",
                rusqlite::params![content, tags_json, metadata_json, version, now.timestamp_millis()],
            )?;
            ctx.record_event("current_state", "singleton", EventType::CurrentStateUpdated);
            Ok(crate::model::CurrentState {
                content: content.to_string(),
                tags: tags.to_vec(),
                metadata: metadata.clone(),
                version,
                is_active: true,
                created_at: now,
            })
        })
    }

    // ====================
    // db_metadata / rebuild flag
    // ====================

    /// Whether `db_metadata.needs_rebuild` is set, or the index is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if either query fails.
    pub fn needs_rebuild(&self) -> Result<bool> {
        let flag: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM db_metadata WHERE key = 'needs_rebuild'",
                [],
                |r| r.get(0),
            )
            .optional()?;
        if flag.as_deref() == Some("true") {
            return Ok(true);
        }
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM items", [], |r| r.get(0))?;
        Ok(count == 0)
    }

    /// Mark (or clear) the rebuild flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_needs_rebuild(&self, value: bool) -> Result<()> {
        self.conn.execute(
            "INSERT INTO db_metadata (key, value) VALUES ('needs_rebuild', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [if value { "true" } else { "false" }],
        )?;
        Ok(())
    }

    /// Wipe every item/tag/relation row, for a clean rebuild. Registries
    /// (statuses, sequences) are left intact.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn clear_items(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM items", [])?;
        tx.execute("DELETE FROM item_tags", [])?;
        tx.execute("DELETE FROM related_items", [])?;
        tx.commit()?;
        Ok(())
    }
}

fn millis_to_utc(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_default_statuses_once() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.seed_default_statuses().unwrap();
        storage.seed_default_statuses().unwrap();
        let statuses = storage.list_statuses().unwrap();
        assert_eq!(statuses.len(), DEFAULT_STATUSES.len());
    }

    #[test]
    fn status_lookup_by_name_and_id() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.seed_default_statuses().unwrap();
        let open = storage.status_by_name("Open").unwrap();
        assert_eq!(open.name, "Open");
        assert!(!open.is_closed);
        let fetched = storage.status_by_id(open.id).unwrap();
        assert_eq!(fetched.name, "Open");
    }

    #[test]
    fn unknown_status_name_errors() {
        let storage = SqliteStorage::open_memory().unwrap();
        let err = storage.status_by_name("Bogus").unwrap_err();
        assert!(matches!(err, Error::UnknownStatus { .. }));
    }

    #[test]
    fn type_sequence_increments_atomically() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.seed_type("issues", BaseType::Tasks, "").unwrap();
        let first = storage
            .mutate("test", "tester", |tx, _| SqliteStorage::next_sequence_value(tx, "issues"))
            .unwrap();
        let second = storage
            .mutate("test", "tester", |tx, _| SqliteStorage::next_sequence_value(tx, "issues"))
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn duplicate_type_creation_conflicts() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.create_type("widgets", BaseType::Documents, "", "tester").unwrap();
        let err = storage
            .create_type("widgets", BaseType::Documents, "", "tester")
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateType { .. }));
    }

    #[test]
    fn tag_roundtrip_and_counts() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.seed_default_statuses().unwrap();
        storage.seed_type("issues", BaseType::Tasks, "").unwrap();
        let tags: BTreeSet<String> = ["bug", "urgent"].into_iter().map(str::to_string).collect();
        storage
            .mutate("test", "tester", |tx, _| SqliteStorage::ensure_tags_exist(tx, &tags))
            .unwrap();
        let with_counts = storage.tags_with_counts().unwrap();
        assert_eq!(with_counts.len(), 2);
        assert!(with_counts.iter().all(|t| t.count == 0));
    }

    #[test]
    fn current_state_updates_version() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let first = storage
            .update_current_state("hello", &[], &serde_json::json!({}), "tester")
            .unwrap();
        assert_eq!(first.version, 1);
        let second = storage
            .update_current_state("world", &[], &serde_json::json!({}), "tester")
            .unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(storage.get_current_state().unwrap().unwrap().content, "world");
    }
}
