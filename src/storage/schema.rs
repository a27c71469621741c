//! Database schema definitions for the index (C8).
//!
//! Timestamps are stored as INTEGER (Unix milliseconds) for sortable,
//! timezone-free comparisons.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the knowledge-base index.
pub const SCHEMA_SQL: &str = r#"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Registries
-- ====================

-- Statuses: fixed-ish lookup table, seeded through the same create path
-- a user-defined status would take.
CREATE TABLE IF NOT EXISTS statuses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    is_closed INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

-- Tags: created lazily on first reference.
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);

-- Sequences: one row per registered type, doubling as the type registry.
CREATE TABLE IF NOT EXISTS sequences (
    type TEXT PRIMARY KEY,
    base_type TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    current_value INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

-- Field definitions per base kind, informational only (validation aid).
CREATE TABLE IF NOT EXISTS type_fields (
    base_type TEXT NOT NULL,
    field_name TEXT NOT NULL,
    PRIMARY KEY (base_type, field_name)
);

-- ====================
-- Items
-- ====================

CREATE TABLE IF NOT EXISTS items (
    item_type TEXT NOT NULL,
    id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    content TEXT,
    priority TEXT NOT NULL DEFAULT 'medium',
    status_id INTEGER NOT NULL,
    start_date TEXT,
    end_date TEXT,
    start_time TEXT,
    tags_json TEXT NOT NULL DEFAULT '[]',
    related_json TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (item_type, id),
    FOREIGN KEY (status_id) REFERENCES statuses(id)
);

CREATE INDEX IF NOT EXISTS idx_items_type ON items(item_type);
CREATE INDEX IF NOT EXISTS idx_items_status ON items(status_id);
CREATE INDEX IF NOT EXISTS idx_items_created ON items(created_at DESC);

-- Tag junction: the normalised projection of items.tags.
CREATE TABLE IF NOT EXISTS item_tags (
    item_type TEXT NOT NULL,
    item_id TEXT NOT NULL,
    tag_id INTEGER NOT NULL,
    PRIMARY KEY (item_type, item_id, tag_id),
    FOREIGN KEY (item_type, item_id) REFERENCES items(item_type, id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_item_tags_tag ON item_tags(tag_id);

-- Relationship graph: one row per direction of a reference.
CREATE TABLE IF NOT EXISTS related_items (
    source_type TEXT NOT NULL,
    source_id TEXT NOT NULL,
    target_type TEXT NOT NULL,
    target_id TEXT NOT NULL,
    PRIMARY KEY (source_type, source_id, target_type, target_id)
);

CREATE INDEX IF NOT EXISTS idx_related_source ON related_items(source_type, source_id);
CREATE INDEX IF NOT EXISTS idx_related_target ON related_items(target_type, target_id);

-- ====================
-- Full-text search
-- ====================

CREATE VIRTUAL TABLE IF NOT EXISTS items_fts USING fts5(
    item_type,
    title,
    description,
    content,
    tags,
    content='items',
    content_rowid='rowid',
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS items_ai AFTER INSERT ON items BEGIN
    INSERT INTO items_fts(rowid, item_type, title, description, content, tags)
    SELECT NEW.rowid, NEW.item_type, NEW.title, NEW.description, NEW.content, NEW.tags_json;
END;

CREATE TRIGGER IF NOT EXISTS items_ad AFTER DELETE ON items BEGIN
    INSERT INTO items_fts(items_fts, rowid, item_type, title, description, content, tags)
    VALUES('delete', OLD.rowid, OLD.item_type, OLD.title, OLD.description, OLD.content, OLD.tags_json);
END;

CREATE TRIGGER IF NOT EXISTS items_au AFTER UPDATE ON items BEGIN
    INSERT INTO items_fts(items_fts, rowid, item_type, title, description, content, tags)
    VALUES('delete', OLD.rowid, OLD.item_type, OLD.title, OLD.description, OLD.content, OLD.tags_json);
    INSERT INTO items_fts(rowid, item_type, title, description, content, tags)
    SELECT NEW.rowid, NEW.item_type, NEW.title, NEW.description, NEW.content, NEW.tags_json;
END;

-- ====================
-- Current state (singleton)
-- ====================

CREATE TABLE IF NOT EXISTS current_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    content TEXT NOT NULL DEFAULT '',
    tags_json TEXT NOT NULL DEFAULT '[]',
    metadata_json TEXT NOT NULL DEFAULT '{}',
    version INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL
);

-- ====================
-- Metadata / rebuild tracking
-- ====================

CREATE TABLE IF NOT EXISTS db_metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- ====================
-- Audit log
-- ====================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT,
    old_value TEXT,
    new_value TEXT,
    comment TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at DESC);

INSERT INTO schema_migrations (version, applied_at)
SELECT 1, 0 WHERE NOT EXISTS (SELECT 1 FROM schema_migrations WHERE version = 1);
"#;

/// Apply the schema to a freshly opened connection. Idempotent: every
/// statement is `CREATE ... IF NOT EXISTS`, so this is safe to call on an
/// already-initialised database.
///
/// # Errors
///
/// Returns a `rusqlite::Error` if any statement in the batch fails.
pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
