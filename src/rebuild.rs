//! Rebuild engine (C10): reconstruct the SQLite index from the
//! Markdown-of-record files on disk.
//!
//! Invoked automatically by [`crate::store::Engine::open`] when the index
//! is empty or flagged, and exposed directly as `kb rebuild`. Never prints
//! to stdout — this may run inside an MCP stdio transport where stray
//! output corrupts the protocol stream, so diagnostics go through
//! `tracing`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::model::type_def::guess_base_type;
use crate::storage::{ItemRow, SqliteStorage};
use crate::{markdown, path};

/// Summary of what a rebuild found.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RebuildReport {
    pub items_indexed: usize,
    pub types_registered: usize,
    pub files_skipped: usize,
}

/// Rescan `data_root` and repopulate the index from scratch.
///
/// # Errors
///
/// Returns an error if the filesystem scan or any index write fails; a
/// malformed individual file is logged and skipped, not an error.
pub fn rebuild(storage: &mut SqliteStorage, data_root: &Path, actor: &str) -> Result<RebuildReport> {
    let mut report = RebuildReport::default();

    if !data_root.exists() {
        storage.set_needs_rebuild(false)?;
        return Ok(report);
    }

    storage.clear_items()?;

    let mut max_seen: HashMap<String, i64> = HashMap::new();

    for entry in fs::read_dir(data_root).map_err(|e| crate::error::Error::io(data_root, e))? {
        let entry = entry.map_err(|e| crate::error::Error::io(data_root, e))?;
        let file_type = entry.file_type().map_err(|e| crate::error::Error::io(entry.path(), e))?;
        if !file_type.is_dir() {
            continue;
        }
        let dir_name = entry.file_name().to_string_lossy().into_owned();

        if dir_name == "sessions" {
            scan_sessions_dir(storage, &entry.path(), actor, &mut report, &mut max_seen)?;
            continue;
        }

        if storage.base_type_of(&dir_name).is_err() {
            let base = guess_base_type(&dir_name);
            storage.seed_type(&dir_name, base, "")?;
            report.types_registered += 1;
        }
        scan_type_dir(storage, &entry.path(), &dir_name, actor, &mut report, &mut max_seen)?;
    }

    storage.mutate("rebuild:sequences", actor, |tx, _ctx| {
        for (item_type, max_id) in &max_seen {
            SqliteStorage::set_sequence_value(tx, item_type, *max_id)?;
        }
        Ok(())
    })?;

    storage.set_needs_rebuild(false)?;
    Ok(report)
}

fn scan_type_dir(
    storage: &mut SqliteStorage,
    dir: &Path,
    item_type: &str,
    actor: &str,
    report: &mut RebuildReport,
    max_seen: &mut HashMap<String, i64>,
) -> Result<()> {
    let Ok(entries) = fs::read_dir(dir) else { return Ok(()) };
    for entry in entries.flatten() {
        let file_path = entry.path();
        if file_path.extension().and_then(std::ffi::OsStr::to_str) != Some("md") {
            continue;
        }
        let Some(id) = extract_id(&file_path, item_type) else {
            tracing::warn!(file = %file_path.display(), "skipping file with unexpected name");
            report.files_skipped += 1;
            continue;
        };
        if path::validate_id(&id).is_err() {
            tracing::warn!(file = %file_path.display(), "skipping file with unsafe id");
            report.files_skipped += 1;
            continue;
        }
        index_one_file(storage, &file_path, item_type, &id, actor, report, max_seen)?;
    }
    Ok(())
}

fn scan_sessions_dir(
    storage: &mut SqliteStorage,
    sessions_dir: &Path,
    actor: &str,
    report: &mut RebuildReport,
    max_seen: &mut HashMap<String, i64>,
) -> Result<()> {
    let Ok(date_dirs) = fs::read_dir(sessions_dir) else { return Ok(()) };
    for date_entry in date_dirs.flatten() {
        if !date_entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let Ok(files) = fs::read_dir(date_entry.path()) else { continue };
        for file_entry in files.flatten() {
            let file_path = file_entry.path();
            if file_path.extension().and_then(std::ffi::OsStr::to_str) != Some("md") {
                continue;
            }
            let file_name = file_path
                .file_stem()
                .and_then(std::ffi::OsStr::to_str)
                .unwrap_or_default();

            let (item_type, id) = if let Some(id) = file_name.strip_prefix("sessions-") {
                ("sessions", id.to_string())
            } else if let Some(id) = file_name.strip_prefix("dailies-") {
                ("dailies", id.to_string())
            } else {
                tracing::warn!(file = %file_path.display(), "skipping file with unexpected name");
                report.files_skipped += 1;
                continue;
            };

            if path::validate_id(&id).is_err() {
                tracing::warn!(file = %file_path.display(), "skipping file with unsafe id");
                report.files_skipped += 1;
                continue;
            }
            index_one_file(storage, &file_path, item_type, &id, actor, report, max_seen)?;
        }
    }
    Ok(())
}

fn extract_id(file_path: &Path, item_type: &str) -> Option<String> {
    let stem = file_path.file_stem()?.to_str()?;
    stem.strip_prefix(&format!("{item_type}-")).map(str::to_string)
}

fn index_one_file(
    storage: &mut SqliteStorage,
    file_path: &Path,
    item_type: &str,
    id: &str,
    actor: &str,
    report: &mut RebuildReport,
    max_seen: &mut HashMap<String, i64>,
) -> Result<()> {
    let text = match fs::read_to_string(file_path) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(file = %file_path.display(), error = %e, "failed to read file");
            report.files_skipped += 1;
            return Ok(());
        }
    };
    let doc = match markdown::parse(file_path, &text) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(file = %file_path.display(), error = %e, "failed to parse front matter");
            report.files_skipped += 1;
            return Ok(());
        }
    };
    let mut item = match markdown::to_item(file_path, item_type, id, doc) {
        Ok(i) => i,
        Err(e) => {
            tracing::warn!(file = %file_path.display(), error = %e, "failed to reconstruct item");
            report.files_skipped += 1;
            return Ok(());
        }
    };
    if let Err(e) = crate::store::resolve_status(storage, &mut item) {
        tracing::warn!(file = %file_path.display(), error = %e, "skipping file with unresolvable status");
        report.files_skipped += 1;
        return Ok(());
    }

    if let Ok(numeric) = id.parse::<i64>() {
        let entry = max_seen.entry(item_type.to_string()).or_insert(0);
        *entry = (*entry).max(numeric);
    }

    let row = ItemRow {
        item_type,
        id,
        title: &item.title,
        description: item.description.as_deref(),
        content: item.content.as_deref(),
        priority: item.priority,
        status_id: item.status_id,
        start_date: item.start_date.as_deref(),
        end_date: item.end_date.as_deref(),
        start_time: item.start_time.as_deref(),
        tags: &item.tags,
        related: &item.related,
        created_at: item.created_at,
        updated_at: item.updated_at,
    };
    storage.mutate("rebuild:index_item", actor, |tx, _ctx| SqliteStorage::upsert_item(tx, &row))?;
    report.items_indexed += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, contents: &str) {
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(dir, contents).unwrap();
    }

    #[test]
    fn rebuild_scans_flat_type_directories_and_recomputes_sequence() {
        let tmp = TempDir::new().unwrap();
        let data_root = tmp.path().join("data");
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.seed_default_statuses().unwrap();
        storage.seed_type("issues", crate::model::BaseType::Tasks, "").unwrap();

        write_file(
            &data_root.join("issues").join("issues-1.md"),
            "---\nid: \"1\"\ntitle: First\npriority: high\nstatus: Open\ntags: []\nrelated: []\ncreated_at: \"2025-01-01T00:00:00Z\"\nupdated_at: \"2025-01-01T00:00:00Z\"\n---\nbody\n",
        );
        write_file(
            &data_root.join("issues").join("issues-5.md"),
            "---\nid: \"5\"\ntitle: Fifth\npriority: low\nstatus: Open\ntags: []\nrelated: []\ncreated_at: \"2025-01-01T00:00:00Z\"\nupdated_at: \"2025-01-01T00:00:00Z\"\n---\nbody\n",
        );

        let report = rebuild(&mut storage, &data_root, "tester").unwrap();
        assert_eq!(report.items_indexed, 2);
        assert_eq!(report.files_skipped, 0);

        let summaries = storage.list_item_summaries("issues", true, None).unwrap();
        assert_eq!(summaries.len(), 2);

        let next = storage
            .mutate("test", "tester", |tx, _| SqliteStorage::next_sequence_value(tx, "issues"))
            .unwrap();
        assert_eq!(next, 6, "sequence should resume after the highest id found on disk");
    }

    #[test]
    fn rebuild_skips_unparseable_files_without_failing() {
        let tmp = TempDir::new().unwrap();
        let data_root = tmp.path().join("data");
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.seed_default_statuses().unwrap();
        storage.seed_type("docs", crate::model::BaseType::Documents, "").unwrap();

        write_file(&data_root.join("docs").join("docs-1.md"), "not a valid document");

        let report = rebuild(&mut storage, &data_root, "tester").unwrap();
        assert_eq!(report.items_indexed, 0);
        assert_eq!(report.files_skipped, 1);
    }

    #[test]
    fn rebuild_scans_nested_sessions_and_dailies() {
        let tmp = TempDir::new().unwrap();
        let data_root = tmp.path().join("data");
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.seed_default_statuses().unwrap();
        storage.seed_type("sessions", crate::model::BaseType::Sessions, "").unwrap();
        storage.seed_type("dailies", crate::model::BaseType::Sessions, "").unwrap();

        write_file(
            &data_root.join("sessions").join("2025-01-15").join("sessions-2025-01-15-10.30.00.123.md"),
            "---\nid: \"2025-01-15-10.30.00.123\"\ntitle: Session\npriority: medium\nstatus: Open\ntags: []\nrelated: []\ncreated_at: \"2025-01-15T10:30:00Z\"\nupdated_at: \"2025-01-15T10:30:00Z\"\n---\nnotes\n",
        );
        write_file(
            &data_root.join("sessions").join("2025-01-15").join("dailies-2025-01-15.md"),
            "---\nid: \"2025-01-15\"\ntitle: Daily\npriority: medium\nstatus: Open\ntags: []\nrelated: []\ncreated_at: \"2025-01-15T00:00:00Z\"\nupdated_at: \"2025-01-15T00:00:00Z\"\n---\nsummary\n",
        );

        let report = rebuild(&mut storage, &data_root, "tester").unwrap();
        assert_eq!(report.items_indexed, 2);

        let sessions = storage.list_item_summaries("sessions", true, None).unwrap();
        assert_eq!(sessions.len(), 1);
        let dailies = storage.list_item_summaries("dailies", true, None).unwrap();
        assert_eq!(dailies.len(), 1);
    }
}
