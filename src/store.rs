//! Item store (C6): the core public contract.
//!
//! `Engine` is a two-phase lifecycle handle: `Engine::open(data_root)` does
//! all fallible setup (schema, seeding, the rebuild check) so every method
//! after that is infallible to *call* (though still fallible to *execute*).
//! There is no "use before open" state to reject.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};

use crate::error::{Error, Result};
use crate::model::item::{format_reference, parse_reference, Item, ItemSummary, Priority};
use crate::model::type_def::{self, BaseType, RESERVED_TYPES};
use crate::model::{CurrentState, Status, TagWithCount, TypeDefinition};
use crate::storage::{ItemRow, SqliteStorage};
use crate::{markdown, path, rebuild, search};

#[cfg(feature = "http-enrichment")]
use crate::enrich::BoxedHook;

/// Inputs to `create`. `id` is honored only for `sessions` (a caller-chosen
/// id); every other type generates its own.
#[derive(Debug, Clone, Default)]
pub struct CreateParams {
    pub item_type: String,
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<String>,
    pub tags: BTreeSet<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub start_time: Option<String>,
    pub related: Vec<String>,
}

/// A partial update. `None` leaves a field unchanged; for nullable fields,
/// `Some(None)` clears it and `Some(Some(v))` sets it.
#[derive(Debug, Clone, Default)]
pub struct UpdatePatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub content: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub status: Option<String>,
    pub start_date: Option<Option<String>>,
    pub end_date: Option<Option<String>>,
    pub start_time: Option<Option<String>>,
    pub tags: Option<BTreeSet<String>>,
    pub related: Option<Vec<String>>,
}

/// One hop of a `get_related` traversal.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RelatedItem {
    pub item_type: String,
    pub id: String,
    pub hop: u32,
}

/// Result of `change_item_type`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChangeTypeResult {
    pub new_id: String,
    pub rewritten_references: usize,
}

/// Aggregate counts for `get_stats`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Stats {
    pub items: i64,
    pub statuses: i64,
    pub tags: i64,
    pub types: i64,
}

/// The default, always-registered types, seeded through the same
/// `create_type` path a user-defined type would take — no hardcoded
/// special-casing for "built-in" kinds.
const DEFAULT_TYPES: &[(&str, BaseType, &str)] = &[
    ("issues", BaseType::Tasks, "Bugs, tasks, and tracked work"),
    ("plans", BaseType::Tasks, "PRDs, specs, and feature plans"),
    ("docs", BaseType::Documents, "Reference documentation"),
    ("knowledge", BaseType::Documents, "Durable notes and learnings"),
];

/// The dual-storage item engine: Markdown-of-record plus the SQLite index,
/// opened once per process.
pub struct Engine {
    data_root: PathBuf,
    storage: SqliteStorage,
    actor: String,
    #[cfg(feature = "http-enrichment")]
    hook: Option<BoxedHook>,
}

impl Engine {
    /// Open the engine at `data_root`, backed by the index at `db_path`.
    /// Seeds default statuses and types on first run, and triggers a
    /// rebuild if the index is empty or flagged.
    ///
    /// # Errors
    ///
    /// Returns an error if the data root or index cannot be created, or if
    /// the rebuild scan fails.
    pub fn open(data_root: PathBuf, db_path: &Path, actor: String) -> Result<Self> {
        fs::create_dir_all(&data_root).map_err(|e| Error::io(&data_root, e))?;
        let mut storage = SqliteStorage::open(db_path)?;
        storage.seed_default_statuses()?;
        for (name, base, description) in DEFAULT_TYPES {
            storage.seed_type(name, *base, description)?;
        }
        storage.seed_type("sessions", BaseType::Sessions, "Work session logs")?;
        storage.seed_type("dailies", BaseType::Sessions, "Daily summaries")?;

        let mut engine = Self {
            data_root,
            storage,
            actor,
            #[cfg(feature = "http-enrichment")]
            hook: None,
        };
        if engine.storage.needs_rebuild()? {
            engine.rebuild_index()?;
        }
        Ok(engine)
    }

    /// Register an enrichment hook and the deadline every invocation must
    /// be driven under. The core never picks this timeout itself.
    #[cfg(feature = "http-enrichment")]
    #[must_use]
    pub fn with_enrichment(mut self, hook: BoxedHook) -> Self {
        self.hook = Some(hook);
        self
    }

    #[must_use]
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    // ====================
    // C6.1 create
    // ====================

    /// # Errors
    ///
    /// `UnknownType`, `UnknownStatus`, `DuplicateDaily`, `InvalidId`, or an
    /// I/O or index error.
    pub fn create(&mut self, params: CreateParams) -> Result<Item> {
        let base = self.storage.base_type_of(&params.item_type)?;
        if params.title.trim().is_empty() {
            return Err(Error::InvalidArgument("title must not be empty".to_string()));
        }

        let id = self.generate_id(&params.item_type, base, params.id.as_deref())?;

        let status = match &params.status {
            Some(name) => self.storage.status_by_name(name)?,
            None => self.storage.status_by_name("Open")?,
        };

        let (start_date, start_time) = derive_session_fields(&params.item_type, &id, &params);

        let now = Utc::now();
        let mut item = Item {
            item_type: params.item_type.clone(),
            id: id.clone(),
            title: params.title,
            description: params.description,
            content: params.content,
            priority: params.priority.unwrap_or_default(),
            status_id: status.id,
            status_name: status.name,
            start_date,
            end_date: params.end_date,
            start_time,
            tags: params.tags,
            related: params.related,
            created_at: now,
            updated_at: now,
            unknown_fields: std::collections::BTreeMap::new(),
        };

        self.write_and_sync(&item)?;
        self.run_enrichment(&item);
        item.status_name = self.storage.status_by_id(item.status_id)?.name;
        Ok(item)
    }

    /// Allocate an id for a new item of `item_type`.
    fn generate_id(&mut self, item_type: &str, base: BaseType, supplied: Option<&str>) -> Result<String> {
        match item_type {
            "dailies" => {
                let id = supplied
                    .ok_or_else(|| Error::InvalidArgument("dailies requires start_date".to_string()))?
                    .to_string();
                NaiveDate::parse_from_str(&id, "%Y-%m-%d")
                    .map_err(|_| Error::InvalidId { id: id.clone() })?;
                if self.storage.item_exists("dailies", &id)? {
                    return Err(Error::DuplicateDaily { date: id });
                }
                Ok(id)
            }
            "sessions" => {
                let id = match supplied {
                    Some(id) => {
                        path::session_date_prefix(id)?;
                        id.to_string()
                    }
                    None => session_timestamp_id(),
                };
                Ok(id)
            }
            _ => {
                let item_type = item_type.to_string();
                let next = self
                    .storage
                    .mutate("create_item:sequence", &self.actor.clone(), |tx, _ctx| {
                        SqliteStorage::next_sequence_value(tx, &item_type)
                    })?;
                let _ = base;
                Ok(next.to_string())
            }
        }
    }

    // ====================
    // C6.2 get
    // ====================

    /// # Errors
    ///
    /// `NotFound` if no file exists for `(item_type, id)`, `InvalidId` for
    /// an unsafe id, or `ParseError` if the file is malformed.
    pub fn get(&self, item_type: &str, id: &str) -> Result<Item> {
        let file = path::resolve(&self.data_root, item_type, id)?;
        let text = fs::read_to_string(&file).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound { item_type: item_type.to_string(), id: id.to_string() }
            } else {
                Error::io(&file, e)
            }
        })?;
        let doc = markdown::parse(&file, &text)?;
        let mut item = markdown::to_item(&file, item_type, id, doc)?;
        resolve_status(&self.storage, &mut item)?;
        synthesize_session_dates(&mut item);
        Ok(item)
    }

    // ====================
    // C6.3 update
    // ====================

    /// # Errors
    ///
    /// `NotFound`, `UnknownStatus`, or an I/O or index error.
    pub fn update(&mut self, item_type: &str, id: &str, patch: UpdatePatch) -> Result<Item> {
        let mut item = self.get(item_type, id)?;
        let original = item.clone_for_comparison();

        if let Some(title) = patch.title {
            item.title = title;
        }
        if let Some(description) = patch.description {
            item.description = description;
        }
        if let Some(content) = patch.content {
            item.content = content;
        }
        if let Some(priority) = patch.priority {
            item.priority = priority;
        }
        if let Some(status_name) = patch.status {
            let status = self.storage.status_by_name(&status_name)?;
            item.status_id = status.id;
            item.status_name = status.name;
        }
        if let Some(start_date) = patch.start_date {
            item.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            item.end_date = end_date;
        }
        if let Some(start_time) = patch.start_time {
            item.start_time = start_time;
        }
        if let Some(tags) = patch.tags {
            item.tags = tags;
        }
        if let Some(related) = patch.related {
            item.related = related;
        }

        if item.clone_for_comparison() == original {
            // No observable change: leave the file and `updated_at` untouched.
            return Ok(item);
        }

        item.updated_at = Utc::now();
        self.write_and_sync(&item)?;
        Ok(item)
    }

    // ====================
    // C6.4 delete
    // ====================

    /// # Errors
    ///
    /// Returns an error if the index removal fails; a missing file is not
    /// an error.
    pub fn delete(&mut self, item_type: &str, id: &str) -> Result<bool> {
        let file = path::resolve(&self.data_root, item_type, id)?;
        let removed = match fs::remove_file(&file) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(Error::io(&file, e)),
        };

        let item_type = item_type.to_string();
        let id_owned = id.to_string();
        self.storage.mutate("delete_item", &self.actor.clone(), |tx, ctx| {
            SqliteStorage::delete_item_index(tx, &item_type, &id_owned)?;
            ctx.record_event("item", &format_reference(&item_type, &id_owned), crate::storage::events::EventType::ItemDeleted);
            Ok(())
        })?;

        Ok(removed)
    }

    // ====================
    // C6.5 list
    // ====================

    /// # Errors
    ///
    /// Returns an error if the index query fails.
    pub fn list(
        &self,
        item_type: &str,
        include_closed: bool,
        statuses: Option<&[String]>,
    ) -> Result<Vec<ItemSummary>> {
        let status_ids = match statuses {
            Some(names) if !names.is_empty() => {
                let mut ids = Vec::with_capacity(names.len());
                for name in names {
                    ids.push(self.storage.status_by_name(name)?.id);
                }
                Some(ids)
            }
            _ => None,
        };
        self.storage
            .list_item_summaries(item_type, include_closed, status_ids.as_deref())
    }

    // ====================
    // C6.7 change_item_type
    // ====================

    /// # Errors
    ///
    /// `ReservedType` if either type is `sessions`/`dailies`;
    /// `BaseTypeMismatch` if the base kinds differ; otherwise propagates
    /// `get`/`create`/`delete` errors.
    pub fn change_item_type(
        &mut self,
        from_type: &str,
        from_id: &str,
        to_type: &str,
    ) -> Result<ChangeTypeResult> {
        if RESERVED_TYPES.contains(&from_type) || RESERVED_TYPES.contains(&to_type) {
            return Err(Error::ReservedType { name: from_type.to_string() });
        }
        let from_base = self.storage.base_type_of(from_type)?;
        let to_base = self.storage.base_type_of(to_type)?;
        if from_base != to_base {
            return Err(Error::BaseTypeMismatch {
                from: from_type.to_string(),
                to: to_type.to_string(),
            });
        }

        let original = self.get(from_type, from_id)?;
        let new_id = self.generate_id(to_type, to_base, None)?;
        let now = Utc::now();
        let mut new_item = Item {
            item_type: to_type.to_string(),
            id: new_id.clone(),
            created_at: now,
            updated_at: now,
            ..original.clone()
        };
        new_item.item_type = to_type.to_string();
        new_item.id = new_id.clone();
        self.write_and_sync(&new_item)?;

        let old_ref = format_reference(from_type, from_id);
        let new_ref = format_reference(to_type, &new_id);
        let referrers = self.storage.related_sources(from_type, from_id)?;
        let mut rewritten = 0usize;
        for (src_type, src_id) in referrers {
            if src_type == from_type && src_id == from_id {
                continue; // self-loop, shouldn't exist, but never rewrite onto itself
            }
            let mut referrer = self.get(&src_type, &src_id)?;
            let mut changed = false;
            for reference in &mut referrer.related {
                if *reference == old_ref {
                    *reference = new_ref.clone();
                    changed = true;
                }
            }
            if changed {
                referrer.updated_at = Utc::now();
                self.write_and_sync(&referrer)?;
                rewritten += 1;
            }
        }

        self.delete(from_type, from_id)?;

        self.storage.mutate("change_item_type", &self.actor.clone(), |_tx, ctx| {
            ctx.record_event(
                "item",
                &new_ref,
                crate::storage::events::EventType::ItemTypeChanged,
            );
            Ok(())
        })?;

        Ok(ChangeTypeResult { new_id, rewritten_references: rewritten })
    }

    // ====================
    // C7 relationship graph
    // ====================

    /// # Errors
    ///
    /// Returns an error if the starting item does not exist or the index
    /// query fails.
    pub fn get_related(&self, item_type: &str, id: &str, depth: u32) -> Result<Vec<RelatedItem>> {
        use std::collections::{HashSet, VecDeque};

        let mut visited: HashSet<(String, String)> = HashSet::new();
        visited.insert((item_type.to_string(), id.to_string()));
        let mut frontier: VecDeque<(String, String, u32)> = VecDeque::new();
        frontier.push_back((item_type.to_string(), id.to_string(), 0));
        let mut out = Vec::new();

        while let Some((t, i, hop)) = frontier.pop_front() {
            if hop >= depth {
                continue;
            }
            for (nt, ni) in self.storage.related_neighbors(&t, &i)? {
                let key = (nt.clone(), ni.clone());
                if visited.insert(key) {
                    out.push(RelatedItem { item_type: nt.clone(), id: ni.clone(), hop: hop + 1 });
                    frontier.push_back((nt, ni, hop + 1));
                }
            }
        }
        Ok(out)
    }

    /// Ensure bidirectional references between `source` and every target.
    ///
    /// # Errors
    ///
    /// `SelfReference` if a target equals the source; `UnknownReference` if
    /// a target does not exist.
    pub fn add_relations(&mut self, source: &str, targets: &[String]) -> Result<Item> {
        let (source_type, source_id) =
            parse_reference(source).ok_or_else(|| Error::InvalidArgument(format!("bad reference: {source}")))?;
        let mut source_item = self.get(&source_type, &source_id)?;

        for target in targets {
            if target == source {
                return Err(Error::SelfReference { reference: target.clone() });
            }
            let (target_type, target_id) = parse_reference(target)
                .ok_or_else(|| Error::InvalidArgument(format!("bad reference: {target}")))?;
            if !self.storage.item_exists(&target_type, &target_id)? {
                return Err(Error::UnknownReference { reference: target.clone() });
            }

            if !source_item.related.contains(target) {
                source_item.related.push(target.clone());
            }

            let mut target_item = self.get(&target_type, &target_id)?;
            if !target_item.related.contains(&source.to_string()) {
                target_item.related.push(source.to_string());
                target_item.updated_at = Utc::now();
                self.write_and_sync(&target_item)?;
            }
        }

        source_item.updated_at = Utc::now();
        self.write_and_sync(&source_item)?;

        self.storage.mutate("add_relations", &self.actor.clone(), |_tx, ctx| {
            ctx.record_event("item", source, crate::storage::events::EventType::RelationAdded);
            Ok(())
        })?;

        Ok(source_item)
    }

    // ====================
    // C5 type registry (exposed)
    // ====================

    /// # Errors
    ///
    /// `InvalidTypeName`, `ReservedType`, or `Conflict` (duplicate).
    pub fn create_type(&mut self, name: &str, base: BaseType, description: &str) -> Result<()> {
        if !type_def::is_valid_type_name(name) {
            return Err(Error::InvalidTypeName { name: name.to_string() });
        }
        if RESERVED_TYPES.contains(&name) {
            return Err(Error::ReservedType { name: name.to_string() });
        }
        self.storage.create_type(name, base, description, &self.actor.clone())?;
        fs::create_dir_all(path::type_dir(&self.data_root, name)).map_err(|e| Error::io(&self.data_root, e))?;
        Ok(())
    }

    /// # Errors
    ///
    /// `UnknownType` if the type is not registered.
    pub fn update_type_description(&mut self, name: &str, description: &str) -> Result<()> {
        self.storage.update_type_description(name, description, &self.actor.clone())
    }

    /// # Errors
    ///
    /// `ReservedType`, `UnknownType`, or `TypeInUse` if any file remains
    /// under the type's directory.
    pub fn delete_type(&mut self, name: &str) -> Result<()> {
        if RESERVED_TYPES.contains(&name) {
            return Err(Error::ReservedType { name: name.to_string() });
        }
        if directory_has_files(&path::type_dir(&self.data_root, name)) {
            return Err(Error::TypeInUse { name: name.to_string() });
        }
        self.storage.delete_type(name, &self.actor.clone())
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_types(&self) -> Result<Vec<TypeDefinition>> {
        self.storage.list_types()
    }

    // ====================
    // C3/C4 registries (exposed)
    // ====================

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_statuses(&self) -> Result<Vec<Status>> {
        self.storage.list_statuses()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_tags(&self) -> Result<Vec<TagWithCount>> {
        self.storage.tags_with_counts()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn search_tags(&self, pattern: &str) -> Result<Vec<TagWithCount>> {
        self.storage.search_tags_by_pattern(pattern)
    }

    /// Delete a tag registry entry. Does not rewrite Markdown files that
    /// still mention the tag in their front matter; a later update that
    /// re-submits the name simply re-creates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_tag(&mut self, name: &str) -> Result<bool> {
        self.storage.delete_tag(name, &self.actor.clone())
    }

    // ====================
    // Current state
    // ====================

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_current_state(&self) -> Result<CurrentState> {
        Ok(self.storage.get_current_state()?.unwrap_or_else(CurrentState::empty))
    }

    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn update_current_state(
        &mut self,
        content: &str,
        tags: &[String],
        metadata: &serde_json::Value,
    ) -> Result<CurrentState> {
        self.storage.update_current_state(content, tags, metadata, &self.actor.clone())
    }

    // ====================
    // Stats
    // ====================

    /// # Errors
    ///
    /// Returns an error if any underlying query fails.
    pub fn get_stats(&self) -> Result<Stats> {
        Ok(Stats {
            items: self.storage.count_items()?,
            statuses: self.storage.list_statuses()?.len() as i64,
            tags: self.storage.tags_with_counts()?.len() as i64,
            types: self.storage.list_types()?.len() as i64,
        })
    }

    // ====================
    // C9 full-text search
    // ====================

    /// # Errors
    ///
    /// `InvalidQuery` if the query cannot be parsed.
    pub fn search(
        &self,
        query: &str,
        types: Option<&[String]>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<search::SearchHit>> {
        search::search(self.storage.conn(), query, types, limit, offset)
    }

    /// # Errors
    ///
    /// `InvalidQuery` if the prefix cannot be parsed.
    pub fn suggest(&self, prefix: &str, types: Option<&[String]>, limit: usize) -> Result<Vec<search::SearchHit>> {
        search::suggest(self.storage.conn(), prefix, types, limit)
    }

    /// # Errors
    ///
    /// `InvalidQuery` if the query cannot be parsed.
    pub fn count(&self, query: &str, types: Option<&[String]>) -> Result<i64> {
        search::count(self.storage.conn(), query, types)
    }

    // ====================
    // C10 rebuild
    // ====================

    /// # Errors
    ///
    /// Returns an error if the filesystem scan or index writes fail.
    pub fn rebuild_index(&mut self) -> Result<rebuild::RebuildReport> {
        rebuild::rebuild(&mut self.storage, &self.data_root, &self.actor)
    }

    // ====================
    // Internal helpers
    // ====================

    /// Write the file-of-record, then synchronise the index row, tag
    /// junctions, and relationship rows in one transaction (C8). The file
    /// write happens first per invariant 1: the file is always the more
    /// current of the two if the index write fails.
    fn write_and_sync(&mut self, item: &Item) -> Result<()> {
        let file = path::resolve(&self.data_root, &item.item_type, &item.id)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let text = markdown::emit(item)?;
        atomic_write(&file, &text)?;

        let row = ItemRow {
            item_type: &item.item_type,
            id: &item.id,
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

        let reference = format_reference(&item.item_type, &item.id);
        self.storage.mutate("write_item", &self.actor.clone(), |tx, ctx| {
            SqliteStorage::upsert_item(tx, &row)?;
            ctx.record_event("item", &reference, crate::storage::events::EventType::ItemUpdated);
            Ok(())
        })
    }

    #[cfg(feature = "http-enrichment")]
    fn run_enrichment(&self, item: &Item) {
        let Some(hook) = &self.hook else { return };
        let input = crate::enrich::EnrichmentInput {
            item_type: item.item_type.clone(),
            id: item.id.clone(),
            title: item.title.clone(),
            content: item.content.clone(),
        };
        let timeout = hook.timeout;
        match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => {
                let result = rt.block_on(async { tokio::time::timeout(timeout, hook.run(&input)).await });
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!("enrichment hook failed: {e}"),
                    Err(_) => tracing::warn!("enrichment hook timed out after {timeout:?}"),
                }
            }
            Err(e) => tracing::warn!("could not start enrichment runtime: {e}"),
        }
    }

    #[cfg(not(feature = "http-enrichment"))]
    fn run_enrichment(&self, _item: &Item) {}
}

fn directory_has_files(dir: &Path) -> bool {
    fn walk(dir: &Path) -> bool {
        let Ok(entries) = fs::read_dir(dir) else { return false };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if walk(&path) {
                    return true;
                }
            } else {
                return true;
            }
        }
        false
    }
    walk(dir)
}

/// Write-to-temp + rename onto the target path, for atomic replacement.
/// The temp file lives alongside the target so the rename stays on the
/// same filesystem.
fn atomic_write(target: &Path, contents: &str) -> Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let file_name = target.file_name().and_then(|n| n.to_str()).unwrap_or("item");
    let tmp = dir.join(format!(".{file_name}.tmp"));
    fs::write(&tmp, contents.as_bytes()).map_err(|e| Error::io(&tmp, e))?;
    fs::rename(&tmp, target).map_err(|e| Error::io(target, e))?;
    Ok(())
}

/// `YYYY-MM-DD-HH.MM.SS.mmm` in local time. Crossing a DST boundary can
/// make consecutive ids non-monotonic; this is a documented characteristic,
/// not a bug.
fn session_timestamp_id() -> String {
    let now = chrono::Local::now();
    format!(
        "{}.{:03}",
        now.format("%Y-%m-%d-%H.%M.%S"),
        now.timestamp_subsec_millis()
    )
}

fn derive_session_fields(item_type: &str, id: &str, params: &CreateParams) -> (Option<String>, Option<String>) {
    match item_type {
        "sessions" => {
            let date = path::session_date_prefix(id).ok();
            let time = id.get(11..).map(str::to_string);
            (date.or_else(|| params.start_date.clone()), time.or_else(|| params.start_time.clone()))
        }
        "dailies" => (Some(id.to_string()), None),
        _ => (params.start_date.clone(), params.start_time.clone()),
    }
}

/// Reconcile a freshly parsed item's status against the registry.
///
/// Front matter normally carries the status *name* (what `markdown::emit`
/// writes); older or hand-edited files may carry only a numeric
/// `status_id`. Whichever is present wins and both fields are overwritten
/// with the registry's canonical form, so a renamed status is picked up
/// transparently on next read.
pub(crate) fn resolve_status(storage: &SqliteStorage, item: &mut Item) -> Result<()> {
    let status = if item.status_name.is_empty() {
        if item.status_id == 0 {
            storage.status_by_name("Open")?
        } else {
            storage.status_by_id(item.status_id)?
        }
    } else {
        storage.status_by_name(&item.status_name)?
    };
    item.status_id = status.id;
    item.status_name = status.name;
    Ok(())
}

fn synthesize_session_dates(item: &mut Item) {
    if matches!(item.item_type.as_str(), "sessions" | "dailies") && item.start_date.is_none() {
        if let Ok(date) = path::session_date_prefix(&item.id) {
            item.start_date = Some(date);
        } else if item.item_type == "dailies" {
            item.start_date = Some(item.id.clone());
        }
    }
}

impl Item {
    /// Equality over every field a patch can touch, ignoring `updated_at`
    /// (and `status_name`, which is derived). Used to detect a no-op
    /// update so it can skip the write entirely (testable property #2).
    fn clone_for_comparison(&self) -> ComparableItem {
        ComparableItem {
            title: self.title.clone(),
            description: self.description.clone(),
            content: self.content.clone(),
            priority: self.priority,
            status_id: self.status_id,
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            start_time: self.start_time.clone(),
            tags: self.tags.clone(),
            related: self.related.clone(),
        }
    }
}

#[derive(PartialEq)]
struct ComparableItem {
    title: String,
    description: Option<String>,
    content: Option<String>,
    priority: Priority,
    status_id: i64,
    start_date: Option<String>,
    end_date: Option<String>,
    start_time: Option<String>,
    tags: BTreeSet<String>,
    related: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_engine() -> (TempDir, Engine) {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("search.db");
        let engine = Engine::open(dir.path().join("data"), &db_path, "tester".to_string()).unwrap();
        (dir, engine)
    }

    #[test]
    fn create_get_update_delete_roundtrip() {
        let (_dir, mut engine) = open_engine();
        let item = engine
            .create(CreateParams {
                item_type: "issues".to_string(),
                title: "Fix crash".to_string(),
                content: Some("Null ptr in parser".to_string()),
                priority: Some(Priority::High),
                tags: ["bug", "parser"].into_iter().map(str::to_string).collect(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(item.id, "1");
        assert_eq!(item.status_name, "Open");

        let fetched = engine.get("issues", "1").unwrap();
        assert_eq!(fetched.content, item.content);

        let updated = engine
            .update("issues", "1", UpdatePatch { status: Some("Completed".to_string()), ..Default::default() })
            .unwrap();
        assert!(updated.updated_at >= item.updated_at);

        let listed = engine.list("issues", false, None).unwrap();
        assert!(listed.is_empty(), "completed item should be excluded by default");

        let listed_all = engine.list("issues", true, None).unwrap();
        assert_eq!(listed_all.len(), 1);

        assert!(engine.delete("issues", "1").unwrap());
        assert!(matches!(engine.get("issues", "1"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn idempotent_update_is_a_true_no_op() {
        let (_dir, mut engine) = open_engine();
        let created = engine
            .create(CreateParams { item_type: "docs".to_string(), title: "Spec".to_string(), ..Default::default() })
            .unwrap();

        let patch = UpdatePatch { title: Some("Spec".to_string()), ..Default::default() };
        let first = engine.update("docs", &created.id, patch.clone()).unwrap();
        let second = engine.update("docs", &created.id, patch).unwrap();
        assert_eq!(first.updated_at, second.updated_at);
        assert_eq!(first.updated_at, created.updated_at);
    }

    #[test]
    fn tag_set_normalizes_duplicates() {
        let (_dir, mut engine) = open_engine();
        let created = engine
            .create(CreateParams { item_type: "docs".to_string(), title: "Spec".to_string(), ..Default::default() })
            .unwrap();
        let updated = engine
            .update(
                "docs",
                &created.id,
                UpdatePatch {
                    tags: Some(["a", "b", "a"].into_iter().map(str::to_string).collect()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.tags.len(), 2);
    }

    #[test]
    fn bidirectional_relation_is_symmetric() {
        let (_dir, mut engine) = open_engine();
        let plan = engine
            .create(CreateParams { item_type: "plans".to_string(), title: "Q1 plan".to_string(), ..Default::default() })
            .unwrap();
        let doc = engine
            .create(CreateParams { item_type: "docs".to_string(), title: "Spec".to_string(), ..Default::default() })
            .unwrap();

        let source = engine
            .add_relations(&format_reference("plans", &plan.id), &[format_reference("docs", &doc.id)])
            .unwrap();
        assert!(source.related.contains(&format_reference("docs", &doc.id)));

        let doc_after = engine.get("docs", &doc.id).unwrap();
        assert!(doc_after.related.contains(&format_reference("plans", &plan.id)));

        let related = engine.get_related("plans", &plan.id, 1).unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].item_type, "docs");
    }

    #[test]
    fn self_reference_is_rejected() {
        let (_dir, mut engine) = open_engine();
        let plan = engine
            .create(CreateParams { item_type: "plans".to_string(), title: "Q1 plan".to_string(), ..Default::default() })
            .unwrap();
        let reference = format_reference("plans", &plan.id);
        let err = engine.add_relations(&reference, &[reference.clone()]).unwrap_err();
        assert!(matches!(err, Error::SelfReference { .. }));
    }

    #[test]
    fn dailies_are_unique_per_date() {
        let (_dir, mut engine) = open_engine();
        let params = || CreateParams {
            item_type: "dailies".to_string(),
            id: Some("2025-01-15".to_string()),
            title: "2025-01-15".to_string(),
            content: Some("did stuff".to_string()),
            start_date: Some("2025-01-15".to_string()),
            ..Default::default()
        };
        engine.create(params()).unwrap();
        let err = engine.create(params()).unwrap_err();
        assert!(matches!(err, Error::DuplicateDaily { .. }));
    }

    #[test]
    fn path_unsafe_ids_are_rejected_before_touching_disk() {
        let (_dir, mut engine) = open_engine();
        let err = engine.get("issues", "../escape").unwrap_err();
        assert!(matches!(err, Error::InvalidId { .. }));

        let err = engine
            .create(CreateParams {
                item_type: "sessions".to_string(),
                id: Some("not/a/date".to_string()),
                title: "x".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidId { .. }));
    }

    #[test]
    fn change_item_type_preserves_inbound_references() {
        let (_dir, mut engine) = open_engine();
        let issue = engine
            .create(CreateParams { item_type: "issues".to_string(), title: "Crash".to_string(), ..Default::default() })
            .unwrap();
        engine
            .create_type("bugs", BaseType::Tasks, "Promoted issues")
            .unwrap();
        let doc = engine
            .create(CreateParams {
                item_type: "docs".to_string(),
                title: "Spec".to_string(),
                related: vec![format_reference("issues", &issue.id)],
                ..Default::default()
            })
            .unwrap();
        // add_relations would also create the reverse edge; here we seed the
        // forward-only edge directly via create to test change_item_type.
        let _ = doc;

        let result = engine.change_item_type("issues", &issue.id, "bugs").unwrap();
        assert_eq!(result.rewritten_references, 1);
        assert!(matches!(engine.get("issues", &issue.id), Err(Error::NotFound { .. })));

        let doc_after = engine.get("docs", "1").unwrap();
        assert!(doc_after.related.contains(&format_reference("bugs", &result.new_id)));
        assert!(!doc_after.related.iter().any(|r| r == &format_reference("issues", &issue.id)));
    }
}
