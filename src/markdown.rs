//! Markdown-of-record codec (C1).
//!
//! A document is `"---\n<yaml>\n---\n<body>"`. Parsing splits on the first
//! two `---` fences; the YAML block decodes to a mapping of scalars, ISO
//! dates, and sequences, and the body is the remainder verbatim. Emission is
//! the inverse, with deterministic front-matter key order. Unknown keys
//! round-trip unchanged.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde_yaml::Value;

use crate::error::{Error, Result};
use crate::model::item::Priority;
use crate::model::Item;

const FENCE: &str = "---";

/// Parsed front matter plus body, before reconciliation against the registries.
pub struct RawDocument {
    pub front_matter: serde_yaml::Mapping,
    pub body: String,
}

/// Split a document into its YAML front matter and Markdown body.
///
/// # Errors
///
/// Returns `ParseError` if the fences are missing or the YAML is malformed.
pub fn parse(file: &Path, text: &str) -> Result<RawDocument> {
    let rest = text.strip_prefix(FENCE).ok_or_else(|| Error::ParseError {
        file: file.to_path_buf(),
        cause: "missing opening `---` fence".to_string(),
    })?;
    let rest = rest.strip_prefix('\n').unwrap_or(rest);

    let end = rest.find("\n---").ok_or_else(|| Error::ParseError {
        file: file.to_path_buf(),
        cause: "missing closing `---` fence".to_string(),
    })?;

    let yaml_block = &rest[..end];
    let after_fence = &rest[end + 4..];
    // Skip the rest of the closing fence line and the newline after it.
    let body = after_fence
        .find('\n')
        .map_or("", |nl| &after_fence[nl + 1..]);

    let front_matter: Value = serde_yaml::from_str(yaml_block).map_err(|e| Error::ParseError {
        file: file.to_path_buf(),
        cause: e.to_string(),
    })?;

    let mapping = match front_matter {
        Value::Mapping(m) => m,
        Value::Null => serde_yaml::Mapping::new(),
        _ => {
            return Err(Error::ParseError {
                file: file.to_path_buf(),
                cause: "front matter must be a mapping".to_string(),
            })
        }
    };

    Ok(RawDocument {
        front_matter: mapping,
        body: body.to_string(),
    })
}

/// Reconstruct an `Item` from a parsed document. `item_type` and `id` are
/// supplied by the caller (derived from the file path), since they are not
/// always present in the front matter of older files.
///
/// # Errors
///
/// Returns `ParseError` if required fields are missing or malformed.
pub fn to_item(file: &Path, item_type: &str, id: &str, doc: RawDocument) -> Result<Item> {
    let known: &[&str] = &[
        "id", "type", "title", "description", "content", "priority", "status", "status_id",
        "tags", "related", "start_date", "end_date", "start_time", "created_at", "updated_at",
    ];

    let get = |key: &str| -> Option<&Value> { doc.front_matter.get(key) };

    let title = get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ParseError {
            file: file.to_path_buf(),
            cause: "missing required field `title`".to_string(),
        })?
        .to_string();
    if title.trim().is_empty() {
        return Err(Error::ParseError {
            file: file.to_path_buf(),
            cause: "title must not be empty".to_string(),
        });
    }

    let description = get("description").and_then(Value::as_str).map(str::to_string);
    let content = get("content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| (!doc.body.trim().is_empty()).then(|| doc.body.trim_end().to_string()));

    let priority = get("priority")
        .and_then(Value::as_str)
        .map(Priority::parse)
        .unwrap_or_default();

    let status_id = get("status_id").and_then(Value::as_i64).unwrap_or(0);
    let status_name = get("status").and_then(Value::as_str).map(str::to_string).unwrap_or_default();

    let tags: BTreeSet<String> = get("tags")
        .and_then(Value::as_sequence)
        .map(|seq| {
            seq.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let related: Vec<String> = get("related")
        .and_then(Value::as_sequence)
        .map(|seq| {
            seq.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let start_date = get("start_date").and_then(Value::as_str).map(str::to_string);
    let end_date = get("end_date").and_then(Value::as_str).map(str::to_string);
    let start_time = get("start_time").and_then(Value::as_str).map(str::to_string);

    let created_at = get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let updated_at = get("updated_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(created_at);

    let mut unknown_fields = std::collections::BTreeMap::new();
    for (k, v) in &doc.front_matter {
        if let Some(key) = k.as_str() {
            if !known.contains(&key) {
                unknown_fields.insert(key.to_string(), v.clone());
            }
        }
    }

    Ok(Item {
        item_type: item_type.to_string(),
        id: id.to_string(),
        title,
        description,
        content,
        priority,
        status_id,
        status_name,
        start_date,
        end_date,
        start_time,
        tags,
        related,
        created_at,
        updated_at,
        unknown_fields,
    })
}

/// Serialize an item back to `"---\n<yaml>\n---\n<body>"`, in a
/// deterministic key order.
///
/// # Errors
///
/// Returns an error if YAML serialisation of a field fails.
pub fn emit(item: &Item) -> Result<String> {
    let mut map = serde_yaml::Mapping::new();
    map.insert(Value::from("id"), Value::from(item.id.as_str()));
    map.insert(Value::from("title"), Value::from(item.title.as_str()));
    if let Some(desc) = &item.description {
        map.insert(Value::from("description"), Value::from(desc.as_str()));
    }
    map.insert(Value::from("priority"), Value::from(item.priority.as_str()));
    map.insert(Value::from("status"), Value::from(item.status_name.as_str()));
    map.insert(
        Value::from("tags"),
        Value::Sequence(item.tags.iter().map(|t| Value::from(t.as_str())).collect()),
    );
    map.insert(
        Value::from("related"),
        Value::Sequence(item.related.iter().map(|r| Value::from(r.as_str())).collect()),
    );
    if let Some(d) = &item.start_date {
        map.insert(Value::from("start_date"), Value::from(d.as_str()));
    }
    if let Some(d) = &item.end_date {
        map.insert(Value::from("end_date"), Value::from(d.as_str()));
    }
    if let Some(t) = &item.start_time {
        map.insert(Value::from("start_time"), Value::from(t.as_str()));
    }
    map.insert(
        Value::from("created_at"),
        Value::from(item.created_at.to_rfc3339()),
    );
    map.insert(
        Value::from("updated_at"),
        Value::from(item.updated_at.to_rfc3339()),
    );
    for (k, v) in &item.unknown_fields {
        map.insert(Value::from(k.as_str()), v.clone());
    }

    let yaml = serde_yaml::to_string(&Value::Mapping(map))?;
    let body = item.content.as_deref().unwrap_or("");

    let mut out = String::new();
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(&yaml);
    out.push_str(FENCE);
    out.push('\n');
    if !body.is_empty() {
        out.push_str(body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_item() -> Item {
        let now = Utc::now();
        Item {
            item_type: "issues".to_string(),
            id: "1".to_string(),
            title: "Fix crash".to_string(),
            description: None,
            content: Some("Null ptr in parser".to_string()),
            priority: Priority::High,
            status_id: 1,
            status_name: "Open".to_string(),
            start_date: None,
            end_date: None,
            start_time: None,
            tags: ["bug", "parser"].into_iter().map(str::to_string).collect(),
            related: vec!["docs-1".to_string()],
            created_at: now,
            updated_at: now,
            unknown_fields: BTreeMap::new(),
        }
    }

    #[test]
    fn round_trips_through_emit_and_parse() {
        let item = sample_item();
        let text = emit(&item).unwrap();
        assert!(text.starts_with("---\n"));

        let doc = parse(Path::new("issues-1.md"), &text).unwrap();
        let parsed = to_item(Path::new("issues-1.md"), "issues", "1", doc).unwrap();

        assert_eq!(parsed.title, item.title);
        assert_eq!(parsed.content, item.content);
        assert_eq!(parsed.tags, item.tags);
        assert_eq!(parsed.related, item.related);
        assert_eq!(parsed.priority, item.priority);
    }

    #[test]
    fn unknown_keys_survive_round_trip() {
        let mut item = sample_item();
        item.unknown_fields
            .insert("custom_field".to_string(), Value::from("custom_value"));
        let text = emit(&item).unwrap();
        let doc = parse(Path::new("issues-1.md"), &text).unwrap();
        let parsed = to_item(Path::new("issues-1.md"), "issues", "1", doc).unwrap();
        assert_eq!(
            parsed.unknown_fields.get("custom_field").and_then(Value::as_str),
            Some("custom_value")
        );
    }

    #[test]
    fn rejects_missing_fences() {
        let err = parse(Path::new("bad.md"), "no fences here").unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
    }

    #[test]
    fn missing_title_is_rejected() {
        let doc = parse(Path::new("bad.md"), "---\nid: 1\n---\nbody").unwrap();
        let err = to_item(Path::new("bad.md"), "issues", "1", doc).unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
    }
}
