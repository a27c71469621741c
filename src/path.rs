//! Path resolution and ID validation (C2).
//!
//! Maps `(type, id)` pairs to file paths under the data root and rejects
//! any id that could escape it.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Pattern every id must match once traversal characters have been ruled out.
static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("static regex"));

/// Reject ids that could be used for path traversal or are otherwise unsafe.
///
/// Applied to every id string before it is used to compose a path.
pub fn validate_id(id: &str) -> Result<()> {
    let reject = id.is_empty()
        || id == "."
        || id.contains("..")
        || id.contains('/')
        || id.contains('\\')
        || id.contains('\0')
        || id.contains('%')
        || Path::new(id).is_absolute()
        || !ID_PATTERN.is_match(id);

    if reject {
        return Err(Error::InvalidId { id: id.to_string() });
    }
    Ok(())
}

/// Extract the `YYYY-MM-DD` date prefix from a session id (`YYYY-MM-DD-HH.MM.SS.mmm`).
///
/// # Errors
///
/// Returns `InvalidId` if the id does not start with a well-formed date.
pub fn session_date_prefix(id: &str) -> Result<String> {
    if id.len() < 10 || id.as_bytes().get(4) != Some(&b'-') || id.as_bytes().get(7) != Some(&b'-')
    {
        return Err(Error::InvalidId { id: id.to_string() });
    }
    Ok(id[..10].to_string())
}

/// Resolve the on-disk path for an item of `item_type` with `id`, rooted at `data_root`.
///
/// # Errors
///
/// Returns `InvalidId` if either `item_type` or `id` fails validation.
pub fn resolve(data_root: &Path, item_type: &str, id: &str) -> Result<PathBuf> {
    validate_id(item_type)?;
    validate_id(id)?;

    match item_type {
        "sessions" => {
            let date = session_date_prefix(id)?;
            Ok(data_root
                .join("sessions")
                .join(&date)
                .join(format!("sessions-{id}.md")))
        }
        "dailies" => {
            // `id` for dailies is itself the date, e.g. 2025-01-15.
            Ok(data_root
                .join("sessions")
                .join(id)
                .join(format!("dailies-{id}.md")))
        }
        _ => Ok(data_root
            .join(item_type)
            .join(format!("{item_type}-{id}.md"))),
    }
}

/// Directory under the data root that holds files for `item_type`.
#[must_use]
pub fn type_dir(data_root: &Path, item_type: &str) -> PathBuf {
    if item_type == "sessions" || item_type == "dailies" {
        data_root.join("sessions")
    } else {
        data_root.join(item_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal() {
        for bad in [
            "..", "../x", "a/b", "a\\b", "a%20b", "a\0b", ".", "/etc/passwd",
        ] {
            assert!(validate_id(bad).is_err(), "expected {bad} to be rejected");
        }
    }

    #[test]
    fn accepts_plain_ids() {
        for good in ["1", "42", "2025-01-15", "2025-01-15-10.30.00.123", "my_type"] {
            assert!(validate_id(good).is_ok(), "expected {good} to be accepted");
        }
    }

    #[test]
    fn resolves_auto_numbered() {
        let root = Path::new("/data");
        assert_eq!(
            resolve(root, "issues", "7").unwrap(),
            PathBuf::from("/data/issues/issues-7.md")
        );
    }

    #[test]
    fn resolves_sessions_and_dailies() {
        let root = Path::new("/data");
        assert_eq!(
            resolve(root, "sessions", "2025-01-15-10.30.00.123").unwrap(),
            PathBuf::from("/data/sessions/2025-01-15/sessions-2025-01-15-10.30.00.123.md")
        );
        assert_eq!(
            resolve(root, "dailies", "2025-01-15").unwrap(),
            PathBuf::from("/data/sessions/2025-01-15/dailies-2025-01-15.md")
        );
    }

    #[test]
    fn rejects_malformed_session_id() {
        let root = Path::new("/data");
        assert!(resolve(root, "sessions", "not-a-date").is_err());
    }
}
