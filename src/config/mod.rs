//! Configuration resolution: data root, index path, and test-mode isolation.
//!
//! Resolution priority layers an explicit CLI flag over an environment
//! variable over a sensible default, rooted at a single data directory
//! rather than a global DB plus per-project export dirs.

use std::path::{Path, PathBuf};

/// Default application directory name under the user's home.
const APP_DIR: &str = ".kbe";

/// Check if test mode is enabled via `KB_TEST_DB`.
///
/// Any non-empty value other than `"0"` or a case-insensitive `"false"`
/// enables test mode, redirecting all operations to an isolated directory.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("KB_TEST_DB")
        .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
        .unwrap_or(false)
}

/// The global `~/.kbe` directory, if the home directory can be determined.
#[must_use]
pub fn global_app_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(APP_DIR))
}

/// Resolve the data root directory.
///
/// Priority:
/// 1. `explicit` (e.g. a CLI `--data-dir` flag).
/// 2. `KB_DATA_DIR` environment variable.
/// 3. `KB_TEST_DB` test mode → `~/.kbe/test/data`.
/// 4. Default: `~/.kbe/data`.
#[must_use]
pub fn resolve_data_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(dir) = std::env::var("KB_DATA_DIR") {
        if !dir.trim().is_empty() {
            return Some(PathBuf::from(dir));
        }
    }

    if is_test_mode() {
        return global_app_dir().map(|dir| dir.join("test").join("data"));
    }

    global_app_dir().map(|dir| dir.join("data"))
}

/// Resolve the index (SQLite) file path.
///
/// Priority:
/// 1. `explicit` (e.g. a CLI `--database-url` flag, accepting a bare path or
///    a `file:` URL as `DATABASE_URL` does).
/// 2. `KB_DATABASE_URL` environment variable.
/// 3. `<data_root>/search.db`, where `data_root` is resolved via
///    [`resolve_data_dir`].
#[must_use]
pub fn resolve_database_path(explicit: Option<&Path>, data_root: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return strip_file_scheme(path);
    }

    if let Ok(url) = std::env::var("KB_DATABASE_URL") {
        if !url.trim().is_empty() {
            return strip_file_scheme(Path::new(&url));
        }
    }

    data_root.join("search.db")
}

fn strip_file_scheme(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("file:") {
        PathBuf::from(rest)
    } else {
        path.to_path_buf()
    }
}

/// Default actor name recorded on audit events, for operations issued
/// without an explicit actor (e.g. direct CLI invocation).
///
/// Priority: `KB_ACTOR` env var, then `USER`, then `"unknown"`.
#[must_use]
pub fn default_actor() -> String {
    if let Ok(actor) = std::env::var("KB_ACTOR") {
        if !actor.is_empty() {
            return actor;
        }
    }
    if let Ok(user) = std::env::var("USER") {
        if !user.is_empty() {
            return user;
        }
    }
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_data_dir_wins() {
        let explicit = PathBuf::from("/custom/data");
        assert_eq!(resolve_data_dir(Some(&explicit)), Some(explicit));
    }

    #[test]
    fn database_path_defaults_under_data_root() {
        let root = PathBuf::from("/data");
        assert_eq!(
            resolve_database_path(None, &root),
            PathBuf::from("/data/search.db")
        );
    }

    #[test]
    fn database_path_strips_file_scheme() {
        let root = PathBuf::from("/data");
        let explicit = PathBuf::from("file:/custom/search.db");
        assert_eq!(
            resolve_database_path(Some(&explicit), &root),
            PathBuf::from("/custom/search.db")
        );
    }

    #[test]
    fn default_actor_never_empty() {
        assert!(!default_actor().is_empty());
    }
}
