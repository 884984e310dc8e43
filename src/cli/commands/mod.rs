//! Command implementations.

pub mod completions;
pub mod init;
pub mod search;
pub mod version;

use std::path::{Path, PathBuf};

/// Resolve the knowledge-base path: explicit flag, then the
/// `LOREBASE_DB` environment variable (handled by clap), then the
/// global default under the home directory.
#[must_use]
pub fn resolve_db_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    directories::BaseDirs::new().map(|base| base.home_dir().join(".lorebase").join("kb.db"))
}
