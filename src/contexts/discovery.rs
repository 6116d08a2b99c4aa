use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File name suffix of the configuration files followed by the closure.
pub const CONFIG_SUFFIX: &str = ".tf";

/// Recursively lists configuration files below `dir`, in lexical path order.
pub fn discover_config_files(dir: &Path) -> Vec<PathBuf> {
    discover_files_with_suffix(dir, CONFIG_SUFFIX)
}

/// Recursively lists files below `dir` whose name ends with `suffix`.
///
/// A missing directory yields an empty list. Entries that cannot be walked
/// (permissions, races with deletion) are skipped with a warning.
pub fn discover_files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "discovery target is not a directory");
        return Vec::new();
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(suffix) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    debug!(dir = %dir.display(), count = files.len(), "discovered configuration files");
    files
}
