use crate::data::{ModuleReference, ResolvedModule};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Source prefixes that address remote or registry-hosted modules.
pub const REMOTE_SOURCE_PREFIXES: &[&str] = &[
    "github.com",
    "bitbucket.org",
    "git::",
    "hg::",
    "s3::",
    "gcs::",
    "http://",
    "https://",
    "git@",
];

/// Source string that always maps to the repository root.
pub const REPOSITORY_ROOT_SOURCE: &str = "../../";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Exactly `../../`.
    RepositoryRoot,
    /// Starts with `./` or `../`; relative to the declaring file's directory.
    Relative,
    /// Anything else that is not remote; relative to the repository root.
    RootRelative,
    /// Never followed.
    Remote,
}

pub fn classify_source(source: &str) -> SourceKind {
    if source == REPOSITORY_ROOT_SOURCE {
        SourceKind::RepositoryRoot
    } else if source.starts_with("./") || source.starts_with("../") {
        SourceKind::Relative
    } else if REMOTE_SOURCE_PREFIXES
        .iter()
        .any(|prefix| source.starts_with(prefix))
    {
        SourceKind::Remote
    } else {
        SourceKind::RootRelative
    }
}

/// Maps a module reference to an existing local path.
///
/// Returns `None` for remote sources and for local sources that do not exist.
pub fn resolve_module(reference: &ModuleReference, repo_root: &Path) -> Option<ResolvedModule> {
    let base_dir = reference
        .declaring_file
        .parent()
        .unwrap_or_else(|| Path::new(""));

    let candidate = match classify_source(&reference.source) {
        SourceKind::RepositoryRoot => normalize_path(repo_root),
        SourceKind::Relative => normalize_path(&base_dir.join(&reference.source)),
        SourceKind::RootRelative => normalize_path(&repo_root.join(&reference.source)),
        SourceKind::Remote => {
            debug!(module = %reference.name, source = %reference.source, "skipping remote module source");
            return None;
        }
    };

    if !candidate.exists() {
        debug!(
            module = %reference.name,
            source = %reference.source,
            path = %candidate.display(),
            "module source does not exist locally"
        );
        return None;
    }

    Some(ResolvedModule { path: candidate })
}

/// Collapses `.` and `..` segments without touching the file system.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            Component::Normal(part) => normalized.push(part),
        }
    }

    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}
