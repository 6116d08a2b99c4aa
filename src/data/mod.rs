//! Plain data carried between the analysis steps.
//!
//! Nothing in here touches the file system; the operations that produce
//! and consume these values live in [`crate::contexts`].

mod diff;

pub use diff::{DiffOp, DiffResult, DiffTag};

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// A configuration file read from disk. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub content: String,
}

impl ConfigFile {
    /// Base file name, used to pair the file with a model-produced replacement.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// A `module "<name>" { source = "<source>" }` declaration found in a file.
///
/// `name` is only unique within the declaring file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReference {
    pub declaring_file: PathBuf,
    pub name: String,
    pub source: String,
}

/// A module source that maps to an existing path on the local file system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolvedModule {
    pub path: PathBuf,
}

/// A file that was discovered but could not be read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// The set of files needed to understand one example.
///
/// Keys of `files` are unique and keep discovery order. `expanded_modules`
/// only tracks module directories that were already expanded, so a module
/// referenced from two declaring files is read once.
#[derive(Debug, Clone, Default)]
pub struct DependencyClosure {
    files: IndexMap<PathBuf, String>,
    expanded_modules: BTreeSet<PathBuf>,
    read_failures: Vec<ReadFailure>,
}

impl DependencyClosure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a file unless its path is already present. Returns `true` when inserted.
    pub fn insert(&mut self, path: PathBuf, content: String) -> bool {
        if self.files.contains_key(&path) {
            return false;
        }
        self.files.insert(path, content);
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files in discovery order.
    pub fn files(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.files.iter().map(|(p, c)| (p.as_path(), c.as_str()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// Closure files a replacement label can refer to, in discovery order.
    ///
    /// A label with a directory part (`modules/vpc/main.tf`) selects the files
    /// whose path ends with it. A bare name, or a qualified label that no path
    /// ends with, selects every file with the same base name.
    pub fn find_matches(&self, label: &str) -> Vec<ConfigFile> {
        let label_path = Path::new(label);
        let mut matches: Vec<ConfigFile> = Vec::new();

        if label.contains('/') {
            matches = self.collect(|path| path.ends_with(label_path));
        }
        if matches.is_empty() {
            let base = label.rsplit('/').next().unwrap_or(label);
            matches = self.collect(|path| path.file_name().and_then(|n| n.to_str()) == Some(base));
        }
        matches
    }

    fn collect(&self, keep: impl Fn(&Path) -> bool) -> Vec<ConfigFile> {
        self.files
            .iter()
            .filter(|(path, _)| keep(path))
            .map(|(path, content)| ConfigFile {
                path: path.clone(),
                content: content.clone(),
            })
            .collect()
    }

    /// Marks a module directory as expanded. Returns `false` if it already was.
    pub fn mark_expanded(&mut self, dir: PathBuf) -> bool {
        self.expanded_modules.insert(dir)
    }

    pub fn is_expanded(&self, dir: &Path) -> bool {
        self.expanded_modules.contains(dir)
    }

    pub fn expanded_modules(&self) -> impl Iterator<Item = &Path> {
        self.expanded_modules.iter().map(PathBuf::as_path)
    }

    pub fn record_failure(&mut self, path: PathBuf, reason: String) {
        self.read_failures.push(ReadFailure { path, reason });
    }

    pub fn read_failures(&self) -> &[ReadFailure] {
        &self.read_failures
    }
}

/// Replacement content proposed for one file.
///
/// `name` is the label from the reply's `FILE:` line, with `/` separators.
/// It is either a bare file name or a path such as `modules/vpc/main.tf`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplacementFile {
    pub name: String,
    pub content: String,
}

impl ReplacementFile {
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// `FILE:` label -> replacement content, in order of first appearance.
pub type Replacements = IndexMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_first_content_and_order() {
        let mut closure = DependencyClosure::new();
        assert!(closure.insert(PathBuf::from("/r/b.tf"), "b".to_string()));
        assert!(closure.insert(PathBuf::from("/r/a.tf"), "a".to_string()));
        assert!(!closure.insert(PathBuf::from("/r/b.tf"), "other".to_string()));

        let order: Vec<&Path> = closure.paths().collect();
        assert_eq!(order, vec![Path::new("/r/b.tf"), Path::new("/r/a.tf")]);
        assert_eq!(closure.get(Path::new("/r/b.tf")), Some("b"));
    }

    fn two_main_files() -> DependencyClosure {
        let mut closure = DependencyClosure::new();
        closure.insert(PathBuf::from("/r/examples/basic/main.tf"), "example".to_string());
        closure.insert(PathBuf::from("/r/modules/vpc/main.tf"), "module".to_string());
        closure.insert(PathBuf::from("/r/modules/vpc/outputs.tf"), "outputs".to_string());
        closure
    }

    #[test]
    fn bare_label_matches_every_file_with_that_name() {
        let closure = two_main_files();
        let found = closure.find_matches("main.tf");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].content, "example");
        assert_eq!(found[1].content, "module");

        assert_eq!(closure.find_matches("outputs.tf").len(), 1);
        assert!(closure.find_matches("versions.tf").is_empty());
    }

    #[test]
    fn qualified_label_selects_path_suffix() {
        let closure = two_main_files();
        let module = closure.find_matches("modules/vpc/main.tf");
        assert_eq!(module.len(), 1);
        assert_eq!(module[0].content, "module");

        let example = closure.find_matches("basic/main.tf");
        assert_eq!(example.len(), 1);
        assert_eq!(example[0].content, "example");
    }

    #[test]
    fn qualified_label_without_suffix_match_falls_back_to_base_name() {
        let closure = two_main_files();
        assert_eq!(closure.find_matches("vpc-module/outputs.tf").len(), 1);
        assert_eq!(closure.find_matches("elsewhere/main.tf").len(), 2);
    }

    #[test]
    fn replacement_file_name_is_last_segment() {
        let file = ReplacementFile {
            name: "modules/vpc/main.tf".to_string(),
            content: String::new(),
        };
        assert_eq!(file.file_name(), "main.tf");
    }

    #[test]
    fn mark_expanded_is_idempotent() {
        let mut closure = DependencyClosure::new();
        assert!(closure.mark_expanded(PathBuf::from("/r/modules/vpc")));
        assert!(!closure.mark_expanded(PathBuf::from("/r/modules/vpc")));
        assert!(closure.is_expanded(Path::new("/r/modules/vpc")));
    }
}
