use super::discovery::discover_config_files;
use super::module_refs::extract_module_references;
use super::resolver::{normalize_path, resolve_module};
use crate::data::DependencyClosure;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How far module references are followed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpansionDepth {
    /// Only references declared in the example's own files are expanded.
    #[default]
    SingleLevel,
    /// References found in expanded module files are followed too, until no
    /// new module directory turns up.
    Transitive,
}

/// Builds the closure of configuration files needed to understand one example.
#[derive(Debug, Clone)]
pub struct ClosureBuilder {
    repo_root: PathBuf,
    depth: ExpansionDepth,
}

impl ClosureBuilder {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        let absolute = std::path::absolute(&repo_root).unwrap_or(repo_root);
        Self {
            repo_root: normalize_path(&absolute),
            depth: ExpansionDepth::default(),
        }
    }

    pub fn with_depth(mut self, depth: ExpansionDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Path relative to the repository root, for display.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.repo_root).unwrap_or(path)
    }

    /// Collects the example's files, then the files of every local module they reference.
    ///
    /// Never fails: missing directories give an empty closure, unresolvable
    /// modules are left out, and files that cannot be read are recorded as
    /// read failures on the closure.
    pub fn build(&self, example: impl AsRef<Path>) -> DependencyClosure {
        let example_dir = normalize_path(&self.repo_root.join(example.as_ref()));
        let mut closure = DependencyClosure::new();
        let mut pending = Vec::new();

        for path in discover_config_files(&example_dir) {
            if read_into(&mut closure, path.clone()) {
                pending.push(path);
            }
        }
        info!(
            example = %example_dir.display(),
            files = closure.len(),
            "read example files"
        );

        while !pending.is_empty() {
            let scanned = std::mem::take(&mut pending);

            for file in scanned {
                let references = match closure.get(&file) {
                    Some(content) => extract_module_references(&file, content),
                    None => continue,
                };

                for reference in references {
                    let Some(module) = resolve_module(&reference, &self.repo_root) else {
                        continue;
                    };
                    if !module.path.is_dir() {
                        debug!(path = %module.path.display(), "module source is not a directory");
                        continue;
                    }
                    if !closure.mark_expanded(module.path.clone()) {
                        continue;
                    }

                    debug!(
                        module = %reference.name,
                        path = %module.path.display(),
                        "expanding module"
                    );
                    for module_file in discover_config_files(&module.path) {
                        if closure.contains(&module_file) {
                            continue;
                        }
                        if read_into(&mut closure, module_file.clone())
                            && self.depth == ExpansionDepth::Transitive
                        {
                            pending.push(module_file);
                        }
                    }
                }
            }

            if self.depth == ExpansionDepth::SingleLevel {
                break;
            }
        }

        info!(
            files = closure.len(),
            modules = closure.expanded_modules().count(),
            gaps = closure.read_failures().len(),
            "dependency closure complete"
        );
        closure
    }
}

/// Reads `path` into the closure, substituting undecodable bytes.
/// A read error is recorded as a gap and the file is skipped.
fn read_into(closure: &mut DependencyClosure, path: PathBuf) -> bool {
    match fs::read(&path) {
        Ok(bytes) => {
            let content = String::from_utf8_lossy(&bytes).into_owned();
            closure.insert(path, content)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable file");
            closure.record_failure(path, e.to_string());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    fn relative_paths(builder: &ClosureBuilder, closure: &DependencyClosure) -> Vec<String> {
        closure
            .paths()
            .map(|p| builder.relative(p).to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn example_with_one_local_module() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path();
        write(
            root,
            "examples/basic/main.tf",
            "module \"vpc\" {\n  source = \"../../modules/vpc\"\n}\n",
        );
        write(root, "modules/vpc/main.tf", "resource \"aws_vpc\" \"this\" {}\n");

        let builder = ClosureBuilder::new(root);
        let closure = builder.build("examples/basic");

        assert_eq!(
            relative_paths(&builder, &closure),
            vec!["examples/basic/main.tf", "modules/vpc/main.tf"]
        );
    }

    #[test]
    fn module_referenced_twice_is_read_once() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path();
        write(root, "examples/e/a.tf", r#"module "one" { source = "../../modules/shared" }"#);
        write(root, "examples/e/b.tf", r#"module "two" { source = "modules/shared" }"#);
        write(root, "modules/shared/main.tf", "locals {}\n");
        write(root, "modules/shared/outputs.tf", "output \"x\" { value = 1 }\n");

        let builder = ClosureBuilder::new(root);
        let closure = builder.build("examples/e");

        assert_eq!(
            relative_paths(&builder, &closure),
            vec![
                "examples/e/a.tf",
                "examples/e/b.tf",
                "modules/shared/main.tf",
                "modules/shared/outputs.tf",
            ]
        );
        assert_eq!(closure.expanded_modules().count(), 1);
    }

    #[test]
    fn rebuilding_is_idempotent() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path();
        write(root, "examples/e/main.tf", r#"module "m" { source = "../../modules/m" }"#);
        write(root, "modules/m/b.tf", "b");
        write(root, "modules/m/a.tf", "a");

        let builder = ClosureBuilder::new(root);
        let first: Vec<(PathBuf, String)> = builder
            .build("examples/e")
            .files()
            .map(|(p, c)| (p.to_path_buf(), c.to_string()))
            .collect();
        let second: Vec<(PathBuf, String)> = builder
            .build("examples/e")
            .files()
            .map(|(p, c)| (p.to_path_buf(), c.to_string()))
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn remote_sources_contribute_nothing() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path();
        write(
            root,
            "examples/e/main.tf",
            r#"
module "a" { source = "github.com/org/vpc" }
module "b" { source = "git::vpc" }
"#,
        );
        write(root, "github.com/org/vpc/main.tf", "remote");
        write(root, "git::vpc/main.tf", "remote");

        let builder = ClosureBuilder::new(root);
        let closure = builder.build("examples/e");
        assert_eq!(relative_paths(&builder, &closure), vec!["examples/e/main.tf"]);
    }

    #[test]
    fn missing_example_gives_empty_closure() {
        let tmp = TempDir::new().expect("tempdir");
        let closure = ClosureBuilder::new(tmp.path()).build("examples/none");
        assert!(closure.is_empty());
        assert!(closure.read_failures().is_empty());
    }

    #[test]
    fn repository_root_module_does_not_duplicate_example_files() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path();
        write(root, "main.tf", "resource \"aws_vpc\" \"this\" {}\n");
        write(root, "examples/simple/main.tf", r#"module "root" { source = "../../" }"#);

        let builder = ClosureBuilder::new(root);
        let closure = builder.build("examples/simple");
        assert_eq!(
            relative_paths(&builder, &closure),
            vec!["examples/simple/main.tf", "main.tf"]
        );
    }

    #[test]
    fn single_level_does_not_follow_nested_modules() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path();
        write(root, "examples/e/main.tf", r#"module "outer" { source = "../../modules/outer" }"#);
        write(root, "modules/outer/main.tf", r#"module "inner" { source = "../inner" }"#);
        write(root, "modules/inner/main.tf", "inner");

        let builder = ClosureBuilder::new(root);
        let closure = builder.build("examples/e");
        assert_eq!(
            relative_paths(&builder, &closure),
            vec!["examples/e/main.tf", "modules/outer/main.tf"]
        );
    }

    #[test]
    fn transitive_follows_nested_modules_and_survives_cycles() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path();
        write(root, "examples/e/main.tf", r#"module "outer" { source = "../../modules/outer" }"#);
        write(root, "modules/outer/main.tf", r#"module "inner" { source = "../inner" }"#);
        write(root, "modules/inner/main.tf", r#"module "back" { source = "../outer" }"#);

        let builder = ClosureBuilder::new(root).with_depth(ExpansionDepth::Transitive);
        let closure = builder.build("examples/e");
        assert_eq!(
            relative_paths(&builder, &closure),
            vec![
                "examples/e/main.tf",
                "modules/outer/main.tf",
                "modules/inner/main.tf",
            ]
        );
        assert_eq!(closure.expanded_modules().count(), 2);
    }

    #[test]
    fn undecodable_bytes_are_substituted() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path();
        fs::create_dir_all(root.join("examples/e")).expect("mkdir");
        fs::write(root.join("examples/e/main.tf"), b"name = \"\xff\xfe\"\n").expect("write");

        let builder = ClosureBuilder::new(root);
        let closure = builder.build("examples/e");
        let (_, content) = closure.files().next().expect("one file");
        assert!(content.contains('\u{FFFD}'));
    }

    #[test]
    fn unreadable_file_is_recorded_as_gap() {
        let tmp = TempDir::new().expect("tempdir");
        let mut closure = DependencyClosure::new();
        let missing = tmp.path().join("vanished.tf");

        assert!(!read_into(&mut closure, missing.clone()));
        assert!(closure.is_empty());
        assert_eq!(closure.read_failures().len(), 1);
        assert_eq!(closure.read_failures()[0].path, missing);
    }
}
