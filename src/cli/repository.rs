use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const EXAMPLES_DIR: &str = "examples";

/// Default clone target: `<tmp>/terraform_repo`.
pub fn default_clone_dir() -> PathBuf {
    std::env::temp_dir().join("terraform_repo")
}

/// Clones `url` into `target`, replacing whatever was there.
pub fn clone_repository(url: &str, target: &Path) -> Result<()> {
    if target.exists() {
        fs::remove_dir_all(target)
            .with_context(|| format!("Failed to remove existing directory: {}", target.display()))?;
    }
    fs::create_dir_all(target)
        .with_context(|| format!("Failed to create directory: {}", target.display()))?;

    let output = Command::new("git")
        .arg("clone")
        .arg(url)
        .arg(target)
        .output()
        .context("Failed to run git clone")?;

    if !output.status.success() {
        anyhow::bail!(
            "Error cloning repository: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(())
}

/// Names of the immediate sub-directories of `dir`, sorted. Missing dir gives none.
pub fn list_directories(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Example names under `<repo>/examples`.
pub fn list_examples(repo: &Path) -> Result<Vec<String>> {
    list_directories(&repo.join(EXAMPLES_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lists_example_directories_only() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("examples/complete")).unwrap();
        fs::create_dir_all(tmp.path().join("examples/basic")).unwrap();
        fs::write(tmp.path().join("examples/README.md"), "").unwrap();

        assert_eq!(list_examples(tmp.path()).unwrap(), vec!["basic", "complete"]);
    }

    #[test]
    fn missing_examples_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(list_examples(tmp.path()).unwrap().is_empty());
    }
}
