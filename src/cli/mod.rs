use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

mod render;
mod repository;

use tfharden::contexts::{
    AnalysisSession, ClosureBuilder, ExpansionDepth, OpenAiAdvisor, Reconciliation,
};
use tfharden::data::ReadFailure;
use tfharden::registries::{
    DEFAULT_TEMPLATE, FileModelRegistry, FilePromptRegistry, ModelRegistry, PromptRegistry,
};

pub use repository::default_clone_dir;

#[derive(Clone, Copy)]
pub struct Config {
    pub verbose: bool,
    pub dry_run: bool,
}

/// Options shared by the commands that build a closure.
pub struct Target {
    pub repo: PathBuf,
    pub example: PathBuf,
    pub transitive: bool,
}

pub struct EnhanceOptions {
    pub prompt: Option<String>,
    pub template: Option<String>,
    pub prompts_dir: Option<PathBuf>,
    pub apply: bool,
    pub save_response: Option<PathBuf>,
}

const DIFF_CONTEXT: usize = 3;

pub fn list_examples(repo: &Path) -> Result<()> {
    let examples = repository::list_examples(repo)?;
    if examples.is_empty() {
        println!("No examples found under {}", repo.join(repository::EXAMPLES_DIR).display());
        return Ok(());
    }
    for name in examples {
        println!("{}", name);
    }
    Ok(())
}

pub fn clone(url: &str, into: Option<PathBuf>, config: &Config) -> Result<()> {
    let target = into.unwrap_or_else(default_clone_dir);
    if config.dry_run {
        println!("Would clone {} into {}", url, target.display());
        return Ok(());
    }

    repository::clone_repository(url, &target)?;
    println!("✓ Repository cloned into {}", target.display());

    let dirs = repository::list_directories(&target)?;
    if dirs.is_empty() {
        println!("No directories found in the repository root.");
    } else {
        println!("Repository structure:");
        for name in dirs {
            println!("  {}/", name);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ClosureReport<'a> {
    repo_root: String,
    example: String,
    files: Vec<ClosureEntry>,
    expanded_modules: Vec<String>,
    read_failures: &'a [ReadFailure],
}

#[derive(Serialize)]
struct ClosureEntry {
    path: String,
    origin: &'static str,
    bytes: usize,
    sha256: String,
}

pub fn analyze(target: Target, json: bool, config: &Config) -> Result<()> {
    let session = open_session(target, config);

    if json {
        let report = closure_report(&session);
        let text = serde_json::to_string_pretty(&report).context("Failed to serialize closure")?;
        println!("{}", text);
        return Ok(());
    }

    let example_dir = session.example_dir();
    println!("Found {} Terraform file(s).", session.closure().len());
    for (path, _) in session.closure().files() {
        let origin = if path.starts_with(&example_dir) { " " } else { "+" };
        println!("  {} {}", origin, session.relative(path).display());
    }
    report_read_failures(&session);
    Ok(())
}

pub async fn enhance(target: Target, options: EnhanceOptions, config: &Config) -> Result<()> {
    let mut session = open_session(target, config);
    if session.closure().is_empty() {
        anyhow::bail!(
            "No Terraform files found in {}",
            session.example_dir().display()
        );
    }
    println!("Found {} Terraform file(s).", session.closure().len());
    report_read_failures(&session);

    let template_name = options.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
    let prompts = FilePromptRegistry::new(options.prompts_dir.clone());
    let models = FileModelRegistry::new(
        options.prompts_dir.map(|dir| dir.join("model_registry.yml")),
        None,
        None,
    );
    let template = prompts
        .get_template(template_name)
        .context("Failed to load prompt template")?;
    let mut model = models
        .get_model(template_name)
        .context("Failed to load model settings")?;
    if let Ok(overridden) = env::var("TFHARDEN_MODEL") {
        if !overridden.is_empty() {
            model.model = overridden;
        }
    }

    let request = session.advice_request(&template, &model, options.prompt.as_deref());
    if config.dry_run {
        println!("--- system ---\n{}\n", request.system_prompt);
        println!("--- user ({}) ---\n{}", request.model, request.user_prompt);
        return Ok(());
    }

    let advisor = OpenAiAdvisor::from_env()?;
    println!("Requesting security enhancements from {}...", request.model);
    let count = session
        .consult(&advisor, &request)
        .await
        .context("Security enhancement request failed")?;
    println!("✓ Security enhancements received for {} file(s).", count);
    if let Some(block) = raw_reply_block(&session, config) {
        println!("{}", block);
    }

    if let Some(dir) = options.save_response.as_deref() {
        let path = save_response(dir, &session)?;
        println!("Raw response saved to {}", path.display());
    }

    show_reconciliations(&session, config);
    if options.apply {
        apply(&session, config);
    }
    Ok(())
}

pub fn reconcile(target: Target, reply_file: &Path, apply_changes: bool, config: &Config) -> Result<()> {
    let mut session = open_session(target, config);
    let reply = fs::read_to_string(reply_file)
        .with_context(|| format!("Failed to read reply file: {}", reply_file.display()))?;

    let count = session.accept_reply(reply);
    println!(
        "Parsed {} replacement file(s) against {} Terraform file(s).",
        count,
        session.closure().len()
    );
    report_read_failures(&session);

    show_reconciliations(&session, config);
    if apply_changes {
        apply(&session, config);
    }
    Ok(())
}

fn open_session(target: Target, config: &Config) -> AnalysisSession {
    let depth = if target.transitive {
        ExpansionDepth::Transitive
    } else {
        ExpansionDepth::SingleLevel
    };
    if config.verbose {
        println!(
            "Analyzing {} in {} ({:?})",
            target.example.display(),
            target.repo.display(),
            depth
        );
    }
    AnalysisSession::analyze(ClosureBuilder::new(target.repo).with_depth(depth), target.example)
}

fn closure_report(session: &AnalysisSession) -> ClosureReport<'_> {
    let example_dir = session.example_dir();
    let files = session
        .closure()
        .files()
        .map(|(path, content)| {
            let mut hasher = Sha256::new();
            hasher.update(content.as_bytes());
            ClosureEntry {
                path: session.relative(path).display().to_string(),
                origin: if path.starts_with(&example_dir) { "example" } else { "module" },
                bytes: content.len(),
                sha256: hex::encode(hasher.finalize()),
            }
        })
        .collect();

    ClosureReport {
        repo_root: session.repo_root().display().to_string(),
        example: session.example().display().to_string(),
        files,
        expanded_modules: session
            .closure()
            .expanded_modules()
            .map(|p| session.relative(p).display().to_string())
            .collect(),
        read_failures: session.closure().read_failures(),
    }
}

fn report_read_failures(session: &AnalysisSession) {
    for failure in session.closure().read_failures() {
        eprintln!(
            "⚠ Skipped {}: {}",
            session.relative(&failure.path).display(),
            failure.reason
        );
    }
}

fn show_reconciliations(session: &AnalysisSession, config: &Config) {
    let results = session.reconcile();
    if results.is_empty() {
        println!("Nothing to show: the reply contained no FILE blocks.");
        return;
    }

    for result in &results {
        show_reconciliation(session, result, config);
    }
}

fn show_reconciliation(session: &AnalysisSession, result: &Reconciliation, config: &Config) {
    let name = &result.replacement.name;
    println!("\n{}", "=".repeat(60));

    if result.is_ambiguous() {
        println!("Updated: {}", name);
        eprintln!("⚠ {} matches several files; label it with its path to apply it:", name);
        for path in &result.ambiguous {
            eprintln!("    {}", session.relative(path).display());
        }
        println!("{}", result.replacement.content);
        return;
    }

    let (Some(original), Some(diff)) = (result.original.as_ref(), result.diff.as_ref()) else {
        println!("Updated: {}", name);
        eprintln!("⚠ Original file not found for {}", name);
        println!("{}", result.replacement.content);
        return;
    };

    let relative = session.relative(&original.path).display().to_string();
    println!("Updated: {} ({}) {}", name, relative, render::summary(diff));
    if config.verbose {
        println!("--- updated code ---\n{}\n", result.replacement.content);
    }

    let text = render::unified(
        diff,
        &format!("a/{}", relative),
        &format!("b/{}", relative),
        DIFF_CONTEXT,
    );
    if !text.is_empty() {
        print!("{}", text);
    }
}

fn apply(session: &AnalysisSession, config: &Config) {
    let report = session.apply(config.dry_run);
    let verb = if config.dry_run { "Would write" } else { "✓ Wrote" };

    println!("\n{}", "=".repeat(60));
    for path in &report.written {
        println!("{} {}", verb, session.relative(path).display());
    }
    for path in &report.unchanged {
        println!("⊚ Unchanged {}", session.relative(path).display());
    }
    for name in &report.unmatched {
        eprintln!("⚠ Not applied {}: original file not found", name);
    }
    for (name, candidates) in &report.ambiguous {
        eprintln!(
            "⚠ Not applied {}: matches {} files",
            name,
            candidates.len()
        );
    }
    for (path, reason) in &report.failed {
        eprintln!("✗ Failed to write {}: {}", session.relative(path).display(), reason);
    }
}

/// The model reply as received, shown in verbose mode.
fn raw_reply_block(session: &AnalysisSession, config: &Config) -> Option<String> {
    if !config.verbose {
        return None;
    }
    session
        .reply()
        .map(|reply| format!("--- raw response ---\n{}\n", reply))
}

fn save_response(dir: &Path, session: &AnalysisSession) -> Result<PathBuf> {
    let reply = session.reply().unwrap_or_default();
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let example = session
        .example()
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "example".to_string());
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    let path = dir.join(format!("{}-{}.md", stamp, example));

    fs::write(&path, reply).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn raw_reply_is_shown_only_when_verbose() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("examples/basic")).unwrap();
        let mut session = AnalysisSession::analyze(ClosureBuilder::new(tmp.path()), "examples/basic");
        let quiet = Config { verbose: false, dry_run: false };
        let verbose = Config { verbose: true, dry_run: false };

        assert!(raw_reply_block(&session, &verbose).is_none());

        session.accept_reply("No changes needed.".to_string());
        assert!(raw_reply_block(&session, &quiet).is_none());
        let block = raw_reply_block(&session, &verbose).unwrap();
        assert!(block.contains("No changes needed."));
    }
}
