use super::advisor::{AdviceRequest, AdvisorError, SecurityAdvisor, build_user_prompt};
use super::closure::ClosureBuilder;
use super::diff_engine::diff_texts;
use super::resolver::normalize_path;
use super::response_parser::parse_response;
use crate::data::{ConfigFile, DependencyClosure, DiffResult, ReplacementFile, Replacements};
use crate::registries::{ModelSettings, PromptTemplate};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One replacement paired with the file it is meant to replace.
///
/// `original` and `diff` are set only when the label picks exactly one
/// closure file. When it picks several, they are listed in `ambiguous`.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub replacement: ReplacementFile,
    pub original: Option<ConfigFile>,
    pub diff: Option<DiffResult>,
    pub ambiguous: Vec<PathBuf>,
}

impl Reconciliation {
    pub fn is_matched(&self) -> bool {
        self.original.is_some()
    }

    pub fn is_ambiguous(&self) -> bool {
        !self.ambiguous.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ApplyReport {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub unmatched: Vec<String>,
    pub ambiguous: Vec<(String, Vec<PathBuf>)>,
    pub failed: Vec<(PathBuf, String)>,
}

/// State of a single analysis run: the closure, the raw model reply and
/// the replacements parsed from it.
///
/// Built fresh for every run and dropped afterwards; a new reply replaces
/// the previous one wholesale.
#[derive(Debug)]
pub struct AnalysisSession {
    builder: ClosureBuilder,
    example: PathBuf,
    closure: DependencyClosure,
    reply: Option<String>,
    replacements: Replacements,
}

impl AnalysisSession {
    /// Builds the dependency closure for `example` (relative to the builder's root).
    pub fn analyze(builder: ClosureBuilder, example: impl Into<PathBuf>) -> Self {
        let example = example.into();
        let closure = builder.build(&example);
        Self {
            builder,
            example,
            closure,
            reply: None,
            replacements: Replacements::new(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        self.builder.repo_root()
    }

    pub fn example(&self) -> &Path {
        &self.example
    }

    /// Absolute, normalized example directory.
    pub fn example_dir(&self) -> PathBuf {
        normalize_path(&self.repo_root().join(&self.example))
    }

    pub fn closure(&self) -> &DependencyClosure {
        &self.closure
    }

    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        self.builder.relative(path)
    }

    pub fn reply(&self) -> Option<&str> {
        self.reply.as_deref()
    }

    pub fn replacements(&self) -> &Replacements {
        &self.replacements
    }

    pub fn advice_request(
        &self,
        template: &PromptTemplate,
        model: &ModelSettings,
        instruction: Option<&str>,
    ) -> AdviceRequest {
        let instruction = instruction.unwrap_or(&template.instruction);
        AdviceRequest {
            system_prompt: template.system_prompt.clone(),
            user_prompt: build_user_prompt(
                self.closure
                    .files()
                    .map(|(path, content)| (self.relative(path), content)),
                instruction,
            ),
            model: model.model.clone(),
            max_tokens: model.max_tokens,
        }
    }

    /// Sends the request to the advisor and keeps its reply.
    pub async fn consult<A: SecurityAdvisor>(
        &mut self,
        advisor: &A,
        request: &AdviceRequest,
    ) -> Result<usize, AdvisorError> {
        let reply = advisor.advise(request).await?;
        Ok(self.accept_reply(reply))
    }

    /// Replaces the stored reply and its parsed replacements. Returns how many
    /// replacement files the reply contained.
    pub fn accept_reply(&mut self, reply: String) -> usize {
        self.replacements = parse_response(&reply);
        self.reply = Some(reply);
        info!(files = self.replacements.len(), "parsed replacement files");
        self.replacements.len()
    }

    /// Pairs every replacement with its original.
    ///
    /// A label with a directory part is matched against the end of the
    /// closure paths, a bare label by base file name. A label matching
    /// several files is reported as ambiguous instead of guessing.
    pub fn reconcile(&self) -> Vec<Reconciliation> {
        self.replacements
            .iter()
            .map(|(name, content)| {
                let replacement = ReplacementFile {
                    name: name.clone(),
                    content: content.clone(),
                };
                let mut matches = self.closure.find_matches(name);

                if matches.len() > 1 {
                    warn!(file = %name, candidates = matches.len(), "replacement matches several files");
                    return Reconciliation {
                        replacement,
                        original: None,
                        diff: None,
                        ambiguous: matches.into_iter().map(|file| file.path).collect(),
                    };
                }

                let original = matches.pop();
                if original.is_none() {
                    warn!(file = %name, "original not found for replacement");
                }
                let diff = original
                    .as_ref()
                    .map(|file| diff_texts(&file.content, content));
                Reconciliation {
                    replacement,
                    original,
                    diff,
                    ambiguous: Vec::new(),
                }
            })
            .collect()
    }

    /// Writes matched replacements over their originals.
    ///
    /// Unchanged files are left alone. Unmatched and ambiguous replacements
    /// are never written; they are reported, as are write failures, without
    /// stopping the remaining files.
    pub fn apply(&self, dry_run: bool) -> ApplyReport {
        let mut report = ApplyReport::default();

        for reconciliation in self.reconcile() {
            if reconciliation.is_ambiguous() {
                report
                    .ambiguous
                    .push((reconciliation.replacement.name, reconciliation.ambiguous));
                continue;
            }
            let (Some(original), Some(diff)) = (reconciliation.original, reconciliation.diff) else {
                report.unmatched.push(reconciliation.replacement.name);
                continue;
            };
            if diff.is_unchanged() {
                report.unchanged.push(original.path);
                continue;
            }

            let mut content = reconciliation.replacement.content;
            if original.content.ends_with('\n') && !content.ends_with('\n') {
                content.push('\n');
            }

            if dry_run {
                report.written.push(original.path);
                continue;
            }

            match fs::write(&original.path, content) {
                Ok(()) => {
                    info!(path = %original.path.display(), "applied replacement");
                    report.written.push(original.path);
                }
                Err(e) => {
                    warn!(path = %original.path.display(), error = %e, "failed to write replacement");
                    report.failed.push((original.path, e.to_string()));
                }
            }
        }

        report
    }
}
