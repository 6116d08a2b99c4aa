mod advisor;
mod closure;
mod diff_engine;
mod discovery;
mod module_refs;
mod resolver;
mod response_parser;
mod session;

pub use advisor::{AdviceRequest, AdvisorError, OpenAiAdvisor, SecurityAdvisor, build_user_prompt};
pub use closure::{ClosureBuilder, ExpansionDepth};
pub use diff_engine::{diff_lines, diff_texts};
pub use discovery::{CONFIG_SUFFIX, discover_config_files, discover_files_with_suffix};
pub use module_refs::extract_module_references;
pub use resolver::{
    REMOTE_SOURCE_PREFIXES, REPOSITORY_ROOT_SOURCE, SourceKind, classify_source, normalize_path,
    resolve_module,
};
pub use response_parser::parse_response;
pub use session::{AnalysisSession, ApplyReport, Reconciliation};
