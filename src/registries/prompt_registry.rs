use super::{PromptRegistry, PromptTemplate, RegistryError};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// File-based implementation of PromptRegistry
/// Loads templates from `<dir>/<name>.yml`, falling back to the built-in template
#[derive(Clone, Debug)]
pub struct FilePromptRegistry {
    prompts_dir: PathBuf,
}

impl FilePromptRegistry {
    /// Creates a new FilePromptRegistry
    ///
    /// # Arguments
    /// * `prompts_dir` - Optional path to the prompts directory (defaults to "prompts")
    pub fn new(prompts_dir: Option<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.unwrap_or_else(|| PathBuf::from("prompts")),
        }
    }
}

impl PromptRegistry for FilePromptRegistry {
    fn get_template(&self, name: &str) -> Result<PromptTemplate, RegistryError> {
        let path = self.prompts_dir.join(format!("{}.yml", name));

        if !path.exists() {
            debug!(path = %path.display(), "no prompt file, using built-in template");
            return Ok(PromptTemplate::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| RegistryError::Read {
            path: path.display().to_string(),
            source,
        })?;

        parse_template(&content).map_err(|details| RegistryError::InvalidYaml {
            path: path.display().to_string(),
            details,
        })
    }
}

/// Reads `system_prompt` and `instruction`; either may be omitted.
fn parse_template(yaml_content: &str) -> Result<PromptTemplate, String> {
    use yaml_rust::YamlLoader;

    let docs = YamlLoader::load_from_str(yaml_content).map_err(|e| e.to_string())?;
    let mut template = PromptTemplate::default();

    let Some(doc) = docs.first() else {
        return Ok(template);
    };

    if let Some(system_prompt) = doc["system_prompt"].as_str() {
        template.system_prompt = system_prompt.trim().to_string();
    }
    if let Some(instruction) = doc["instruction"].as_str() {
        template.instruction = instruction.trim().to_string();
    }

    Ok(template)
}
