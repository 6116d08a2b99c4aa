use super::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, ModelRegistry, ModelSettings, RegistryError};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// File-based implementation of ModelRegistry
/// Loads template-to-model mappings from a YAML file
#[derive(Clone, Debug)]
pub struct FileModelRegistry {
    registry_path: PathBuf,
    default_model: String,
    default_max_tokens: u32,
}

impl FileModelRegistry {
    /// Creates a new FileModelRegistry
    ///
    /// # Arguments
    /// * `registry_path` - Optional path to registry file (defaults to "prompts/model_registry.yml")
    /// * `default_model` - Model used when a template has no entry
    /// * `default_max_tokens` - Token budget used when an entry does not set one
    pub fn new(
        registry_path: Option<PathBuf>,
        default_model: Option<String>,
        default_max_tokens: Option<u32>,
    ) -> Self {
        Self {
            registry_path: registry_path
                .unwrap_or_else(|| PathBuf::from("prompts/model_registry.yml")),
            default_model: default_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            default_max_tokens: default_max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }

    fn load_registry(&self) -> Result<HashMap<String, ModelSettings>, RegistryError> {
        if !self.registry_path.exists() {
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(&self.registry_path).map_err(|source| RegistryError::Read {
            path: self.registry_path.display().to_string(),
            source,
        })?;

        parse_registry(&content, &self.default_model, self.default_max_tokens).map_err(|details| {
            RegistryError::InvalidYaml {
                path: self.registry_path.display().to_string(),
                details,
            }
        })
    }
}

impl ModelRegistry for FileModelRegistry {
    fn get_model(&self, name: &str) -> Result<ModelSettings, RegistryError> {
        let registry = self.load_registry()?;

        Ok(registry.get(name).cloned().unwrap_or_else(|| ModelSettings {
            model: self.default_model.clone(),
            max_tokens: self.default_max_tokens,
        }))
    }
}

/// Parses the YAML registry file into a HashMap
/// Supports both a plain model name and an object with `model` and `max_tokens`
fn parse_registry(
    yaml_content: &str,
    default_model: &str,
    default_max_tokens: u32,
) -> Result<HashMap<String, ModelSettings>, String> {
    use yaml_rust::{Yaml, YamlLoader};

    let docs = YamlLoader::load_from_str(yaml_content).map_err(|e| e.to_string())?;
    let mut registry = HashMap::new();

    let Some(hash) = docs.first().and_then(|doc| doc.as_hash()) else {
        return Ok(registry);
    };

    for (key, value) in hash {
        let Some(name) = key.as_str() else {
            continue;
        };

        let settings = if let Some(model) = value.as_str() {
            ModelSettings {
                model: model.to_string(),
                max_tokens: default_max_tokens,
            }
        } else if let Some(entry) = value.as_hash() {
            let model = entry
                .get(&Yaml::String("model".to_string()))
                .and_then(|v| v.as_str())
                .unwrap_or(default_model)
                .to_string();
            let max_tokens = entry
                .get(&Yaml::String("max_tokens".to_string()))
                .and_then(|v| v.as_i64())
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(default_max_tokens);
            ModelSettings { model, max_tokens }
        } else {
            ModelSettings {
                model: default_model.to_string(),
                max_tokens: default_max_tokens,
            }
        };

        registry.insert(name.to_string(), settings);
    }

    Ok(registry)
}
