mod model_registry;
mod prompt_registry;

pub use model_registry::FileModelRegistry;
pub use prompt_registry::FilePromptRegistry;

use thiserror::Error;

pub const DEFAULT_TEMPLATE: &str = "enhance_security";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a Terraform and AWS security expert. \
Your task is to enhance the security of Terraform configurations.";

pub const DEFAULT_INSTRUCTION: &str = "Update the VPC by adding security groups with strict \
ingress/egress rules, enable VPC flow logs, and implement network ACLs for better security.";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML in {path}: {details}")]
    InvalidYaml { path: String, details: String },
}

/// System prompt and default instruction sent with every analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub system_prompt: String,
    pub instruction: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
        }
    }
}

/// Model name and token budget for one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub model: String,
    pub max_tokens: u32,
}

/// Trait for loading prompt templates by name
pub trait PromptRegistry {
    fn get_template(&self, name: &str) -> Result<PromptTemplate, RegistryError>;
}

/// Trait for resolving model settings by template name
pub trait ModelRegistry {
    fn get_model(&self, name: &str) -> Result<ModelSettings, RegistryError>;
}
