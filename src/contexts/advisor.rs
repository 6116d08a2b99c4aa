use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::future::Future;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("OPENAI_API_KEY is not set; add it to the environment or a .env file")]
    MissingApiKey,
    #[error("language model request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("language model returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected language model response: {0}")]
    InvalidResponse(String),
}

/// Everything the language model is sent for one analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AdviceRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub max_tokens: u32,
}

/// Produces a rewrite suggestion for a set of configuration files.
///
/// The reply is plain text expected to contain `FILE: <name>` + fenced block
/// pairs; anything else in it is ignored downstream.
pub trait SecurityAdvisor {
    fn advise(
        &self,
        request: &AdviceRequest,
    ) -> impl Future<Output = Result<String, AdvisorError>> + Send;
}

/// Formats the closure files as labelled code blocks, followed by the
/// instruction and the reply format the parser understands.
///
/// Files are labelled with their path as given, using `/` separators;
/// callers pass paths relative to the repository root so the model can
/// tell same-named files apart.
pub fn build_user_prompt<'a>(
    files: impl IntoIterator<Item = (&'a Path, &'a str)>,
    instruction: &str,
) -> String {
    let mut prompt =
        String::from("I have the following Terraform files that define AWS infrastructure:\n\n");

    for (path, content) in files {
        let name = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        prompt.push_str(&format!("File: {}\n```hcl\n{}\n```\n\n", name, content));
    }

    prompt.push_str(&format!("\n{}\n\n", instruction.trim()));
    prompt.push_str(
        "Please update the Terraform code to enhance security. \
         Return only the modified files, labelled with the same paths as above, \
         in the following format:\n\n\
         FILE: <path>\n```hcl\n<updated content>\n```\n\n\
         FILE: <another path>\n```hcl\n<updated content>\n```",
    );
    prompt
}

/// Chat-completions client for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiAdvisor {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiAdvisor {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// Reads `OPENAI_API_KEY` and the optional `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, AdvisorError> {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AdvisorError::MissingApiKey)?;
        let base_url = env::var("OPENAI_BASE_URL").ok().filter(|u| !u.is_empty());
        Ok(Self::new(api_key, base_url))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl SecurityAdvisor for OpenAiAdvisor {
    async fn advise(&self, request: &AdviceRequest) -> Result<String, AdvisorError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);
        info!(model = %request.model, prompt_bytes = request.user_prompt.len(), "requesting security rewrite");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(status = status.as_u16(), bytes = text.len(), "language model responded");

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(AdvisorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| AdvisorError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AdvisorError::InvalidResponse("no choices in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_labels_files_by_relative_path() {
        let files = [
            (Path::new("examples/basic/main.tf"), "module \"vpc\" {}"),
            (Path::new("modules/vpc/main.tf"), "resource \"aws_vpc\" \"this\" {}"),
        ];
        let prompt = build_user_prompt(files, "  Enable flow logs.  ");

        assert!(prompt.contains("File: examples/basic/main.tf\n```hcl\nmodule \"vpc\" {}\n```"));
        assert!(prompt.contains("File: modules/vpc/main.tf\n```hcl\nresource \"aws_vpc\" \"this\" {}\n```"));
        assert!(prompt.contains("\nEnable flow logs.\n"));
        assert!(prompt.ends_with("FILE: <another path>\n```hcl\n<updated content>\n```"));
    }

    #[test]
    fn base_url_is_trimmed() {
        let advisor = OpenAiAdvisor::new("k".to_string(), Some("http://localhost:8080/v1/".to_string()));
        assert_eq!(advisor.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn chat_response_without_content_is_rejected() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).expect("json");
        assert!(parsed.choices[0].message.content.is_none());
    }
}
