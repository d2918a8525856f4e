//! Text-generation client.
//!
//! `TextGenerator` is the seam the note generator talks to. The production
//! implementation calls the Anthropic Messages API.

use crate::config::GeneratorConfig;
use crate::error::{TaskError, TaskOutput};
use crate::notes::usage::TokenUsage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Generated text plus the tokens it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Something that turns a system prompt and a user prompt into text.
pub trait TextGenerator {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> TaskOutput<Completion>;
}

/// Messages API request body.
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Messages API response body.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: ResponseUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    input_tokens: u64,
    output_tokens: u64,
}

impl MessagesResponse {
    fn into_completion(self) -> TaskOutput<Completion> {
        let text: String = self
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            return Err(TaskError::Collaborator(
                "Response contained no text content".to_string(),
            ));
        }

        Ok(Completion {
            text,
            usage: TokenUsage {
                input_tokens: self.usage.input_tokens,
                output_tokens: self.usage.output_tokens,
            },
        })
    }
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout_seconds: u64,
}

impl AnthropicClient {
    pub fn new(config: &GeneratorConfig, api_key: String) -> TaskOutput<Self> {
        info!("Initializing text generation client with model {}", config.model);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| TaskError::Collaborator(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout_seconds: config.timeout_seconds,
        })
    }
}

impl TextGenerator for AnthropicClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> TaskOutput<Completion> {
        let url = format!("{}/v1/messages", self.api_url);

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: system_prompt,
            messages: vec![RequestMessage {
                role: "user",
                content: user_prompt,
            }],
        };

        debug!("Sending messages request to {}", url);

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TaskError::Collaborator(format!(
                        "Request timed out after {}s",
                        self.timeout_seconds
                    ))
                } else if e.is_connect() {
                    TaskError::Collaborator(format!("Cannot connect to {}", self.api_url))
                } else {
                    TaskError::Collaborator(format!("Failed to send request: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TaskError::Collaborator(format!(
                "Text generation API error {}: {}",
                status, body
            )));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            TaskError::Collaborator(format!("Failed to parse API response: {}", e))
        })?;

        parsed.into_completion()
    }
}
