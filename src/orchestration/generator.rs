// Generator - the text-completion service each stage delegates to

use super::types::StageKind;
use crate::config::PipelineConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prompt sent to the generator for one stage
#[derive(Debug, Clone, PartialEq)]
pub struct StagePrompt {
    pub stage: StageKind,
    /// Fixed instructions plus the required output schema
    pub system: String,
    /// Serialized stage input
    pub user: String,
}

/// Opaque, possibly non-deterministic function from prompt to text
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, prompt: &StagePrompt) -> Result<String, GeneratorError>;

    /// Model identifier, for logging
    fn model(&self) -> &str;
}

/// Generator backed by a local Ollama server
pub struct OllamaGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    pub fn new(config: &PipelineConfig) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| GeneratorError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.ollama_endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn build_request(&self, prompt: &StagePrompt) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
            stream: false,
            format: Some("json".to_string()),
            options: ChatOptions {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn complete(&self, prompt: &StagePrompt) -> Result<String, GeneratorError> {
        let request = self.build_request(prompt);

        let response = self
            .client
            .post(format!("{}/api/chat", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Timeout
                } else {
                    GeneratorError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(GeneratorError::Status(response.status().as_u16()));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::Envelope(e.to_string()))?;

        Ok(chat_response.message.content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Message,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GeneratorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Generator returned HTTP {0}")]
    Status(u16),

    #[error("Malformed response envelope: {0}")]
    Envelope(String),
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Replays canned responses per stage and records every prompt
    #[derive(Default)]
    pub(crate) struct ScriptedGenerator {
        responses: HashMap<StageKind, Result<String, GeneratorError>>,
        prompts: Mutex<Vec<StagePrompt>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_response(mut self, stage: StageKind, text: impl Into<String>) -> Self {
            self.responses.insert(stage, Ok(text.into()));
            self
        }

        pub(crate) fn with_failure(mut self, stage: StageKind, error: GeneratorError) -> Self {
            self.responses.insert(stage, Err(error));
            self
        }

        pub(crate) fn prompts(&self) -> Vec<StagePrompt> {
            self.prompts.lock().unwrap().clone()
        }

        pub(crate) fn stages_called(&self) -> Vec<StageKind> {
            self.prompts().iter().map(|p| p.stage).collect()
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn complete(&self, prompt: &StagePrompt) -> Result<String, GeneratorError> {
            self.prompts.lock().unwrap().push(prompt.clone());
            self.responses
                .get(&prompt.stage)
                .cloned()
                .unwrap_or_else(|| Err(GeneratorError::Network(format!("no script for {}", prompt.stage))))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let mut config = PipelineConfig::default();
        config.model = "llama3.2".to_string();
        config.ollama_endpoint = "http://localhost:11434/".to_string();

        let generator = OllamaGenerator::new(&config).unwrap();
        assert_eq!(generator.endpoint, "http://localhost:11434");
        assert_eq!(generator.model(), "llama3.2");

        let prompt = StagePrompt {
            stage: StageKind::Analyzer,
            system: "instructions".to_string(),
            user: "{}".to_string(),
        };
        let value = serde_json::to_value(generator.build_request(&prompt)).unwrap();

        assert_eq!(value["model"], "llama3.2");
        assert_eq!(value["stream"], false);
        assert_eq!(value["format"], "json");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "{}");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_upstream_failure() {
        // Bind an ephemeral port and release it so nothing is listening there
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = PipelineConfig::default();
        config.ollama_endpoint = format!("http://127.0.0.1:{port}");
        config.request_timeout_ms = 2_000;

        let generator = OllamaGenerator::new(&config).unwrap();
        let prompt = StagePrompt {
            stage: StageKind::Optimizer,
            system: String::new(),
            user: String::new(),
        };

        let err = generator.complete(&prompt).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Network(_) | GeneratorError::Timeout));
    }
}
