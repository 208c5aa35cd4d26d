pub mod extract;
pub mod prompt;
pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use self::extract::extract_sql;
use self::prompt::PromptBuilder;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

/// A single stateless text completion against some model backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

pub fn provider_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider: Arc<dyn LlmProvider> = match config.backend.as_str() {
        "gemini" => Arc::new(providers::gemini::GeminiProvider::new(config)?),
        "remote" => Arc::new(providers::remote::RemoteLlmProvider::new(config)?),
        "ollama" => Arc::new(providers::ollama::OllamaProvider::new(config)?),
        _ => {
            return Err(LlmError::ConfigError(format!(
                "Unsupported LLM backend: {}",
                config.backend
            )))
        }
    };

    Ok(provider)
}

/// Turns questions into SQL: prompt, one completion, fence cleanup.
pub struct LlmManager {
    provider: Arc<dyn LlmProvider>,
    prompts: PromptBuilder,
}

impl LlmManager {
    pub fn new(provider: Arc<dyn LlmProvider>, prompts: PromptBuilder) -> Self {
        Self { provider, prompts }
    }

    pub fn schema(&self) -> &str {
        self.prompts.schema()
    }

    /// Makes exactly one provider call; failures are returned, never retried.
    pub async fn generate_sql(&self, question: &str) -> Result<String, LlmError> {
        let prompt = self.prompts.build(question);
        debug!("Prepared LLM prompt: {}", prompt);

        let response = self.provider.complete(&prompt).await?;
        debug!("Raw LLM response: {}", response);

        let sql = extract_sql(&response);
        if sql.is_empty() {
            warn!("LLM response contained no SQL");
            return Err(LlmError::ResponseError(
                "Failed to extract valid SQL from response".to_string(),
            ));
        }

        info!("Generated SQL for question: {}", question);
        Ok(sql)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Returns a canned response and records every prompt it receives.
    pub struct StubProvider {
        response: Result<String, String>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl StubProvider {
        pub fn replying(response: &str) -> Self {
            Self {
                response: Ok(response.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                response: Err(message.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.response
                .clone()
                .map_err(LlmError::ConnectionError)
        }
    }
}
