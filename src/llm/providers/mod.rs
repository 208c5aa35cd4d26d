pub mod gemini;
pub mod ollama;
pub mod remote;

use crate::config::LlmConfig;
use crate::llm::LlmError;
use std::time::Duration;

/// HTTP client shared by the providers; no timeout unless one is configured.
pub(crate) fn http_client(config: &LlmConfig) -> Result<reqwest::Client, LlmError> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| LlmError::ConnectionError(e.to_string()))
}

/// Reads the body of a non-success response into a `ResponseError`.
pub(crate) async fn status_error(provider: &str, response: reqwest::Response) -> LlmError {
    let status = response.status();
    let error_body = match response.text().await {
        Ok(body) if !body.is_empty() => format!(" - Response body: {}", body),
        _ => String::new(),
    };

    tracing::error!("{} API responded with status code: {}{}", provider, status, error_body);
    LlmError::ResponseError(format!(
        "{} API responded with status code: {}{}",
        provider, status, error_body
    ))
}
