//! Ollama chat provider.
//!
//! Uses a local Ollama server for routing completions. This is the
//! recommended provider for local development.

use serde::{Deserialize, Serialize};

use super::{ChatProvider, ChatProviderInfo};
use crate::error::{Error, Result};

const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "qwen2.5:7b";

/// Ollama chat provider.
pub struct OllamaChat {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaChat {
    /// Create a provider with default endpoint and model.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(None, None)
    }

    /// Create a provider with custom endpoint/model.
    #[must_use]
    pub fn with_config(endpoint: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

impl Default for OllamaChat {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Option<Vec<OllamaModelTag>>,
}

#[derive(Debug, Deserialize)]
struct OllamaModelTag {
    name: String,
}

impl ChatProvider for OllamaChat {
    fn info(&self) -> ChatProviderInfo {
        ChatProviderInfo {
            name: "ollama".to_string(),
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
        }
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.endpoint);

        let response = match self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(2))
            .send()
            .await
        {
            Ok(r) => r,
            Err(_) => return false,
        };

        if !response.status().is_success() {
            return false;
        }

        let data: OllamaTagsResponse = match response.json().await {
            Ok(d) => d,
            Err(_) => return false,
        };

        data.models.is_some_and(|models| {
            models
                .iter()
                .any(|m| m.name == self.model || m.name.starts_with(&format!("{}:", self.model)))
        })
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint);

        let request = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions { temperature },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::LlmUnavailable {
                provider: "ollama".to_string(),
                message: format!("request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::LlmUnavailable {
                provider: "ollama".to_string(),
                message: format!("status {status}: {body}"),
            });
        }

        let data: OllamaGenerateResponse =
            response.json().await.map_err(|e| Error::LlmMalformed {
                snippet: format!("invalid generate response: {e}"),
            })?;

        Ok(data.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_chat_defaults() {
        let provider = OllamaChat::new();
        let info = provider.info();
        assert_eq!(info.name, "ollama");
        assert!(!info.model.is_empty());
        assert!(info.endpoint.starts_with("http"));
    }

    #[test]
    fn test_ollama_chat_custom_config() {
        let provider = OllamaChat::with_config(
            Some("http://custom:11434".to_string()),
            Some("llama3.1".to_string()),
        );
        let info = provider.info();
        assert_eq!(info.endpoint, "http://custom:11434");
        assert_eq!(info.model, "llama3.1");
    }
}
