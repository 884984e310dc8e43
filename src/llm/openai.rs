//! OpenAI-compatible chat provider.
//!
//! Targets any `/v1/chat/completions` endpoint (OpenAI, vLLM, LM
//! Studio, gateway proxies). An API key is optional for self-hosted
//! endpoints.

use serde::{Deserialize, Serialize};

use super::{ChatProvider, ChatProviderInfo};
use crate::error::{Error, Result};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible chat provider.
pub struct OpenAiChat {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiChat {
    /// Create a provider with custom configuration. Missing values
    /// fall back to the OpenAI defaults.
    #[must_use]
    pub fn with_config(
        endpoint: Option<String>,
        model: Option<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
        }
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.post(url);
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl ChatProvider for OpenAiChat {
    fn info(&self) -> ChatProviderInfo {
        ChatProviderInfo {
            name: "openai".to_string(),
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
        }
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/v1/models", self.endpoint);
        let mut builder = self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(2));
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        builder.send().await.is_ok_and(|r| r.status().is_success())
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.endpoint);

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
        };

        let response = self
            .request(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::LlmUnavailable {
                provider: "openai".to_string(),
                message: format!("request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::LlmUnavailable {
                provider: "openai".to_string(),
                message: format!("status {status}: {body}"),
            });
        }

        let data: ChatCompletionResponse =
            response.json().await.map_err(|e| Error::LlmMalformed {
                snippet: format!("invalid chat completion response: {e}"),
            })?;

        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::LlmMalformed {
                snippet: "no choices in chat completion response".to_string(),
            })
    }
}
