//! Ollama embedding provider.

use serde::{Deserialize, Serialize};

use super::{EmbedderInfo, EmbeddingProvider};
use crate::error::{Error, Result};

const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "nomic-embed-text";

/// Known model dimensionalities; unknown models assume 768.
fn dimensions_for(model: &str) -> usize {
    match model {
        "mxbai-embed-large" => 1024,
        "all-minilm" => 384,
        _ => 768,
    }
}

/// Ollama embedding provider (`/api/embed`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(None, None)
    }

    #[must_use]
    pub fn with_config(endpoint: Option<String>, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let dimensions = dimensions_for(&model);
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model,
            dimensions,
        }
    }
}

impl Default for OllamaEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl EmbeddingProvider for OllamaEmbedder {
    fn info(&self) -> EmbedderInfo {
        EmbedderInfo {
            name: "ollama".to_string(),
            model: self.model.clone(),
            dimensions: self.dimensions,
        }
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.endpoint);
        self.client
            .get(&url)
            .timeout(std::time::Duration::from_secs(2))
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.endpoint);

        let request = EmbedRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("ollama embed request failed: {e}")))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("ollama embed failed: {body}")));
        }

        let data: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("invalid ollama embed response: {e}")))?;

        data.embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("no embeddings returned from ollama".into()))
    }
}
