//! Embedding providers for the vector store.
//!
//! The query side must embed with the same model family as ingestion;
//! the dimensionality recorded on each chunk is checked at search time
//! and mismatches fail open. Two providers: a local Model2Vec static
//! model (no server, ~1ms) and an Ollama HTTP provider.

mod model2vec;
mod ollama;

pub use model2vec::Model2VecEmbedder;
pub use ollama::OllamaEmbedder;

use tracing::debug;

use crate::error::Result;

/// Provider metadata.
#[derive(Debug, Clone)]
pub struct EmbedderInfo {
    pub name: String,
    pub model: String,
    pub dimensions: usize,
}

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send + Sync {
    /// Provider metadata.
    fn info(&self) -> EmbedderInfo;

    /// Check if the provider is usable right now.
    fn is_available(&self) -> impl std::future::Future<Output = bool> + Send;

    /// Embed a single text.
    fn embed(&self, text: &str) -> impl std::future::Future<Output = Result<Vec<f32>>> + Send;
}

/// Boxed provider for runtime selection (local vs HTTP).
pub struct BoxedEmbedder {
    inner: Box<dyn EmbedderBoxed + Send + Sync>,
}

trait EmbedderBoxed: Send + Sync {
    fn info(&self) -> EmbedderInfo;
    fn embed_boxed(
        &self,
        text: &str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>>> + Send + '_>>;
}

impl BoxedEmbedder {
    pub fn new<P: EmbeddingProvider + 'static>(provider: P) -> Self {
        Self {
            inner: Box::new(BoxedEmbedderWrapper(provider)),
        }
    }

    #[must_use]
    pub fn info(&self) -> EmbedderInfo {
        self.inner.info()
    }

    /// Embed a single text through the boxed provider.
    ///
    /// # Errors
    ///
    /// Propagates the provider's embedding error.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.inner.embed_boxed(text).await
    }
}

struct BoxedEmbedderWrapper<P: EmbeddingProvider + 'static>(P);

impl<P: EmbeddingProvider + 'static> EmbedderBoxed for BoxedEmbedderWrapper<P> {
    fn info(&self) -> EmbedderInfo {
        self.0.info()
    }

    fn embed_boxed(
        &self,
        text: &str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>>> + Send + '_>> {
        let text = text.to_string();
        Box::pin(async move { self.0.embed(&text).await })
    }
}

/// Create an embedder from `LOREBASE_EMBED_*` environment variables.
///
/// `LOREBASE_EMBED_PROVIDER` selects `ollama` or `model2vec`; without
/// it, a reachable Ollama wins, then Model2Vec, then `None` (vector
/// search fails open).
pub async fn create_embedder() -> Option<BoxedEmbedder> {
    let provider = std::env::var("LOREBASE_EMBED_PROVIDER")
        .ok()
        .filter(|v| !v.trim().is_empty());
    let endpoint = std::env::var("LOREBASE_EMBED_ENDPOINT").ok();
    let model = std::env::var("LOREBASE_EMBED_MODEL").ok();

    match provider.as_deref() {
        Some("ollama") => {
            let ollama = OllamaEmbedder::with_config(endpoint, model);
            ollama.is_available().await.then(|| {
                debug!("embedding provider: ollama (explicit)");
                BoxedEmbedder::new(ollama)
            })
        }
        Some("model2vec") => Model2VecEmbedder::with_model(model).ok().map(|m| {
            debug!("embedding provider: model2vec (explicit)");
            BoxedEmbedder::new(m)
        }),
        Some(other) => {
            debug!(provider = other, "unknown embedding provider, vector search disabled");
            None
        }
        None => {
            let ollama = OllamaEmbedder::with_config(endpoint, model.clone());
            if ollama.is_available().await {
                debug!("embedding provider: ollama (auto-detected)");
                return Some(BoxedEmbedder::new(ollama));
            }
            Model2VecEmbedder::with_model(None).ok().map(|m| {
                debug!("embedding provider: model2vec (auto-detected)");
                BoxedEmbedder::new(m)
            })
        }
    }
}
