//! Model2Vec embedding provider.
//!
//! Local static embeddings (pre-computed word vectors with averaging,
//! no neural inference), which makes query-side embedding essentially
//! free and keeps vector search usable without any server.

use std::sync::Arc;

use model2vec_rs::model::StaticModel;

use super::{EmbedderInfo, EmbeddingProvider};
use crate::error::{Error, Result};

const DEFAULT_MODEL: &str = "minishlab/potion-multilingual-128M";
const DIMENSIONS: usize = 256;

/// Model2Vec embedding provider.
///
/// Loads the model into memory on creation. The multilingual potion
/// model is the default so Korean queries embed sensibly.
pub struct Model2VecEmbedder {
    model: Arc<StaticModel>,
    model_name: String,
}

impl Model2VecEmbedder {
    /// Load the default multilingual model.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded from the
    /// HuggingFace Hub (or local cache).
    pub fn new() -> Result<Self> {
        Self::with_model(None)
    }

    /// Load a specific Model2Vec model.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn with_model(model_name: Option<String>) -> Result<Self> {
        let model_name = model_name.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let model = StaticModel::from_pretrained(&model_name, None, None, None).map_err(|e| {
            Error::Embedding(format!("failed to load model2vec model '{model_name}': {e}"))
        })?;

        Ok(Self {
            model: Arc::new(model),
            model_name,
        })
    }

    /// Try to load, returning `None` on failure (offline, no cache).
    #[must_use]
    pub fn try_new() -> Option<Self> {
        Self::new().ok()
    }
}

impl EmbeddingProvider for Model2VecEmbedder {
    fn info(&self) -> EmbedderInfo {
        EmbedderInfo {
            name: "model2vec".to_string(),
            model: self.model_name.clone(),
            dimensions: DIMENSIONS,
        }
    }

    async fn is_available(&self) -> bool {
        // Local model; constructed means available.
        true
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let sentences = vec![text.to_string()];
        self.model
            .encode(&sentences)
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("model2vec returned no embeddings".into()))
    }
}
