//! Optional cross-encoder reranker.
//!
//! The hook is bounded and fail-open: the orchestrator sends the top
//! `2 * limit` fused candidates, waits at most the configured
//! deadline, and keeps the RRF order unchanged on any failure.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Reranker interface: scores candidate texts against the query and
/// returns `(candidate_index, score)` pairs, best first.
pub trait Reranker: Send + Sync {
    fn rerank(
        &self,
        query: &str,
        candidates: &[String],
        top_n: usize,
    ) -> impl std::future::Future<Output = Result<Vec<(usize, f64)>>> + Send;
}

/// HTTP reranker speaking a minimal JSON contract:
/// `POST { query, candidates, top_n }` → `{ results: [{index, score}] }`.
pub struct HttpReranker {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpReranker {
    #[must_use]
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Build from `LOREBASE_RERANKER_URL`, if set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var("LOREBASE_RERANKER_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Self::new)
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    candidates: &'a [String],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankEntry>,
}

#[derive(Debug, Deserialize)]
struct RerankEntry {
    index: usize,
    score: f64,
}

impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[String],
        top_n: usize,
    ) -> Result<Vec<(usize, f64)>> {
        let request = RerankRequest {
            query,
            candidates,
            top_n,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Other(format!("reranker request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Other(format!(
                "reranker returned status {}",
                response.status()
            )));
        }

        let data: RerankResponse = response
            .json()
            .await
            .map_err(|e| Error::Other(format!("invalid reranker response: {e}")))?;

        let mut pairs: Vec<(usize, f64)> = data
            .results
            .into_iter()
            .filter(|entry| entry.index < candidates.len())
            .map(|entry| (entry.index, entry.score))
            .collect();
        pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        pairs.truncate(top_n);
        Ok(pairs)
    }
}
