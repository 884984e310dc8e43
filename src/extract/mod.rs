//! Keyword extraction: entity/sentence decomposition of a query.
//!
//! Two backends, tried in priority order: a tightly bounded LLM call,
//! then a morphological fallback. Both share the n-gram sentence
//! reconstruction: token windows of length 4, 3, then 2 that contain
//! a verb-like form and appear verbatim in the original query become
//! *sentences* (verb-bearing phrases); leftover noun tokens become
//! *entities*.

mod llm;
mod morph;

pub use morph::{Pos, tokenize};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::llm::LlmClient;

/// Output of extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub raw_tokens: Vec<String>,
    /// Noun-like terms, particle-stripped. Routed to the keyword store.
    pub entities: Vec<String>,
    /// Verb-bearing phrases reconstructed from the query. Routed to
    /// the vector store.
    pub sentences: Vec<String>,
}

impl Extraction {
    /// Degenerate fallback: the whole query as one sentence.
    #[must_use]
    pub fn degenerate(query: &str) -> Self {
        Self {
            raw_tokens: vec![query.to_string()],
            entities: Vec::new(),
            sentences: vec![query.to_string()],
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.sentences.is_empty()
    }
}

/// The extractor: LLM backend with morphological fallback.
pub struct KeywordExtractor {
    verb_suffixes: Vec<String>,
    llm: Option<Arc<LlmClient>>,
    llm_timeout: Duration,
    fallback_to_morphology: bool,
}

impl KeywordExtractor {
    #[must_use]
    pub fn new(
        verb_suffixes: Vec<String>,
        llm: Option<Arc<LlmClient>>,
        llm_timeout_ms: u64,
        fallback_to_morphology: bool,
    ) -> Self {
        Self {
            verb_suffixes,
            llm,
            llm_timeout: Duration::from_millis(llm_timeout_ms),
            fallback_to_morphology,
        }
    }

    /// Extract entities and sentences from a query.
    ///
    /// Never fails: LLM faults fall through to morphology, and an
    /// extraction with neither entities nor sentences degenerates to
    /// the whole query as one sentence.
    pub async fn extract(&self, query: &str) -> Extraction {
        let query = query.trim();
        if query.is_empty() {
            return Extraction::default();
        }

        if let Some(client) = &self.llm {
            match tokio::time::timeout(self.llm_timeout, llm::extract(client, self, query)).await {
                Ok(Ok(extraction)) if !extraction.is_empty() => {
                    trace!(?extraction, "LLM extraction");
                    return extraction;
                }
                Ok(Ok(_)) => debug!("LLM extraction empty, falling back"),
                Ok(Err(e)) => debug!(error = %e, "LLM extraction failed, falling back"),
                Err(_) => debug!("LLM extraction timed out, falling back"),
            }
        }

        if self.fallback_to_morphology {
            let extraction = self.morphological(query);
            if !extraction.is_empty() {
                return extraction;
            }
        }

        Extraction::degenerate(query)
    }

    /// Morphological extraction only (no LLM). Deterministic; used
    /// directly by LLM-free router strategies and as the fallback.
    #[must_use]
    pub fn morphological(&self, query: &str) -> Extraction {
        let query = query.trim();
        if query.is_empty() {
            return Extraction::default();
        }

        let tagged = tokenize(query, &self.verb_suffixes);
        let raw_tokens: Vec<String> = tagged.iter().map(|(form, _)| form.clone()).collect();
        let verbal: Vec<bool> = tagged.iter().map(|(_, pos)| *pos == Pos::Verb).collect();

        let (sentences, consumed) = reconstruct_sentences(&raw_tokens, &verbal, query);

        let entities: Vec<String> = tagged
            .iter()
            .enumerate()
            .filter(|(i, (_, pos))| *pos == Pos::Noun && !consumed.contains(i))
            .map(|(_, (form, _))| morph::strip_particle(form))
            .filter(|form| !form.is_empty())
            .collect();

        let extraction = Extraction {
            raw_tokens,
            entities,
            sentences,
        };
        if extraction.is_empty() {
            Extraction::degenerate(query)
        } else {
            extraction
        }
    }

    pub(crate) fn verb_suffixes(&self) -> &[String] {
        &self.verb_suffixes
    }
}

/// Shared n-gram reconstruction.
///
/// Windows of length 4, then 3, then 2 that contain at least one
/// verb-like token and occur verbatim (space-joined) in the original
/// query are accepted as sentences; longer windows win and consumed
/// tokens never join a second window.
pub(crate) fn reconstruct_sentences(
    tokens: &[String],
    verbal: &[bool],
    query: &str,
) -> (Vec<String>, HashSet<usize>) {
    let mut sentences = Vec::new();
    let mut consumed: HashSet<usize> = HashSet::new();

    for window in [4usize, 3, 2] {
        if tokens.len() < window {
            continue;
        }
        for start in 0..=(tokens.len() - window) {
            let range = start..start + window;
            if range.clone().any(|i| consumed.contains(&i)) {
                continue;
            }
            if !range.clone().any(|i| verbal[i]) {
                continue;
            }
            let joined = tokens[range.clone()].join(" ");
            if query.contains(&joined) {
                consumed.extend(range);
                sentences.push(joined);
            }
        }
    }

    (sentences, consumed)
}
