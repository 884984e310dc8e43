//! Ranked results and the search response envelope.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::entity::EntityRecord;
use crate::telemetry::QueryTelemetry;

/// The three retrieval sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Keyword,
    Vector,
    Graph,
}

impl Source {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Vector => "vector",
            Self::Graph => "graph",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a record was found.
///
/// Keyword kinds carry the stage precedence of the staged lookup;
/// the graph kind carries the predicate of the edge that caused
/// inclusion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "predicate")]
pub enum MatchKind {
    ExactName,
    Prefix,
    Synonym,
    Substring,
    DescriptionIlike,
    VectorSemantic,
    GraphRelation(String),
}

impl MatchKind {
    /// Short tag for telemetry and JSON output
    /// (e.g. `exact_name`, `graph_relation_sells`).
    #[must_use]
    pub fn tag(&self) -> String {
        match self {
            Self::ExactName => "exact_name".to_string(),
            Self::Prefix => "prefix".to_string(),
            Self::Synonym => "synonym".to_string(),
            Self::Substring => "substring".to_string(),
            Self::DescriptionIlike => "description_ilike".to_string(),
            Self::VectorSemantic => "vector_semantic".to_string(),
            Self::GraphRelation(predicate) => {
                format!("graph_relation_{}", predicate.to_lowercase())
            }
        }
    }

    /// Precedence when one entity was found several ways; higher wins.
    #[must_use]
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::ExactName => 7,
            Self::Prefix => 6,
            Self::Synonym => 5,
            Self::Substring => 4,
            Self::DescriptionIlike => 3,
            Self::VectorSemantic => 2,
            Self::GraphRelation(_) => 1,
        }
    }

    /// Ordinal score within the keyword store's staged lookup.
    ///
    /// Raw scores are ordinal only; fusion ranks, never compares
    /// across sources.
    #[must_use]
    pub const fn stage_score(&self) -> i64 {
        match self {
            Self::ExactName => 100,
            Self::Prefix => 80,
            Self::Synonym => 60,
            Self::Substring => 40,
            Self::DescriptionIlike => 20,
            Self::VectorSemantic | Self::GraphRelation(_) => 0,
        }
    }
}

/// One fused, ranked record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub entity: EntityRecord,
    /// Raw RRF sum. Used for ordering.
    pub fused_score: f64,
    /// Presentation score in `[0, 100]`, relative to the per-query
    /// maximum. Never used for ranking decisions.
    pub score: f64,
    /// Which sources contributed; non-empty by construction.
    pub sources: BTreeSet<Source>,
    /// Highest-precedence way this record was found.
    pub match_type: MatchKind,
    /// 0-based rank within each contributing source's list.
    pub per_source_rank: BTreeMap<Source, usize>,
    /// Raw per-source score (ordinal for keyword, similarity for
    /// vector, uniform for graph).
    pub per_source_score: BTreeMap<Source, f64>,
}

/// What `search` returns: ranked records plus per-query telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<RetrievalResult>,
    pub telemetry: QueryTelemetry,
}
