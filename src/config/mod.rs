//! Engine configuration.
//!
//! Every option the engine recognizes lives on [`EngineConfig`].
//! Resolution order for each option: explicit value set by the caller,
//! then a `LOREBASE_*` environment variable, then the documented default.
//! [`EngineConfig::validate`] runs before any I/O; violations are fatal
//! configuration errors, never recovered.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lower bound of the per-source weight band.
pub const MIN_SOURCE_WEIGHT: f64 = 0.2;
/// Upper bound of the per-source weight band.
///
/// Outside `[0.2, 1.5]` rank fusion degenerates into one source
/// winning unconditionally.
pub const MAX_SOURCE_WEIGHT: f64 = 1.5;

/// Standard RRF constant from the IR literature.
pub const DEFAULT_RRF_K: u32 = 60;

/// Default verb suffixes for the extractor's phrase detection (Korean).
pub const DEFAULT_VERB_SUFFIXES: [&str; 10] = [
    "파는",
    "사는",
    "주는",
    "있는",
    "가는",
    "나오는",
    "떨어지는",
    "잡는",
    "얻는",
    "드랍",
];

/// Router strategies. Exactly one is active per engine; callers may
/// override per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// LLM emits an ordered plan of up to `max_plan_steps` steps.
    Plan,
    /// No LLM. Keyword + vector always; graph only below a result-count
    /// threshold.
    Threshold,
    /// Lightweight LLM classification into a closed intent set.
    Intent,
    /// LLM extracts up to three keywords; all stores queried in
    /// parallel with each keyword.
    ParallelExpansion,
    /// Extractor only: entities to keyword, sentences to vector.
    EntitySentence,
    /// LLM emits hop depth, entities, sentences and a relation hint.
    Hop,
}

impl Strategy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Threshold => "threshold",
            Self::Intent => "intent",
            Self::ParallelExpansion => "parallel_expansion",
            Self::EntitySentence => "entity_sentence",
            Self::Hop => "hop",
        }
    }

    /// Whether this strategy consults an LLM for routing.
    #[must_use]
    pub const fn uses_llm(&self) -> bool {
        !matches!(self, Self::Threshold | Self::EntitySentence)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "plan" => Ok(Self::Plan),
            "threshold" => Ok(Self::Threshold),
            "intent" => Ok(Self::Intent),
            "parallel_expansion" | "parallel-expansion" => Ok(Self::ParallelExpansion),
            "entity_sentence" | "entity-sentence" => Ok(Self::EntitySentence),
            "hop" => Ok(Self::Hop),
            other => Err(Error::Config(format!("unknown strategy: {other}"))),
        }
    }
}

/// Per-source fusion weights, each in `[0.2, 1.5]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceWeights {
    pub keyword: f64,
    pub vector: f64,
    pub graph: f64,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            keyword: 1.0,
            vector: 1.0,
            graph: 1.0,
        }
    }
}

impl SourceWeights {
    fn validate(&self) -> Result<()> {
        for (name, w) in [
            ("keyword", self.keyword),
            ("vector", self.vector),
            ("graph", self.graph),
        ] {
            if !(MIN_SOURCE_WEIGHT..=MAX_SOURCE_WEIGHT).contains(&w) {
                return Err(Error::Config(format!(
                    "{name} source weight {w} outside [{MIN_SOURCE_WEIGHT}, {MAX_SOURCE_WEIGHT}]"
                )));
            }
        }
        Ok(())
    }
}

/// Per-stage deadlines in milliseconds. All timeouts fail open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub ks_ms: u64,
    pub vs_ms: u64,
    pub gs_ms: u64,
    pub router_llm_ms: u64,
    pub extractor_llm_ms: u64,
    pub reranker_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            ks_ms: 500,
            vs_ms: 1_000,
            gs_ms: 1_000,
            router_llm_ms: 3_000,
            extractor_llm_ms: 2_000,
            reranker_ms: 3_000,
        }
    }
}

impl TimeoutConfig {
    /// Whole-query budget: the sum of batch deadlines. A query past
    /// this point returns its best-effort partial fusion.
    #[must_use]
    pub fn whole_query_ms(&self) -> u64 {
        self.router_llm_ms + self.ks_ms.max(self.vs_ms) + self.gs_ms + self.reranker_ms
    }
}

/// Query-cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_ms: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: 60_000,
            max_entries: 128,
        }
    }
}

/// All options recognized by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub strategy: Strategy,
    pub rrf_k: u32,
    pub source_weights: SourceWeights,
    /// Default result-list cap; per-query overridable.
    pub limit: usize,
    pub reranker_enabled: bool,
    pub timeouts: TimeoutConfig,
    pub fallback_to_morphology: bool,
    pub verb_suffixes: Vec<String>,
    /// THRESHOLD strategy: graph runs when keyword + vector together
    /// returned fewer records than this.
    pub graph_threshold: usize,
    /// PLAN strategy: maximum steps accepted from the LLM.
    pub max_plan_steps: usize,
    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Hop,
            rrf_k: DEFAULT_RRF_K,
            source_weights: SourceWeights::default(),
            limit: 10,
            reranker_enabled: false,
            timeouts: TimeoutConfig::default(),
            fallback_to_morphology: true,
            verb_suffixes: DEFAULT_VERB_SUFFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
            graph_threshold: 3,
            max_plan_steps: 5,
            cache: CacheConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `LOREBASE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an env value fails to parse
    /// or validation fails.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(s) = env_string("LOREBASE_STRATEGY") {
            config.strategy = s.parse()?;
        }
        if let Some(k) = env_parse::<u32>("LOREBASE_RRF_K")? {
            config.rrf_k = k;
        }
        if let Some(limit) = env_parse::<usize>("LOREBASE_LIMIT")? {
            config.limit = limit;
        }
        if let Some(w) = env_parse::<f64>("LOREBASE_WEIGHT_KS")? {
            config.source_weights.keyword = w;
        }
        if let Some(w) = env_parse::<f64>("LOREBASE_WEIGHT_VS")? {
            config.source_weights.vector = w;
        }
        if let Some(w) = env_parse::<f64>("LOREBASE_WEIGHT_GS")? {
            config.source_weights.graph = w;
        }
        if let Some(v) = env_bool("LOREBASE_RERANKER_ENABLED") {
            config.reranker_enabled = v;
        }
        if let Some(v) = env_bool("LOREBASE_MORPH_FALLBACK") {
            config.fallback_to_morphology = v;
        }
        if let Some(ms) = env_parse::<u64>("LOREBASE_TIMEOUT_KS_MS")? {
            config.timeouts.ks_ms = ms;
        }
        if let Some(ms) = env_parse::<u64>("LOREBASE_TIMEOUT_VS_MS")? {
            config.timeouts.vs_ms = ms;
        }
        if let Some(ms) = env_parse::<u64>("LOREBASE_TIMEOUT_GS_MS")? {
            config.timeouts.gs_ms = ms;
        }
        if let Some(ms) = env_parse::<u64>("LOREBASE_TIMEOUT_ROUTER_LLM_MS")? {
            config.timeouts.router_llm_ms = ms;
        }
        if let Some(ms) = env_parse::<u64>("LOREBASE_TIMEOUT_EXTRACTOR_LLM_MS")? {
            config.timeouts.extractor_llm_ms = ms;
        }
        if let Some(ms) = env_parse::<u64>("LOREBASE_TIMEOUT_RERANKER_MS")? {
            config.timeouts.reranker_ms = ms;
        }
        if let Some(t) = env_parse::<usize>("LOREBASE_GRAPH_THRESHOLD")? {
            config.graph_threshold = t;
        }
        if let Some(suffixes) = env_string("LOREBASE_VERB_SUFFIXES") {
            config.verb_suffixes = suffixes
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Some(v) = env_bool("LOREBASE_CACHE_ENABLED") {
            config.cache.enabled = v;
        }
        if let Some(ms) = env_parse::<u64>("LOREBASE_CACHE_TTL_MS")? {
            config.cache.ttl_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate before any I/O.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on any out-of-band value. These are
    /// fatal; the engine refuses to construct.
    pub fn validate(&self) -> Result<()> {
        self.source_weights.validate()?;
        if self.rrf_k == 0 {
            return Err(Error::Config("rrf_k must be positive".to_string()));
        }
        if self.max_plan_steps == 0 {
            return Err(Error::Config("max_plan_steps must be positive".to_string()));
        }
        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    env_string(key).map(|v| {
        let v = v.to_lowercase();
        v != "0" && v != "false" && v != "no"
    })
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env_string(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("invalid value for {key}: {raw}"))),
    }
}
