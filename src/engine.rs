//! The search orchestrator.
//!
//! Executes the router's plan with the correct concurrency shape:
//! independent keyword/vector calls gather in parallel inside a batch,
//! graph batches run after them so subjects can be canonicalized from
//! earlier results. Store faults fail open, cancellation aborts
//! cleanly, and every stage feeds the telemetry record.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, join_all};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::{QueryCache, cache_key};
use crate::config::{EngineConfig, Strategy};
use crate::error::{Error, Result};
use crate::fusion::{self, RankedHit, SourceList};
use crate::llm::LlmClient;
use crate::model::{
    EntityRecord, GraphGate, HopDirective, MatchKind, PlanStep, RetrievalResult, RoutePlan,
    SearchResponse, Source,
};
use crate::rerank::{HttpReranker, Reranker};
use crate::router::Router;
use crate::store::{GraphSearch, KeywordHit, KeywordSearch, Traversal, VectorHit, VectorSearch};
use crate::telemetry::{NoopSink, QueryTelemetry, TelemetrySink};

/// Caps applied to fan-out inside one query.
const MAX_KEYWORD_CALLS: usize = 5;
const MAX_VECTOR_CALLS: usize = 3;
const MAX_GRAPH_CALLS: usize = 6;
const MAX_GRAPH_SUBJECTS: usize = 3;

/// Per-query options for [`SearchEngine::search_with`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Overrides the configured result cap.
    pub limit: Option<usize>,
    /// Overrides the configured router strategy.
    pub strategy: Option<Strategy>,
    /// Verbose per-source detail in CLI output; the response struct
    /// carries the detail either way.
    pub debug: bool,
}

/// The hybrid retrieval engine.
pub struct SearchEngine<K, V, G, R = HttpReranker> {
    config: EngineConfig,
    router: Router,
    keyword: K,
    vector: V,
    graph: G,
    reranker: Option<R>,
    cache: QueryCache,
    sink: Arc<dyn TelemetrySink>,
}

impl<K, V, G> SearchEngine<K, V, G, HttpReranker>
where
    K: KeywordSearch,
    V: VectorSearch,
    G: GraphSearch,
{
    /// Build an engine. Validates the configuration before any I/O;
    /// an invalid configuration never constructs an engine.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for out-of-band options.
    pub fn new(
        config: EngineConfig,
        keyword: K,
        vector: V,
        graph: G,
        llm: Option<Arc<LlmClient>>,
    ) -> Result<Self> {
        config.validate()?;
        let router = Router::new(&config, llm);
        let cache = QueryCache::new(config.cache);
        Ok(Self {
            config,
            router,
            keyword,
            vector,
            graph,
            reranker: None,
            cache,
            sink: Arc::new(NoopSink),
        })
    }
}

impl<K, V, G, R> SearchEngine<K, V, G, R>
where
    K: KeywordSearch,
    V: VectorSearch,
    G: GraphSearch,
    R: Reranker,
{
    /// Attach a reranker for the final cut.
    pub fn with_reranker<R2: Reranker>(self, reranker: R2) -> SearchEngine<K, V, G, R2> {
        SearchEngine {
            config: self.config,
            router: self.router,
            keyword: self.keyword,
            vector: self.vector,
            graph: self.graph,
            reranker: Some(reranker),
            cache: self.cache,
            sink: self.sink,
        }
    }

    /// Replace the telemetry sink (no-op by default).
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Search with default options and no cancellation.
    ///
    /// # Errors
    ///
    /// Only `Error::Config` and `Error::Cancelled` escape; store and
    /// LLM faults degrade to partial or empty results.
    pub async fn search(&self, query: &str) -> Result<SearchResponse> {
        self.search_with(query, SearchOptions::default(), None).await
    }

    /// Search with options and an optional cancellation flag.
    ///
    /// The flag is a `watch` channel carrying `true` once the caller
    /// cancels; in-flight store calls are abandoned at the next await
    /// point and no partial results are returned.
    ///
    /// # Errors
    ///
    /// `Error::Cancelled` when the flag fires; `Error::Config` never
    /// occurs here (validated at construction).
    pub async fn search_with(
        &self,
        query: &str,
        options: SearchOptions,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> Result<SearchResponse> {
        let limit = options.limit.unwrap_or(self.config.limit);
        let strategy = options.strategy.unwrap_or(self.config.strategy);
        let started = Instant::now();
        let mut telemetry = QueryTelemetry::begin(query, strategy);

        // limit 0 means no store calls at all.
        if limit == 0 || query.trim().is_empty() {
            telemetry.elapsed_ms = elapsed_ms(started);
            self.sink.record(&telemetry);
            return Ok(SearchResponse {
                results: Vec::new(),
                telemetry,
            });
        }

        let key = cache_key(query, strategy, limit);
        if let Some(results) = self.cache.get(&key) {
            telemetry.cache_hit = true;
            telemetry.fused_count = results.len();
            telemetry.elapsed_ms = elapsed_ms(started);
            debug!(query, "query cache hit");
            self.sink.record(&telemetry);
            return Ok(SearchResponse { results, telemetry });
        }

        ensure_live(cancel.as_ref())?;

        let routed = self.router.route(query, options.strategy).await;
        telemetry.strategy_actual = routed.actual();
        debug!(
            query,
            strategy = %strategy,
            actual = %telemetry.strategy_actual,
            "routed"
        );

        let budget = Duration::from_millis(self.config.timeouts.whole_query_ms());
        let per_store_k = limit.saturating_mul(2).clamp(10, 50);
        let mut collected = Collected::default();

        match &routed.plan {
            RoutePlan::Hop(directive) => {
                self.run_hop(
                    directive,
                    query,
                    per_store_k,
                    started,
                    budget,
                    &mut collected,
                    &mut telemetry,
                    &mut cancel,
                )
                .await?;
            }
            RoutePlan::Steps(steps) => {
                self.run_steps(
                    steps,
                    per_store_k,
                    started,
                    budget,
                    &mut collected,
                    &mut telemetry,
                    &mut cancel,
                )
                .await?;
            }
        }

        let had_failures = !collected.dead.is_empty();
        let lists = collected.into_source_lists();
        let mut fused = fusion::fuse(&lists, &self.config.source_weights, self.config.rrf_k);
        telemetry.fused_count = fused.len();

        if fused.len() > limit {
            self.rerank_hook(query, limit, &mut fused, &mut telemetry).await;
        }
        fused.truncate(limit);

        telemetry.elapsed_ms = elapsed_ms(started);
        info!(
            query,
            results = fused.len(),
            elapsed_ms = telemetry.elapsed_ms,
            "search complete"
        );
        self.sink.record(&telemetry);
        // Degraded answers (a store died mid-query) are not worth
        // caching; the next attempt may see the store healthy again.
        if !had_failures {
            self.cache.insert(key, fused.clone());
        }

        Ok(SearchResponse {
            results: fused,
            telemetry,
        })
    }

    // ── Plan execution ────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    async fn run_hop(
        &self,
        directive: &HopDirective,
        query: &str,
        per_store_k: usize,
        started: Instant,
        budget: Duration,
        collected: &mut Collected,
        telemetry: &mut QueryTelemetry,
        cancel: &mut Option<watch::Receiver<bool>>,
    ) -> Result<()> {
        // Batch 1: entities to keyword, sentences (or the raw query)
        // to vector, all in parallel.
        let mut calls: Vec<BoxFuture<'_, BatchItem>> = Vec::new();
        for entity in directive.entities.iter().take(MAX_KEYWORD_CALLS) {
            calls.push(self.keyword_call(entity.clone(), per_store_k));
        }
        let vector_texts: Vec<String> = if directive.sentences.is_empty() {
            vec![query.to_string()]
        } else {
            directive
                .sentences
                .iter()
                .take(MAX_VECTOR_CALLS)
                .cloned()
                .collect()
        };
        for text in vector_texts {
            calls.push(self.vector_call(text, per_store_k));
        }

        let items = run_batch(calls, cancel).await?;
        collected.absorb(items, telemetry);

        // Graph gate per the strategy's decision rule.
        let combined = collected.keyword_entity_count() + collected.vector_entity_count();
        let run_graph = match directive.graph_gate {
            GraphGate::Never => false,
            GraphGate::Always => true,
            GraphGate::IfFewerThan(n) => combined < n,
        };
        if !run_graph || collected.dead.contains(&Source::Graph) {
            return Ok(());
        }
        if started.elapsed() > budget {
            warn!("whole-query budget exceeded, returning partial fusion without graph");
            return Ok(());
        }

        let pairs = self
            .graph_targets(
                &directive.entities,
                directive.relation_hint.as_deref(),
                collected,
            )
            .await;
        if pairs.is_empty() {
            debug!("no canonical graph subject resolved, skipping graph batch");
            return Ok(());
        }

        let calls: Vec<BoxFuture<'_, BatchItem>> = pairs
            .into_iter()
            .take(MAX_GRAPH_CALLS)
            .map(|(traversal, subject)| self.graph_call(traversal, subject, per_store_k))
            .collect();
        let items = run_batch(calls, cancel).await?;
        collected.absorb(items, telemetry);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_steps(
        &self,
        steps: &[PlanStep],
        per_store_k: usize,
        started: Instant,
        budget: Duration,
        collected: &mut Collected,
        telemetry: &mut QueryTelemetry,
        cancel: &mut Option<watch::Receiver<bool>>,
    ) -> Result<()> {
        let mut batch: Vec<BoxFuture<'_, BatchItem>> = Vec::new();

        for step in steps {
            match step.tool {
                Source::Keyword if !collected.dead.contains(&Source::Keyword) => {
                    batch.push(self.keyword_call(step.query.clone(), per_store_k));
                }
                Source::Vector if !collected.dead.contains(&Source::Vector) => {
                    batch.push(self.vector_call(step.query.clone(), per_store_k));
                }
                Source::Keyword | Source::Vector => {}
                Source::Graph => {
                    // A graph step closes the running batch: its input
                    // may depend on what that batch finds.
                    if !batch.is_empty() {
                        let items = run_batch(std::mem::take(&mut batch), cancel).await?;
                        collected.absorb(items, telemetry);
                    }
                    if collected.dead.contains(&Source::Graph) {
                        continue;
                    }
                    if started.elapsed() > budget {
                        warn!("whole-query budget exceeded, dropping remaining graph steps");
                        break;
                    }

                    let Some(subject) = self.adjust_graph_subject(&step.query, collected).await
                    else {
                        debug!(step = %step.query, "graph step skipped, no canonical subject");
                        continue;
                    };
                    let traversals = Traversal::defaults_for(subject.category);
                    let calls: Vec<BoxFuture<'_, BatchItem>> = traversals
                        .into_iter()
                        .take(MAX_GRAPH_CALLS)
                        .map(|t| self.graph_call(t, subject.canonical_name.clone(), per_store_k))
                        .collect();
                    let items = run_batch(calls, cancel).await?;
                    collected.absorb(items, telemetry);
                }
            }
        }

        if !batch.is_empty() {
            let items = run_batch(batch, cancel).await?;
            collected.absorb(items, telemetry);
        }
        Ok(())
    }

    // ── Graph subject canonicalization ────────────────────────────

    /// Resolve hop-shape entity terms to canonical subjects and pick
    /// traversals via the relation hint or category defaults.
    async fn graph_targets(
        &self,
        entities: &[String],
        relation_hint: Option<&str>,
        collected: &Collected,
    ) -> Vec<(Traversal, String)> {
        let mut subjects: Vec<EntityRecord> = Vec::new();
        for term in entities.iter().take(MAX_GRAPH_SUBJECTS) {
            if let Some(entity) = self.resolve_subject(term).await {
                if !subjects.iter().any(|s| s.id == entity.id) {
                    subjects.push(entity);
                }
            }
        }
        if subjects.is_empty() {
            if let Some(best) = collected.best_entity() {
                subjects.push(best);
            }
        }

        let mut pairs: Vec<(Traversal, String)> = Vec::new();
        for subject in subjects {
            let traversals = relation_hint
                .and_then(|hint| Traversal::from_hint(hint, subject.category))
                .map_or_else(|| Traversal::defaults_for(subject.category), |t| vec![t]);
            for traversal in traversals {
                let pair = (traversal, subject.canonical_name.clone());
                if !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
        }
        pairs
    }

    /// Canonicalize one plan-step subject: placeholders and unknown
    /// names fall back to the best record of preceding batches. A raw
    /// keyword is never passed through to the graph store.
    async fn adjust_graph_subject(
        &self,
        step_query: &str,
        collected: &Collected,
    ) -> Option<EntityRecord> {
        let trimmed = step_query.trim();
        let placeholder = trimmed.is_empty()
            || trimmed.starts_with('$')
            || trimmed.starts_with('<')
            || trimmed.starts_with('{');

        if !placeholder {
            if let Some(entity) = self.resolve_subject(trimmed).await {
                return Some(entity);
            }
        }
        collected.best_entity()
    }

    async fn resolve_subject(&self, term: &str) -> Option<EntityRecord> {
        let deadline = Duration::from_millis(self.config.timeouts.ks_ms);
        match tokio::time::timeout(deadline, self.keyword.resolve_canonical(term)).await {
            Ok(Ok(entity)) => entity,
            Ok(Err(e)) => {
                warn!(term, error = %e, "canonical resolution failed");
                None
            }
            Err(_) => {
                warn!(term, "canonical resolution timed out");
                None
            }
        }
    }

    // ── Store calls ───────────────────────────────────────────────

    fn keyword_call(&self, term: String, k: usize) -> BoxFuture<'_, BatchItem> {
        let deadline = Duration::from_millis(self.config.timeouts.ks_ms);
        Box::pin(async move {
            let started = Instant::now();
            match tokio::time::timeout(deadline, self.keyword.search(&term, None, k)).await {
                Ok(Ok(hits)) => BatchItem::ok(
                    Source::Keyword,
                    elapsed_ms(started),
                    CallPayload::Keyword(hits),
                ),
                Ok(Err(e)) => BatchItem::err(Source::Keyword, elapsed_ms(started), e),
                Err(_) => BatchItem::timeout(Source::Keyword, deadline),
            }
        })
    }

    fn vector_call(&self, text: String, k: usize) -> BoxFuture<'_, BatchItem> {
        let deadline = Duration::from_millis(self.config.timeouts.vs_ms);
        Box::pin(async move {
            let started = Instant::now();
            match tokio::time::timeout(deadline, self.vector.search(&text, None, k)).await {
                Ok(Ok(hits)) => BatchItem::ok(
                    Source::Vector,
                    elapsed_ms(started),
                    CallPayload::Vector(hits),
                ),
                Ok(Err(e)) => BatchItem::err(Source::Vector, elapsed_ms(started), e),
                Err(_) => BatchItem::timeout(Source::Vector, deadline),
            }
        })
    }

    fn graph_call(
        &self,
        traversal: Traversal,
        subject: String,
        k: usize,
    ) -> BoxFuture<'_, BatchItem> {
        let deadline = Duration::from_millis(self.config.timeouts.gs_ms);
        Box::pin(async move {
            let started = Instant::now();
            match tokio::time::timeout(deadline, self.graph.traverse(traversal, &subject, k)).await
            {
                Ok(Ok(records)) => BatchItem::ok(
                    Source::Graph,
                    elapsed_ms(started),
                    CallPayload::Graph(traversal, records),
                ),
                Ok(Err(e)) => BatchItem::err(Source::Graph, elapsed_ms(started), e),
                Err(_) => BatchItem::timeout(Source::Graph, deadline),
            }
        })
    }

    // ── Reranker hook ─────────────────────────────────────────────

    /// Rerank the top `2 * limit` candidates; on timeout or failure
    /// the RRF order stands.
    async fn rerank_hook(
        &self,
        query: &str,
        limit: usize,
        fused: &mut Vec<RetrievalResult>,
        telemetry: &mut QueryTelemetry,
    ) {
        if !self.config.reranker_enabled {
            return;
        }
        let Some(reranker) = &self.reranker else {
            return;
        };

        let pool = (2 * limit).min(fused.len());
        let candidates: Vec<String> = fused[..pool].iter().map(candidate_text).collect();
        let deadline = Duration::from_millis(self.config.timeouts.reranker_ms);

        match tokio::time::timeout(deadline, reranker.rerank(query, &candidates, limit)).await {
            Ok(Ok(pairs)) if !pairs.is_empty() => {
                reorder_head(fused, pool, &pairs);
                telemetry.reranked = true;
                debug!(pool, "reranker applied");
            }
            Ok(Ok(_)) => debug!("reranker returned nothing, keeping RRF order"),
            Ok(Err(e)) => warn!(error = %e, "reranker failed, keeping RRF order"),
            Err(_) => warn!("reranker timed out, keeping RRF order"),
        }
    }
}

/// Candidate text sent to the reranker: name plus description head.
fn candidate_text(result: &RetrievalResult) -> String {
    let description: String = result.entity.description.chars().take(200).collect();
    if description.is_empty() {
        result.entity.canonical_name.clone()
    } else {
        format!("{}: {}", result.entity.canonical_name, description)
    }
}

/// Reorder the head of the fused list by reranker scores; candidates
/// the reranker did not return keep their RRF order behind the ranked
/// ones, and the tail beyond the pool is untouched.
fn reorder_head(fused: &mut Vec<RetrievalResult>, pool: usize, pairs: &[(usize, f64)]) {
    let tail = fused.split_off(pool);
    let head = std::mem::take(fused);

    let mut taken = vec![false; head.len()];
    let mut reordered = Vec::with_capacity(head.len());
    for &(index, _score) in pairs {
        if index < head.len() && !taken[index] {
            taken[index] = true;
            reordered.push(head[index].clone());
        }
    }
    for (index, result) in head.into_iter().enumerate() {
        if !taken[index] {
            reordered.push(result);
        }
    }

    reordered.extend(tail);
    *fused = reordered;
}

// ── Batch plumbing ────────────────────────────────────────────────

enum CallPayload {
    Keyword(Vec<KeywordHit>),
    Vector(Vec<VectorHit>),
    Graph(Traversal, Vec<EntityRecord>),
}

struct BatchItem {
    source: Source,
    elapsed_ms: u64,
    outcome: Result<CallPayload>,
}

impl BatchItem {
    fn ok(source: Source, elapsed_ms: u64, payload: CallPayload) -> Self {
        Self {
            source,
            elapsed_ms,
            outcome: Ok(payload),
        }
    }

    fn err(source: Source, elapsed_ms: u64, error: Error) -> Self {
        Self {
            source,
            elapsed_ms,
            outcome: Err(error),
        }
    }

    fn timeout(source: Source, deadline: Duration) -> Self {
        Self {
            source,
            // The deadline is the observed latency of a timed-out call.
            elapsed_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            outcome: Err(Error::StoreTimeout {
                source_kind: source,
                deadline_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

/// Gather one batch, racing the caller's cancellation flag.
async fn run_batch(
    calls: Vec<BoxFuture<'_, BatchItem>>,
    cancel: &mut Option<watch::Receiver<bool>>,
) -> Result<Vec<BatchItem>> {
    ensure_live(cancel.as_ref())?;
    tokio::select! {
        items = join_all(calls) => Ok(items),
        () = cancelled(cancel) => Err(Error::Cancelled),
    }
}

fn ensure_live(cancel: Option<&watch::Receiver<bool>>) -> Result<()> {
    match cancel {
        Some(rx) if *rx.borrow() => Err(Error::Cancelled),
        _ => Ok(()),
    }
}

/// Resolves once the cancellation flag turns true; pends forever when
/// no flag was supplied or the sender went away.
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    match cancel {
        None => std::future::pending().await,
        Some(rx) => loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        },
    }
}

/// Per-query accumulation of store outputs.
#[derive(Default)]
struct Collected {
    keyword: Vec<KeywordHit>,
    vector: Vec<VectorHit>,
    graph: Vec<(Traversal, EntityRecord)>,
    dead: HashSet<Source>,
}

impl Collected {
    fn absorb(&mut self, items: Vec<BatchItem>, telemetry: &mut QueryTelemetry) {
        for item in items {
            match item.outcome {
                Ok(CallPayload::Keyword(hits)) => {
                    telemetry.record_source(Source::Keyword, item.elapsed_ms, hits.len());
                    self.keyword.extend(hits);
                }
                Ok(CallPayload::Vector(hits)) => {
                    telemetry.record_source(Source::Vector, item.elapsed_ms, hits.len());
                    self.vector.extend(hits);
                }
                Ok(CallPayload::Graph(traversal, records)) => {
                    telemetry.record_source(Source::Graph, item.elapsed_ms, records.len());
                    self.graph
                        .extend(records.into_iter().map(|r| (traversal, r)));
                }
                Err(error) => {
                    telemetry.record_source(item.source, item.elapsed_ms, 0);
                    warn!(source = %item.source, error = %error, "store call failed open");
                    // Transport faults poison the source for the rest
                    // of the query; timeouts may recover on their own.
                    if !matches!(error, Error::StoreTimeout { .. }) {
                        self.dead.insert(item.source);
                    }
                }
            }
        }
    }

    fn keyword_entity_count(&self) -> usize {
        self.keyword
            .iter()
            .map(|h| h.entity.id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    fn vector_entity_count(&self) -> usize {
        self.vector
            .iter()
            .map(|h| h.entity.id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Best single record so far: highest-stage keyword hit, else the
    /// most similar vector hit. Used as the graph-subject fallback.
    fn best_entity(&self) -> Option<EntityRecord> {
        self.keyword
            .iter()
            .max_by_key(|h| h.score)
            .map(|h| h.entity.clone())
            .or_else(|| {
                self.vector
                    .iter()
                    .max_by(|a, b| {
                        a.similarity
                            .partial_cmp(&b.similarity)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .map(|h| h.entity.clone())
            })
    }

    /// Merge per-call outputs into one ranked list per source.
    fn into_source_lists(self) -> Vec<SourceList> {
        let mut lists = Vec::new();

        // Keyword: dedup by id keeping the best stage, order by stage
        // score (stable, so earlier calls win inside a stage).
        let mut keyword = self.keyword;
        keyword.sort_by(|a, b| b.score.cmp(&a.score));
        let mut seen = HashSet::new();
        let hits: Vec<RankedHit> = keyword
            .into_iter()
            .filter(|h| seen.insert(h.entity.id.clone()))
            .enumerate()
            .map(|(rank, h)| {
                #[allow(clippy::cast_precision_loss)]
                let raw_score = h.score as f64;
                RankedHit {
                    entity: h.entity,
                    rank,
                    raw_score,
                    match_kind: h.match_kind,
                }
            })
            .collect();
        if !hits.is_empty() {
            lists.push(SourceList {
                source: Source::Keyword,
                hits,
            });
        }

        // Vector: dedup by entity keeping the best similarity.
        let mut vector = self.vector;
        vector.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut seen = HashSet::new();
        let hits: Vec<RankedHit> = vector
            .into_iter()
            .filter(|h| seen.insert(h.entity.id.clone()))
            .enumerate()
            .map(|(rank, h)| RankedHit {
                entity: h.entity,
                rank,
                raw_score: f64::from(h.similarity),
                match_kind: MatchKind::VectorSemantic,
            })
            .collect();
        if !hits.is_empty() {
            lists.push(SourceList {
                source: Source::Vector,
                hits,
            });
        }

        // Graph: every record enters at rank 0 (uniform per-call rank;
        // fusion gives each the maximum per-source contribution).
        // Duplicates across traversals merge their relations.
        let mut merged: Vec<EntityRecord> = Vec::new();
        let mut kinds: Vec<MatchKind> = Vec::new();
        for (traversal, record) in self.graph {
            if let Some(existing) = merged.iter_mut().find(|r| r.id == record.id) {
                existing.merge_relations(&record.relations);
            } else {
                merged.push(record);
                kinds.push(MatchKind::GraphRelation(traversal.predicate().to_string()));
            }
        }
        let hits: Vec<RankedHit> = merged
            .into_iter()
            .zip(kinds)
            .map(|(entity, match_kind)| RankedHit {
                entity,
                rank: 0,
                raw_score: 1.0,
                match_kind,
            })
            .collect();
        if !hits.is_empty() {
            lists.push(SourceList {
                source: Source::Graph,
                hits,
            });
        }

        lists
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
