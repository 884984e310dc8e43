//! End-to-end pipeline tests against recorded-response fakes.
//!
//! Stores and LLM are constructor-injected fakes, so every scenario
//! is deterministic and runs without a database, a model server or a
//! network.

use std::collections::HashMap;
use std::sync::Arc;

use lorebase::config::{CacheConfig, EngineConfig, Strategy};
use lorebase::engine::{SearchEngine, SearchOptions};
use lorebase::error::{Error, Result};
use lorebase::llm::{BoxedChatProvider, ChatProvider, ChatProviderInfo, LlmClient};
use lorebase::model::{Category, EntityRecord, MatchKind, Relation, Source};
use lorebase::rerank::Reranker;
use lorebase::store::{
    GraphSearch, KeywordHit, KeywordSearch, Traversal, VectorHit, VectorSearch,
};
use lorebase::telemetry::MemorySink;

// ── Fixtures ──────────────────────────────────────────────────────

fn npc_darklord() -> EntityRecord {
    let mut record = EntityRecord::new("npc_1", "다크로드", Category::Npc);
    record.synonyms = vec!["도적 교관".to_string()];
    record.description = "커닝시티의 도적 직업 교관".to_string();
    record
}

fn npc_mina() -> EntityRecord {
    let mut record = EntityRecord::new("npc_2", "미나", Category::Npc);
    record.description = "헤네시스에서 물약을 파는 상인".to_string();
    record
}

fn item_icejeans() -> EntityRecord {
    let mut record = EntityRecord::new("itm_1", "아이스진", Category::Item);
    record.description = "차가운 기운이 도는 바지".to_string();
    record
}

fn monster_yeti() -> EntityRecord {
    let mut record = EntityRecord::new("mon_1", "예티", Category::Monster);
    record.description = "설산에 사는 몬스터".to_string();
    record.relations.push(Relation {
        predicate: "DROPS".to_string(),
        peer_name: "아이스진".to_string(),
        peer_category: Category::Item,
    });
    record
}

// ── Fakes ─────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeKeywordStore {
    entities: Vec<EntityRecord>,
}

impl FakeKeywordStore {
    fn with(entities: Vec<EntityRecord>) -> Self {
        Self { entities }
    }
}

impl KeywordSearch for FakeKeywordStore {
    async fn search(
        &self,
        term: &str,
        _categories: Option<&[Category]>,
        limit: usize,
    ) -> Result<Vec<KeywordHit>> {
        let mut hits = Vec::new();
        for entity in &self.entities {
            let kind = if entity.canonical_name == term {
                Some(MatchKind::ExactName)
            } else if entity.synonyms.iter().any(|s| s == term) {
                Some(MatchKind::Synonym)
            } else if entity.canonical_name.contains(term) {
                Some(MatchKind::Substring)
            } else {
                None
            };
            if let Some(match_kind) = kind {
                hits.push(KeywordHit {
                    entity: entity.clone(),
                    score: match_kind.stage_score(),
                    match_kind,
                });
            }
        }
        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn resolve_canonical(&self, term: &str) -> Result<Option<EntityRecord>> {
        Ok(self
            .entities
            .iter()
            .find(|e| e.canonical_name == term || e.synonyms.iter().any(|s| s == term))
            .cloned())
    }
}

#[derive(Default)]
struct FakeVectorStore {
    // (query substring, ranked hits)
    responses: Vec<(&'static str, Vec<(EntityRecord, f32)>)>,
}

impl FakeVectorStore {
    fn with(responses: Vec<(&'static str, Vec<(EntityRecord, f32)>)>) -> Self {
        Self { responses }
    }

    /// Respond to every query with the same ranked hits.
    fn answering_all(hits: Vec<(EntityRecord, f32)>) -> Self {
        Self {
            responses: vec![("", hits)],
        }
    }
}

impl VectorSearch for FakeVectorStore {
    async fn search(
        &self,
        text: &str,
        _categories: Option<&[Category]>,
        top_k: usize,
    ) -> Result<Vec<VectorHit>> {
        for (needle, hits) in &self.responses {
            if text.contains(needle) {
                return Ok(hits
                    .iter()
                    .take(top_k)
                    .enumerate()
                    .map(|(i, (entity, similarity))| VectorHit {
                        entity: entity.clone(),
                        chunk_id: format!("ch_{i}"),
                        similarity: *similarity,
                    })
                    .collect());
            }
        }
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct FakeGraphStore {
    edges: HashMap<(Traversal, String), Vec<EntityRecord>>,
}

impl FakeGraphStore {
    fn with(edges: Vec<(Traversal, &str, Vec<EntityRecord>)>) -> Self {
        Self {
            edges: edges
                .into_iter()
                .map(|(t, subject, peers)| ((t, subject.to_string()), peers))
                .collect(),
        }
    }
}

impl GraphSearch for FakeGraphStore {
    async fn traverse(
        &self,
        traversal: Traversal,
        subject: &str,
        limit: usize,
    ) -> Result<Vec<EntityRecord>> {
        let mut records = self
            .edges
            .get(&(traversal, subject.to_string()))
            .cloned()
            .unwrap_or_default();
        records.truncate(limit);
        Ok(records)
    }
}

/// Graph store that dies with a transport error on every call.
struct BrokenGraphStore;

impl GraphSearch for BrokenGraphStore {
    async fn traverse(
        &self,
        _traversal: Traversal,
        _subject: &str,
        _limit: usize,
    ) -> Result<Vec<EntityRecord>> {
        Err(Error::StoreTransport {
            source_kind: Source::Graph,
            message: "connection reset by peer".to_string(),
        })
    }
}

/// Vector store that sleeps past any reasonable deadline.
struct SlowVectorStore;

impl VectorSearch for SlowVectorStore {
    async fn search(
        &self,
        _text: &str,
        _categories: Option<&[Category]>,
        _top_k: usize,
    ) -> Result<Vec<VectorHit>> {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
}

struct ScriptedChat(&'static str);

impl ChatProvider for ScriptedChat {
    fn info(&self) -> ChatProviderInfo {
        ChatProviderInfo {
            name: "scripted".to_string(),
            model: "fake".to_string(),
            endpoint: "fake://".to_string(),
        }
    }
    async fn is_available(&self) -> bool {
        true
    }
    async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        Ok(self.0.to_string())
    }
}

struct DownChat;

impl ChatProvider for DownChat {
    fn info(&self) -> ChatProviderInfo {
        ChatProviderInfo {
            name: "down".to_string(),
            model: "fake".to_string(),
            endpoint: "fake://".to_string(),
        }
    }
    async fn is_available(&self) -> bool {
        false
    }
    async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        Err(Error::LlmUnavailable {
            provider: "down".to_string(),
            message: "connection refused".to_string(),
        })
    }
}

/// Reranker that reverses whatever it is given.
struct ReversingReranker;

impl Reranker for ReversingReranker {
    async fn rerank(
        &self,
        _query: &str,
        candidates: &[String],
        top_n: usize,
    ) -> Result<Vec<(usize, f64)>> {
        #[allow(clippy::cast_precision_loss)]
        let pairs = (0..candidates.len())
            .rev()
            .take(top_n)
            .map(|i| (i, 1.0 + i as f64))
            .collect();
        Ok(pairs)
    }
}

fn scripted_llm(script: &'static str) -> Option<Arc<LlmClient>> {
    Some(Arc::new(LlmClient::new(
        BoxedChatProvider::new(ScriptedChat(script)),
        None,
    )))
}

fn config(strategy: Strategy) -> EngineConfig {
    EngineConfig {
        strategy,
        // Determinism in tests: no cross-test cache effects.
        cache: CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        },
        ..EngineConfig::default()
    }
}

// ── Scenario 1: exact canonical NPC name ──────────────────────────

#[tokio::test]
async fn exact_npc_name_tops_results() {
    let engine = SearchEngine::new(
        config(Strategy::Hop),
        FakeKeywordStore::with(vec![npc_darklord(), npc_mina()]),
        FakeVectorStore::default(),
        FakeGraphStore::default(),
        scripted_llm(r#"{"hop": 1, "entities": ["다크로드"], "sentences": []}"#),
    )
    .unwrap();

    let response = engine
        .search_with(
            "다크로드",
            SearchOptions {
                limit: Some(5),
                ..SearchOptions::default()
            },
            None,
        )
        .await
        .unwrap();

    assert!(!response.results.is_empty());
    let top = &response.results[0];
    assert_eq!(top.entity.canonical_name, "다크로드");
    assert_eq!(top.entity.category, Category::Npc);
    assert!(top.sources.contains(&Source::Keyword));
    assert_eq!(top.match_type, MatchKind::ExactName);
    assert!(response.results.len() <= 5);
}

// ── Scenario 2: indirect description of an NPC ────────────────────

#[tokio::test]
async fn description_query_resolves_via_vector_only() {
    let engine = SearchEngine::new(
        config(Strategy::Hop),
        FakeKeywordStore::with(vec![npc_darklord(), npc_mina()]),
        FakeVectorStore::with(vec![("물약", vec![(npc_mina(), 0.91)])]),
        FakeGraphStore::default(),
        scripted_llm(r#"{"hop": 1, "entities": [], "sentences": ["물약 파는 사람"]}"#),
    )
    .unwrap();

    let response = engine.search("물약 파는 사람").await.unwrap();

    let top = &response.results[0];
    assert_eq!(top.entity.canonical_name, "미나");
    assert_eq!(top.sources.len(), 1);
    assert!(top.sources.contains(&Source::Vector));
    assert_eq!(top.match_type, MatchKind::VectorSemantic);
}

// ── Scenario 3: two-hop item sourcing ─────────────────────────────

#[tokio::test]
async fn two_hop_item_sourcing_reaches_graph() {
    let engine = SearchEngine::new(
        config(Strategy::Hop),
        FakeKeywordStore::with(vec![item_icejeans()]),
        FakeVectorStore::with(vec![("아이스진", vec![(item_icejeans(), 0.8)])]),
        FakeGraphStore::with(vec![(
            Traversal::ItemDroppers,
            "아이스진",
            vec![monster_yeti()],
        )]),
        scripted_llm(
            r#"{"hop": 2, "entities": ["아이스진"], "sentences": ["얻는 법"], "relation_hint": "ITEM-MONSTER"}"#,
        ),
    )
    .unwrap();

    let response = engine.search("아이스진 얻는 법").await.unwrap();

    let ids: Vec<&str> = response.results.iter().map(|r| r.entity.id.as_str()).collect();
    assert!(ids.contains(&"itm_1"), "item from keyword/vector: {ids:?}");
    assert!(ids.contains(&"mon_1"), "dropper from graph: {ids:?}");

    let yeti = response
        .results
        .iter()
        .find(|r| r.entity.id == "mon_1")
        .unwrap();
    assert!(yeti.sources.contains(&Source::Graph));
    assert_eq!(
        yeti.match_type,
        MatchKind::GraphRelation("DROPS".to_string())
    );
    assert!(
        yeti.entity
            .relations
            .iter()
            .any(|r| r.predicate == "DROPS" && r.peer_name == "아이스진")
    );
}

// ── Scenario 4: all sources agree ─────────────────────────────────

#[tokio::test]
async fn all_sources_agree_normalizes_to_100() {
    // THRESHOLD gate: 2 unique entities < 3 triggers the graph batch.
    let engine = SearchEngine::new(
        config(Strategy::Threshold),
        FakeKeywordStore::with(vec![npc_darklord()]),
        FakeVectorStore::with(vec![("다크로드", vec![(npc_darklord(), 0.95)])]),
        FakeGraphStore::with(vec![(
            Traversal::NpcLocation,
            "다크로드",
            vec![{
                let mut record = npc_darklord();
                // The graph peer here is the NPC itself so all three
                // sources produce the same id at rank 0.
                record.relations.push(Relation {
                    predicate: "LOCATED_IN".to_string(),
                    peer_name: "커닝시티".to_string(),
                    peer_category: Category::Map,
                });
                record
            }],
        )]),
        None,
    )
    .unwrap();

    let response = engine.search("다크로드").await.unwrap();

    let top = &response.results[0];
    assert_eq!(top.entity.id, "npc_1");
    assert_eq!(top.sources.len(), 3);
    let expected = 3.0 / 61.0;
    assert!((top.fused_score - expected).abs() < 1e-12);
    assert!((top.score - 100.0).abs() < 1e-9);
    assert!(
        response
            .results
            .iter()
            .skip(1)
            .all(|r| r.fused_score < top.fused_score)
    );
}

// ── Scenario 5: router LLM down ───────────────────────────────────

#[tokio::test]
async fn llm_down_falls_back_and_still_answers() {
    let sink = Arc::new(MemorySink::new());
    let engine = SearchEngine::new(
        config(Strategy::Hop),
        FakeKeywordStore::with(vec![npc_darklord()]),
        FakeVectorStore::default(),
        FakeGraphStore::default(),
        Some(Arc::new(LlmClient::new(
            BoxedChatProvider::new(DownChat),
            None,
        ))),
    )
    .unwrap()
    .with_sink(sink.clone());

    let response = engine.search("다크로드 어디").await.unwrap();

    assert!(!response.results.is_empty());
    assert_eq!(response.telemetry.strategy_actual, "fallback");
    let recorded = sink.snapshot();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].strategy_actual, "fallback");
}

// ── Scenario 6: store fails mid-query ─────────────────────────────

#[tokio::test]
async fn graph_transport_error_fails_open() {
    let engine = SearchEngine::new(
        config(Strategy::Hop),
        FakeKeywordStore::with(vec![item_icejeans()]),
        FakeVectorStore::with(vec![("아이스진", vec![(item_icejeans(), 0.8)])]),
        BrokenGraphStore,
        scripted_llm(
            r#"{"hop": 2, "entities": ["아이스진"], "sentences": [], "relation_hint": "ITEM-NPC"}"#,
        ),
    )
    .unwrap();

    let response = engine.search("아이스진 파는 곳").await.unwrap();

    assert!(!response.results.is_empty());
    assert!(
        response
            .results
            .iter()
            .all(|r| !r.sources.contains(&Source::Graph))
    );
    assert_eq!(response.telemetry.per_source_counts[&Source::Graph], 0);
}

// ── Boundary behaviors ────────────────────────────────────────────

#[tokio::test]
async fn limit_zero_makes_no_store_calls() {
    let keyword = FakeKeywordStore::with(vec![npc_darklord()]);
    let vector = FakeVectorStore::default();
    let graph = FakeGraphStore::default();
    let engine = SearchEngine::new(config(Strategy::Threshold), keyword, vector, graph, None).unwrap();

    let response = engine
        .search_with(
            "다크로드",
            SearchOptions {
                limit: Some(0),
                ..SearchOptions::default()
            },
            None,
        )
        .await
        .unwrap();

    assert!(response.results.is_empty());
    assert!(response.telemetry.per_source_counts.is_empty());
}

#[tokio::test]
async fn all_sources_empty_is_success() {
    let engine = SearchEngine::new(
        config(Strategy::Threshold),
        FakeKeywordStore::default(),
        FakeVectorStore::default(),
        FakeGraphStore::default(),
        None,
    )
    .unwrap();

    let response = engine.search("존재하지 않는 무언가").await.unwrap();
    assert!(response.results.is_empty());
    assert_eq!(response.telemetry.fused_count, 0);
}

#[tokio::test]
async fn empty_query_does_not_crash() {
    let engine = SearchEngine::new(
        config(Strategy::Hop),
        FakeKeywordStore::with(vec![npc_darklord()]),
        FakeVectorStore::default(),
        FakeGraphStore::default(),
        None,
    )
    .unwrap();

    let response = engine.search("   ").await.unwrap();
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn timed_out_source_is_absent_from_results() {
    let mut cfg = config(Strategy::Threshold);
    cfg.timeouts.vs_ms = 50;

    let engine = SearchEngine::new(
        cfg,
        FakeKeywordStore::with(vec![npc_darklord()]),
        SlowVectorStore,
        FakeGraphStore::default(),
        None,
    )
    .unwrap();

    let response = engine.search("다크로드").await.unwrap();

    assert!(!response.results.is_empty());
    assert!(
        response
            .results
            .iter()
            .all(|r| !r.sources.contains(&Source::Vector))
    );
    // The timed-out source reports its deadline as latency.
    assert_eq!(response.telemetry.per_source_latency_ms[&Source::Vector], 50);
    assert_eq!(response.telemetry.per_source_counts[&Source::Vector], 0);
}

#[tokio::test]
async fn repeated_search_is_idempotent() {
    let engine = SearchEngine::new(
        config(Strategy::Threshold),
        FakeKeywordStore::with(vec![npc_darklord(), npc_mina(), item_icejeans()]),
        FakeVectorStore::with(vec![("다크", vec![(npc_darklord(), 0.9), (npc_mina(), 0.5)])]),
        FakeGraphStore::with(vec![(
            Traversal::NpcLocation,
            "다크로드",
            vec![npc_darklord()],
        )]),
        None,
    )
    .unwrap();

    let first: Vec<String> = engine
        .search("다크로드")
        .await
        .unwrap()
        .results
        .into_iter()
        .map(|r| r.entity.id)
        .collect();
    for _ in 0..5 {
        let run: Vec<String> = engine
            .search("다크로드")
            .await
            .unwrap()
            .results
            .into_iter()
            .map(|r| r.entity.id)
            .collect();
        assert_eq!(run, first);
    }
}

#[tokio::test]
async fn cancellation_returns_cancelled() {
    let (tx, rx) = tokio::sync::watch::channel(true);
    let engine = SearchEngine::new(
        config(Strategy::Threshold),
        FakeKeywordStore::with(vec![npc_darklord()]),
        FakeVectorStore::default(),
        FakeGraphStore::default(),
        None,
    )
    .unwrap();

    let result = engine
        .search_with("다크로드", SearchOptions::default(), Some(rx))
        .await;
    assert!(matches!(result, Err(Error::Cancelled)));
    drop(tx);
}

#[tokio::test]
async fn reranker_reorders_head_and_sets_flag() {
    let entities: Vec<EntityRecord> = (0..8)
        .map(|i| {
            let mut record =
                EntityRecord::new(format!("npc_{i}"), format!("상인{i}"), Category::Npc);
            record.description = format!("{i}번째 상인");
            record
        })
        .collect();

    let vector_hits: Vec<(EntityRecord, f32)> = entities
        .iter()
        .enumerate()
        .map(|(i, e)| {
            #[allow(clippy::cast_precision_loss)]
            let sim = 0.9 - (i as f32) * 0.05;
            (e.clone(), sim)
        })
        .collect();

    let mut cfg = config(Strategy::Threshold);
    cfg.reranker_enabled = true;
    cfg.graph_threshold = 0;

    let engine = SearchEngine::new(
        cfg,
        FakeKeywordStore::default(),
        FakeVectorStore::answering_all(vector_hits),
        FakeGraphStore::default(),
        None,
    )
    .unwrap()
    .with_reranker(ReversingReranker);

    let response = engine
        .search_with(
            "상인",
            SearchOptions {
                limit: Some(3),
                ..SearchOptions::default()
            },
            None,
        )
        .await
        .unwrap();

    assert!(response.telemetry.reranked);
    assert_eq!(response.results.len(), 3);
    // The reverser promotes the tail of the RRF pool.
    assert_ne!(response.results[0].entity.id, "npc_0");
}

#[test]
fn out_of_band_weight_is_a_config_error() {
    let mut cfg = EngineConfig::default();
    cfg.source_weights.vector = 1.9;

    let result = SearchEngine::new(
        cfg,
        FakeKeywordStore::default(),
        FakeVectorStore::default(),
        FakeGraphStore::default(),
        None,
    );
    assert!(matches!(result, Err(Error::Config(_))));
}
