//! Query router: decides which stores to consult, with what inputs,
//! at what hop depth.
//!
//! Six strategies share one contract: strict-JSON LLM responses parsed
//! once (never retried), temperature kept low, bounded prompts, and a
//! deterministic rules-based fallback (morphological extraction with
//! hop 1) behind every LLM-dependent path.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{EngineConfig, Strategy};
use crate::error::{Error, Result};
use crate::extract::{Extraction, KeywordExtractor};
use crate::llm::LlmClient;
use crate::model::{GraphGate, HopDirective, PlanStep, RoutePlan, RouterOutput, Source};

const ROUTER_TEMPERATURE: f32 = 0.1;

/// Caps applied to rules-derived plans so fallback queries stay cheap.
const MAX_FALLBACK_ENTITIES: usize = 3;
const MAX_FALLBACK_SENTENCES: usize = 2;

/// The router.
pub struct Router {
    llm: Option<Arc<LlmClient>>,
    extractor: KeywordExtractor,
    default_strategy: Strategy,
    graph_threshold: usize,
    max_plan_steps: usize,
    llm_timeout: Duration,
}

impl Router {
    #[must_use]
    pub fn new(config: &EngineConfig, llm: Option<Arc<LlmClient>>) -> Self {
        let extractor = KeywordExtractor::new(
            config.verb_suffixes.clone(),
            llm.clone(),
            config.timeouts.extractor_llm_ms,
            config.fallback_to_morphology,
        );
        Self {
            llm,
            extractor,
            default_strategy: config.strategy,
            graph_threshold: config.graph_threshold,
            max_plan_steps: config.max_plan_steps,
            llm_timeout: Duration::from_millis(config.timeouts.router_llm_ms),
        }
    }

    /// Route a query. Never fails; LLM faults land on the rules-based
    /// fallback and are flagged in the output.
    pub async fn route(&self, query: &str, strategy: Option<Strategy>) -> RouterOutput {
        let strategy = strategy.unwrap_or(self.default_strategy);

        match strategy {
            Strategy::Threshold => self.route_threshold(query),
            Strategy::EntitySentence => self.route_entity_sentence(query).await,
            Strategy::Plan => match self.llm_plan(query).await {
                Ok(plan) => RouterOutput {
                    strategy,
                    fallback: false,
                    plan,
                },
                Err(e) => self.fallback(strategy, query, &e),
            },
            Strategy::Intent => match self.llm_intent(query).await {
                Ok(plan) => RouterOutput {
                    strategy,
                    fallback: false,
                    plan,
                },
                Err(e) => self.fallback(strategy, query, &e),
            },
            Strategy::ParallelExpansion => match self.llm_keywords(query).await {
                Ok(plan) => RouterOutput {
                    strategy,
                    fallback: false,
                    plan,
                },
                Err(e) => self.fallback(strategy, query, &e),
            },
            Strategy::Hop => match self.llm_hop(query).await {
                Ok(plan) => RouterOutput {
                    strategy,
                    fallback: false,
                    plan,
                },
                Err(e) => self.fallback(strategy, query, &e),
            },
        }
    }

    // ── LLM-free strategies ───────────────────────────────────────

    /// THRESHOLD: always keyword + vector; graph only when the two
    /// together return fewer than the configured threshold.
    fn route_threshold(&self, query: &str) -> RouterOutput {
        let extraction = self.extractor.morphological(query);
        RouterOutput {
            strategy: Strategy::Threshold,
            fallback: false,
            plan: RoutePlan::Hop(HopDirective {
                hop: 1,
                entities: extraction.entities,
                sentences: extraction.sentences,
                relation_hint: None,
                graph_gate: GraphGate::IfFewerThan(self.graph_threshold),
            }),
        }
    }

    /// ENTITY_SENTENCE: extractor output drives the plan directly;
    /// entities to keyword, sentences to vector, no graph (there is
    /// no plan LLM to ask for it).
    async fn route_entity_sentence(&self, query: &str) -> RouterOutput {
        let extraction = self.extractor.extract(query).await;
        let steps = steps_from_extraction(&extraction, query);
        RouterOutput {
            strategy: Strategy::EntitySentence,
            fallback: false,
            plan: RoutePlan::Steps(steps),
        }
    }

    // ── LLM-driven strategies ─────────────────────────────────────

    async fn complete(&self, prompt: &str) -> Result<String> {
        let client = self.llm.as_ref().ok_or_else(|| Error::LlmUnavailable {
            provider: "none".to_string(),
            message: "no LLM client configured".to_string(),
        })?;
        match tokio::time::timeout(self.llm_timeout, client.complete(prompt, ROUTER_TEMPERATURE))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::LlmUnavailable {
                provider: client.active_provider(),
                message: format!("router completion exceeded {:?}", self.llm_timeout),
            }),
        }
    }

    async fn llm_plan(&self, query: &str) -> Result<RoutePlan> {
        let prompt = format!(
            "Plan retrieval for a question over a game knowledge base using three tools:\n\
             - \"keyword\": exact or fuzzy name lookup, input is one term\n\
             - \"vector\": semantic description search, input is free text\n\
             - \"graph\": relationship traversal, input is an entity name\n\
             Respond with a JSON array of at most {max} steps, JSON only:\n\
             [{{\"tool\": \"keyword\", \"query\": \"...\", \"rationale\": \"...\"}}]\n\
             Steps run in order; graph steps may name entities earlier steps will find.\n\
             Question: {query}",
            max = self.max_plan_steps
        );
        let response = self.complete(&prompt).await?;
        let steps = parse_plan(&response, self.max_plan_steps)?;
        Ok(RoutePlan::Steps(steps))
    }

    async fn llm_intent(&self, query: &str) -> Result<RoutePlan> {
        let prompt = format!(
            "Classify the question into exactly one label:\n\
             npc_location, monster_location, item_source, map_info, lore_lookup, general.\n\
             Respond with the label only.\n\
             Question: {query}"
        );
        let response = self.complete(&prompt).await?;
        let intent = parse_intent(&response)?;
        debug!(?intent, "intent classified");

        let extraction = self.extractor.morphological(query);
        let term = extraction
            .entities
            .first()
            .cloned()
            .unwrap_or_else(|| query.to_string());

        let keyword = |q: &str| PlanStep {
            tool: Source::Keyword,
            query: q.to_string(),
            rationale: None,
        };
        let vector = |q: &str| PlanStep {
            tool: Source::Vector,
            query: q.to_string(),
            rationale: None,
        };
        let graph = |q: &str| PlanStep {
            tool: Source::Graph,
            query: q.to_string(),
            rationale: None,
        };

        // Fixed store subsets per intent, at most three steps.
        let steps = match intent {
            Intent::NpcLocation | Intent::MonsterLocation | Intent::ItemSource => {
                vec![keyword(&term), vector(query), graph(&term)]
            }
            Intent::MapInfo => vec![keyword(&term), graph(&term)],
            Intent::LoreLookup | Intent::General => vec![keyword(&term), vector(query)],
        };
        Ok(RoutePlan::Steps(steps))
    }

    async fn llm_keywords(&self, query: &str) -> Result<RoutePlan> {
        let prompt = format!(
            "Give up to three search keywords for the question, comma separated, \
             proper nouns first. Respond with the keywords only.\n\
             Question: {query}"
        );
        let response = self.complete(&prompt).await?;
        let keywords = parse_keywords(&response)?;

        // Every keyword goes to every store, in parallel, graph included.
        Ok(RoutePlan::Hop(HopDirective {
            hop: 2,
            entities: keywords.clone(),
            sentences: keywords,
            relation_hint: None,
            graph_gate: GraphGate::Always,
        }))
    }

    async fn llm_hop(&self, query: &str) -> Result<RoutePlan> {
        let prompt = format!(
            "You route questions over a game knowledge base.\n\
             Decide the hop depth: 1 = direct entity lookup, 2 = the answer \
             requires following a relationship (who sells or drops an item, \
             where an NPC or monster is, which maps connect).\n\
             Respond with JSON only:\n\
             {{\"hop\": 1, \"entities\": [\"...\"], \"sentences\": [\"...\"], \
             \"relation_hint\": \"ITEM-MONSTER\"}}\n\
             relation_hint pairs subject and target categories \
             (NPC, MAP, ITEM, MONSTER); omit it when hop is 1.\n\
             Question: {query}"
        );
        let response = self.complete(&prompt).await?;
        let directive = parse_hop(&response)?;
        Ok(RoutePlan::Hop(directive))
    }

    // ── Fallback ──────────────────────────────────────────────────

    /// Rules-based fallback: morphological extraction, hop 1, with
    /// each strategy keeping its own graph default.
    fn fallback(&self, strategy: Strategy, query: &str, cause: &Error) -> RouterOutput {
        warn!(strategy = %strategy, error = %cause, "router falling back to rules");
        let extraction = self.extractor.morphological(query);

        let plan = match strategy {
            Strategy::Plan | Strategy::Intent | Strategy::EntitySentence => {
                RoutePlan::Steps(steps_from_extraction(&extraction, query))
            }
            Strategy::ParallelExpansion => {
                // The strategy always fans out to every store; the
                // fallback keeps that but swaps LLM keywords for
                // morphological ones.
                let keywords = if extraction.entities.is_empty() {
                    extraction.sentences.clone()
                } else {
                    extraction.entities.clone()
                };
                RoutePlan::Hop(HopDirective {
                    hop: 2,
                    entities: keywords.clone(),
                    sentences: keywords,
                    relation_hint: None,
                    graph_gate: GraphGate::Always,
                })
            }
            Strategy::Threshold | Strategy::Hop => RoutePlan::Hop(HopDirective {
                hop: 1,
                entities: extraction.entities,
                sentences: extraction.sentences,
                relation_hint: None,
                graph_gate: match strategy {
                    Strategy::Threshold => GraphGate::IfFewerThan(self.graph_threshold),
                    _ => GraphGate::Never,
                },
            }),
        };

        RouterOutput {
            strategy,
            fallback: true,
            plan,
        }
    }
}

/// Entities to keyword steps, sentences to vector steps.
fn steps_from_extraction(extraction: &Extraction, query: &str) -> Vec<PlanStep> {
    let mut steps = Vec::new();
    for entity in extraction.entities.iter().take(MAX_FALLBACK_ENTITIES) {
        steps.push(PlanStep {
            tool: Source::Keyword,
            query: entity.clone(),
            rationale: None,
        });
    }
    for sentence in extraction.sentences.iter().take(MAX_FALLBACK_SENTENCES) {
        steps.push(PlanStep {
            tool: Source::Vector,
            query: sentence.clone(),
            rationale: None,
        });
    }
    if steps.is_empty() {
        steps.push(PlanStep {
            tool: Source::Vector,
            query: query.to_string(),
            rationale: None,
        });
    }
    steps
}

// ── Response parsing ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawPlanStep {
    tool: String,
    query: String,
    #[serde(default)]
    rationale: Option<String>,
}

fn parse_plan(response: &str, max_steps: usize) -> Result<Vec<PlanStep>> {
    let json = slice_between(response, '[', ']')?;
    let raw: Vec<RawPlanStep> = serde_json::from_str(json).map_err(|_| Error::LlmMalformed {
        snippet: snippet(response),
    })?;

    let mut steps = Vec::new();
    for step in raw.into_iter().take(max_steps) {
        let tool = match step.tool.to_lowercase().as_str() {
            "keyword" | "keyword_store" | "ks" => Source::Keyword,
            "vector" | "vector_store" | "vs" => Source::Vector,
            "graph" | "graph_store" | "gs" => Source::Graph,
            _ => {
                return Err(Error::LlmMalformed {
                    snippet: format!("unknown tool: {}", step.tool),
                });
            }
        };
        let query = step.query.trim().to_string();
        if query.is_empty() {
            continue;
        }
        steps.push(PlanStep {
            tool,
            query,
            rationale: step.rationale,
        });
    }

    if steps.is_empty() {
        return Err(Error::LlmMalformed {
            snippet: snippet(response),
        });
    }
    Ok(steps)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    NpcLocation,
    MonsterLocation,
    ItemSource,
    MapInfo,
    LoreLookup,
    General,
}

fn parse_intent(response: &str) -> Result<Intent> {
    let lowered = response.to_lowercase();
    // Order matters: more specific labels first so a verbose
    // completion containing several words still lands correctly.
    let table = [
        ("npc_location", Intent::NpcLocation),
        ("monster_location", Intent::MonsterLocation),
        ("item_source", Intent::ItemSource),
        ("map_info", Intent::MapInfo),
        ("lore_lookup", Intent::LoreLookup),
        ("general", Intent::General),
    ];
    table
        .into_iter()
        .find(|(label, _)| lowered.contains(label))
        .map(|(_, intent)| intent)
        .ok_or_else(|| Error::LlmMalformed {
            snippet: snippet(response),
        })
}

fn parse_keywords(response: &str) -> Result<Vec<String>> {
    let line = response
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    let keywords: Vec<String> = line
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .take(3)
        .map(ToString::to_string)
        .collect();
    if keywords.is_empty() {
        return Err(Error::LlmMalformed {
            snippet: snippet(response),
        });
    }
    Ok(keywords)
}

#[derive(Debug, Deserialize)]
struct RawHop {
    hop: u8,
    #[serde(default)]
    entities: Vec<String>,
    #[serde(default)]
    sentences: Vec<String>,
    #[serde(default)]
    relation_hint: Option<String>,
}

fn parse_hop(response: &str) -> Result<HopDirective> {
    let json = slice_between(response, '{', '}')?;
    let raw: RawHop = serde_json::from_str(json).map_err(|_| Error::LlmMalformed {
        snippet: snippet(response),
    })?;

    let hop = raw.hop.clamp(1, 3);
    Ok(HopDirective {
        hop,
        entities: raw.entities,
        sentences: raw.sentences,
        relation_hint: raw.relation_hint.filter(|h| !h.trim().is_empty()),
        graph_gate: if hop >= 2 {
            GraphGate::Always
        } else {
            GraphGate::Never
        },
    })
}

fn slice_between(response: &str, open: char, close: char) -> Result<&str> {
    let start = response.find(open);
    let end = response.rfind(close);
    match (start, end) {
        (Some(s), Some(e)) if e > s => Ok(&response[s..=e]),
        _ => Err(Error::LlmMalformed {
            snippet: snippet(response),
        }),
    }
}

fn snippet(response: &str) -> String {
    response.chars().take(120).collect()
}
