//! Reciprocal Rank Fusion over per-source ranked lists.
//!
//! Deterministic fusion with:
//! - Configurable RRF constant k (default 60)
//! - Per-source weights inside the `[0.2, 1.5]` band
//! - Deduplication by entity id with contribution summing
//! - A fixed tie-breaking chain: keyword-store presence, then shorter
//!   canonical name, then lexicographic id
//! - Presentation-only normalization into `[0, 100]`

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::SourceWeights;
use crate::model::{EntityRecord, MatchKind, RetrievalResult, Source};

/// Epsilon for floating-point fused-score comparison.
const SCORE_EPSILON: f64 = 1e-12;

/// One entry of a per-source ranked list, rank already assigned by the
/// orchestrator (0-based; graph hits all enter at rank 0).
#[derive(Debug, Clone)]
pub struct RankedHit {
    pub entity: EntityRecord,
    pub rank: usize,
    pub raw_score: f64,
    pub match_kind: MatchKind,
}

/// A ranked list attributed to one source.
#[derive(Debug, Clone)]
pub struct SourceList {
    pub source: Source,
    pub hits: Vec<RankedHit>,
}

/// RRF contribution of one 0-based rank.
///
/// Uses the `1 / (k + rank + 1)` form, equivalent to `1 / (k + rank)`
/// over 1-based ranks: rank 0 contributes `1 / (k + 1)`.
#[inline]
#[allow(clippy::cast_precision_loss)]
fn rrf_contribution(k: u32, rank: usize, weight: f64) -> f64 {
    weight / (f64::from(k) + rank as f64 + 1.0)
}

fn weight_for(weights: &SourceWeights, source: Source) -> f64 {
    match source {
        Source::Keyword => weights.keyword,
        Source::Vector => weights.vector,
        Source::Graph => weights.graph,
    }
}

/// Fuse per-source ranked lists into one ranked list.
///
/// Entities are keyed by id; an entity present in several sources sums
/// its contributions and unions its `sources` set. The entity payload
/// is taken from the highest-precedence contributing source (keyword
/// first, then vector, then graph) with graph relations merged in.
#[must_use]
pub fn fuse(lists: &[SourceList], weights: &SourceWeights, k: u32) -> Vec<RetrievalResult> {
    let mut by_id: BTreeMap<String, RetrievalResult> = BTreeMap::new();

    for list in lists {
        for hit in &list.hits {
            let contribution = rrf_contribution(k, hit.rank, weight_for(weights, list.source));

            match by_id.get_mut(&hit.entity.id) {
                None => {
                    let result = RetrievalResult {
                        entity: hit.entity.clone(),
                        fused_score: contribution,
                        score: 0.0,
                        sources: std::iter::once(list.source).collect(),
                        match_type: hit.match_kind.clone(),
                        per_source_rank: std::iter::once((list.source, hit.rank)).collect(),
                        per_source_score: std::iter::once((list.source, hit.raw_score)).collect(),
                    };
                    by_id.insert(hit.entity.id.clone(), result);
                }
                Some(existing) => {
                    // One contribution per (entity, source); a duplicate
                    // within the same source keeps its best rank.
                    if existing.sources.contains(&list.source) {
                        let best = existing
                            .per_source_rank
                            .get(&list.source)
                            .copied()
                            .unwrap_or(usize::MAX);
                        if hit.rank < best {
                            let old = rrf_contribution(k, best, weight_for(weights, list.source));
                            existing.fused_score += contribution - old;
                            existing.per_source_rank.insert(list.source, hit.rank);
                            existing.per_source_score.insert(list.source, hit.raw_score);
                        }
                    } else {
                        existing.fused_score += contribution;
                        existing.sources.insert(list.source);
                        existing.per_source_rank.insert(list.source, hit.rank);
                        existing.per_source_score.insert(list.source, hit.raw_score);
                    }

                    if hit.match_kind.precedence() > existing.match_type.precedence() {
                        existing.match_type = hit.match_kind.clone();
                    }
                    // Keyword rows carry the fullest payload; keep the
                    // existing record but absorb relations either way.
                    if list.source == Source::Keyword && existing.entity.description.is_empty() {
                        let relations = existing.entity.relations.clone();
                        existing.entity = hit.entity.clone();
                        existing.entity.merge_relations(&relations);
                    } else {
                        existing.entity.merge_relations(&hit.entity.relations);
                    }
                }
            }
        }
    }

    let mut fused: Vec<RetrievalResult> = by_id.into_values().collect();
    fused.sort_by(fused_cmp);
    normalize(&mut fused);
    fused
}

/// Deterministic ordering: fused score descending, then keyword-store
/// presence, then shorter canonical name, then lexicographic id.
fn fused_cmp(a: &RetrievalResult, b: &RetrievalResult) -> Ordering {
    let diff = b.fused_score - a.fused_score;
    if diff.abs() > SCORE_EPSILON {
        return if diff > 0.0 {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }

    let a_ks = a.sources.contains(&Source::Keyword);
    let b_ks = b.sources.contains(&Source::Keyword);
    if a_ks != b_ks {
        return if a_ks { Ordering::Less } else { Ordering::Greater };
    }

    let a_len = a.entity.canonical_name.chars().count();
    let b_len = b.entity.canonical_name.chars().count();
    a_len
        .cmp(&b_len)
        .then_with(|| a.entity.id.cmp(&b.entity.id))
}

/// Scale fused scores into `[0, 100]` relative to the per-query
/// maximum. Presentation only; ordering is already fixed.
fn normalize(fused: &mut [RetrievalResult]) {
    let max = fused.first().map_or(0.0, |r| r.fused_score);
    if max <= 0.0 {
        return;
    }
    for result in fused.iter_mut() {
        result.score = result.fused_score / max * 100.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    fn hit(id: &str, name: &str, rank: usize, kind: MatchKind) -> RankedHit {
        RankedHit {
            entity: EntityRecord::new(id, name, Category::Npc),
            rank,
            raw_score: 1.0,
            match_kind: kind,
        }
    }

    fn ks_list(hits: Vec<RankedHit>) -> SourceList {
        SourceList {
            source: Source::Keyword,
            hits,
        }
    }

    fn vs_list(hits: Vec<RankedHit>) -> SourceList {
        SourceList {
            source: Source::Vector,
            hits,
        }
    }

    fn gs_list(hits: Vec<RankedHit>) -> SourceList {
        SourceList {
            source: Source::Graph,
            hits,
        }
    }

    #[test]
    fn test_rank_zero_contribution() {
        let c = rrf_contribution(60, 0, 1.0);
        assert!((c - 1.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_sources_agree_scores_100() {
        let lists = vec![
            ks_list(vec![hit("e1", "다크로드", 0, MatchKind::ExactName)]),
            vs_list(vec![hit("e1", "다크로드", 0, MatchKind::VectorSemantic)]),
            gs_list(vec![hit(
                "e1",
                "다크로드",
                0,
                MatchKind::GraphRelation("LOCATED_IN".into()),
            )]),
        ];
        let fused = fuse(&lists, &SourceWeights::default(), 60);
        assert_eq!(fused.len(), 1);
        let top = &fused[0];
        assert!((top.fused_score - 3.0 / 61.0).abs() < 1e-12);
        assert!((top.score - 100.0).abs() < 1e-9);
        assert_eq!(top.sources.len(), 3);
        assert_eq!(top.match_type, MatchKind::ExactName);
    }

    #[test]
    fn test_contributions_sum_across_sources() {
        let lists = vec![
            ks_list(vec![
                hit("a", "미나", 0, MatchKind::ExactName),
                hit("b", "로빈", 1, MatchKind::Synonym),
            ]),
            vs_list(vec![hit("b", "로빈", 0, MatchKind::VectorSemantic)]),
        ];
        let fused = fuse(&lists, &SourceWeights::default(), 60);
        let b = fused.iter().find(|r| r.entity.id == "b").unwrap();
        let expected = 1.0 / 62.0 + 1.0 / 61.0;
        assert!((b.fused_score - expected).abs() < 1e-12);
        // b (two sources) outranks a (one source at rank 0)
        assert_eq!(fused[0].entity.id, "b");
    }

    #[test]
    fn test_tiebreak_keyword_presence_wins() {
        let lists = vec![
            ks_list(vec![hit("kw", "상인", 0, MatchKind::ExactName)]),
            vs_list(vec![hit("vec", "상단", 0, MatchKind::VectorSemantic)]),
        ];
        let fused = fuse(&lists, &SourceWeights::default(), 60);
        assert_eq!(fused[0].entity.id, "kw");
    }

    #[test]
    fn test_tiebreak_shorter_name_then_id() {
        // Graph hits all enter at rank 0, so these tie on fused score.
        let lists_graph = vec![gs_list(vec![
            hit("z", "긴이름의엔피시", 0, MatchKind::GraphRelation("SELLS".into())),
            hit("a", "미나", 0, MatchKind::GraphRelation("SELLS".into())),
        ])];
        let fused = fuse(&lists_graph, &SourceWeights::default(), 60);
        assert_eq!(fused[0].entity.id, "a", "shorter canonical name first");

        let lists_same_len = vec![gs_list(vec![
            hit("b", "로빈", 0, MatchKind::GraphRelation("SELLS".into())),
            hit("a", "미나", 0, MatchKind::GraphRelation("SELLS".into())),
        ])];
        let fused = fuse(&lists_same_len, &SourceWeights::default(), 60);
        assert_eq!(fused[0].entity.id, "a", "lexicographic id breaks the rest");
    }

    #[test]
    fn test_weights_scale_contributions() {
        let weights = SourceWeights {
            keyword: 1.5,
            vector: 0.2,
            graph: 1.0,
        };
        let lists = vec![
            ks_list(vec![hit("a", "미나", 0, MatchKind::ExactName)]),
            vs_list(vec![hit("b", "로빈", 0, MatchKind::VectorSemantic)]),
        ];
        let fused = fuse(&lists, &weights, 60);
        assert_eq!(fused[0].entity.id, "a");
        assert!((fused[0].fused_score - 1.5 / 61.0).abs() < 1e-12);
        assert!((fused[1].fused_score - 0.2 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn test_monotone_source_contribution() {
        // Adding a record to one source's list can only raise that
        // record's fused score.
        let base = vec![ks_list(vec![hit("a", "미나", 0, MatchKind::ExactName)])];
        let fused_before = fuse(&base, &SourceWeights::default(), 60);
        let a_before = fused_before[0].fused_score;

        let extended = vec![
            ks_list(vec![hit("a", "미나", 0, MatchKind::ExactName)]),
            vs_list(vec![hit("a", "미나", 3, MatchKind::VectorSemantic)]),
        ];
        let fused_after = fuse(&extended, &SourceWeights::default(), 60);
        assert!(fused_after[0].fused_score > a_before);
    }

    #[test]
    fn test_duplicate_within_source_keeps_best_rank() {
        let lists = vec![ks_list(vec![
            hit("a", "미나", 2, MatchKind::Substring),
            hit("a", "미나", 0, MatchKind::ExactName),
        ])];
        let fused = fuse(&lists, &SourceWeights::default(), 60);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].fused_score - 1.0 / 61.0).abs() < 1e-12);
        assert_eq!(fused[0].per_source_rank[&Source::Keyword], 0);
    }

    #[test]
    fn test_determinism_over_runs() {
        let lists = vec![
            ks_list(
                (0..10)
                    .map(|i| hit(&format!("e{i}"), &format!("엔피시{i}"), i, MatchKind::Prefix))
                    .collect(),
            ),
            vs_list(
                (5..15)
                    .map(|i| {
                        hit(
                            &format!("e{i}"),
                            &format!("엔피시{i}"),
                            i - 5,
                            MatchKind::VectorSemantic,
                        )
                    })
                    .collect(),
            ),
        ];
        let first: Vec<String> = fuse(&lists, &SourceWeights::default(), 60)
            .into_iter()
            .map(|r| r.entity.id)
            .collect();
        for _ in 0..50 {
            let run: Vec<String> = fuse(&lists, &SourceWeights::default(), 60)
                .into_iter()
                .map(|r| r.entity.id)
                .collect();
            assert_eq!(run, first);
        }
    }

    #[test]
    fn test_empty_lists_fuse_to_empty() {
        let fused = fuse(&[], &SourceWeights::default(), 60);
        assert!(fused.is_empty());
    }

    #[test]
    fn test_graph_relations_merged_into_keyword_payload() {
        let mut graph_entity = EntityRecord::new("a", "미나", Category::Npc);
        graph_entity.relations.push(crate::model::Relation {
            predicate: "SELLS".to_string(),
            peer_name: "빨간 포션".to_string(),
            peer_category: Category::Item,
        });
        let lists = vec![
            ks_list(vec![hit("a", "미나", 0, MatchKind::ExactName)]),
            gs_list(vec![RankedHit {
                entity: graph_entity,
                rank: 0,
                raw_score: 1.0,
                match_kind: MatchKind::GraphRelation("SELLS".into()),
            }]),
        ];
        let fused = fuse(&lists, &SourceWeights::default(), 60);
        assert_eq!(fused[0].entity.relations.len(), 1);
        assert_eq!(fused[0].match_type, MatchKind::ExactName);
    }
}
