//! Router output shapes.
//!
//! The router emits one of two plan shapes: an ordered step list
//! (plan-shape) or a flat hop directive (hop-shape). Both are ephemeral,
//! one per query.

use serde::{Deserialize, Serialize};

use super::result::Source;
use crate::config::Strategy;

/// One step of a plan-shape route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub tool: Source,
    /// Search term for keyword steps, free text for vector steps,
    /// traversal subject for graph steps. Graph subjects may be
    /// synonyms or placeholders; the orchestrator substitutes a
    /// canonical name before the call.
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// When the orchestrator should run the graph batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphGate {
    Never,
    Always,
    /// Run the graph only when keyword + vector together produced
    /// fewer than this many records.
    IfFewerThan(usize),
}

/// Flat hop-shape directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopDirective {
    /// 1 = direct lookup, >=2 authorizes graph traversal.
    pub hop: u8,
    pub entities: Vec<String>,
    pub sentences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_hint: Option<String>,
    pub graph_gate: GraphGate,
}

/// The two route shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePlan {
    Steps(Vec<PlanStep>),
    Hop(HopDirective),
}

/// What `Router::route` returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterOutput {
    pub strategy: Strategy,
    /// True when the rules-based fallback produced the plan
    /// (LLM unreachable or unparseable).
    pub fallback: bool,
    pub plan: RoutePlan,
}

impl RouterOutput {
    /// Telemetry tag: the strategy name, or `fallback` when the
    /// rules-based path was taken.
    #[must_use]
    pub fn actual(&self) -> String {
        if self.fallback {
            "fallback".to_string()
        } else {
            self.strategy.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_output_actual_tag() {
        let output = RouterOutput {
            strategy: Strategy::Hop,
            fallback: true,
            plan: RoutePlan::Hop(HopDirective {
                hop: 1,
                entities: vec![],
                sentences: vec!["쿼리".to_string()],
                relation_hint: None,
                graph_gate: GraphGate::Never,
            }),
        };
        assert_eq!(output.actual(), "fallback");
    }

    #[test]
    fn test_plan_step_serializes_without_empty_rationale() {
        let step = PlanStep {
            tool: Source::Keyword,
            query: "다크로드".to_string(),
            rationale: None,
        };
        let json = serde_json::to_string(&step).unwrap();
        assert!(!json.contains("rationale"));
    }
}
