//! Typed records flowing through the retrieval pipeline.
//!
//! - [`entity`] - knowledge-base records ([`EntityRecord`], [`Category`], [`Relation`])
//! - [`plan`] - router output shapes ([`RoutePlan`], [`PlanStep`], [`HopDirective`])
//! - [`result`] - ranked results and the search response envelope

mod entity;
mod plan;
mod result;

pub use entity::{Category, EntityRecord, Relation};
pub use plan::{GraphGate, HopDirective, PlanStep, RoutePlan, RouterOutput};
pub use result::{MatchKind, RetrievalResult, SearchResponse, Source};
