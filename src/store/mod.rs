//! Store adapters: keyword, vector, and graph views over the
//! knowledge base.
//!
//! Each adapter is a trait so tests substitute recorded-response
//! fakes; the shipped implementations read one sqlite file. Adapters
//! return `Result`; the orchestrator converts any error into an empty
//! contribution plus a warning (fails open).

pub mod graph;
pub mod keyword;
pub mod schema;
pub mod vector;

pub use graph::SqliteGraphStore;
pub use keyword::SqliteKeywordStore;
pub use vector::SqliteVectorStore;

use crate::error::Result;
use crate::model::{Category, EntityRecord, MatchKind};

/// One hit from the keyword store's staged lookup.
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub entity: EntityRecord,
    pub match_kind: MatchKind,
    /// Ordinal stage score; fusion uses ranks, never this value
    /// across sources.
    pub score: i64,
}

/// One hit from the vector store, already joined to its entity.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub entity: EntityRecord,
    pub chunk_id: String,
    pub similarity: f32,
}

/// Keyword search surface.
pub trait KeywordSearch: Send + Sync {
    /// Staged lookup over canonical names, synonyms and descriptions.
    fn search(
        &self,
        term: &str,
        categories: Option<&[Category]>,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<KeywordHit>>> + Send;

    /// Resolve a surface form (canonical name or synonym) to its
    /// entity. Used by the orchestrator to canonicalize graph
    /// subjects; graph traversals never re-resolve.
    fn resolve_canonical(
        &self,
        term: &str,
    ) -> impl std::future::Future<Output = Result<Option<EntityRecord>>> + Send;
}

/// Vector search surface.
pub trait VectorSearch: Send + Sync {
    /// Top-k semantic neighbors for a free-text query, at most one
    /// hit per entity, optionally restricted to entity categories.
    fn search(
        &self,
        text: &str,
        categories: Option<&[Category]>,
        top_k: usize,
    ) -> impl std::future::Future<Output = Result<Vec<VectorHit>>> + Send;
}

/// The fixed traversal catalog. One hop per call; multi-hop questions
/// are sequential calls issued by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Traversal {
    /// MAPs where an NPC resides.
    NpcLocation,
    /// MAPs where a monster spawns.
    MonsterLocations,
    /// NPCs that sell an item.
    ItemSellers,
    /// MONSTERs that drop an item.
    ItemDroppers,
    /// Neighboring MAPs.
    MapConnections,
    /// NPCs in a MAP.
    MapNpcs,
    /// MONSTERs in a MAP.
    MapMonsters,
}

/// Which side of the edge the subject sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSide {
    /// Subject is the edge source; peers are destinations.
    Outbound,
    /// Subject is the edge destination; peers are sources.
    Inbound,
    /// Undirected neighborhood (map connections).
    Both,
}

impl Traversal {
    /// Edge predicate in the `edges` table.
    #[must_use]
    pub const fn predicate(&self) -> &'static str {
        match self {
            Self::NpcLocation | Self::MapNpcs => "LOCATED_IN",
            Self::MonsterLocations | Self::MapMonsters => "SPAWNS_IN",
            Self::ItemSellers => "SELLS",
            Self::ItemDroppers => "DROPS",
            Self::MapConnections => "CONNECTS_TO",
        }
    }

    /// Category the subject must have.
    #[must_use]
    pub const fn subject_category(&self) -> Category {
        match self {
            Self::NpcLocation => Category::Npc,
            Self::MonsterLocations => Category::Monster,
            Self::ItemSellers | Self::ItemDroppers => Category::Item,
            Self::MapConnections | Self::MapNpcs | Self::MapMonsters => Category::Map,
        }
    }

    #[must_use]
    pub const fn edge_side(&self) -> EdgeSide {
        match self {
            Self::NpcLocation | Self::MonsterLocations => EdgeSide::Outbound,
            Self::ItemSellers | Self::ItemDroppers | Self::MapNpcs | Self::MapMonsters => {
                EdgeSide::Inbound
            }
            Self::MapConnections => EdgeSide::Both,
        }
    }

    /// Default traversal set for a resolved subject when the router
    /// supplied no usable relation hint.
    #[must_use]
    pub fn defaults_for(category: Category) -> Vec<Self> {
        match category {
            Category::Npc => vec![Self::NpcLocation],
            Category::Monster => vec![Self::MonsterLocations],
            Category::Item => vec![Self::ItemSellers, Self::ItemDroppers],
            Category::Map => vec![Self::MapConnections, Self::MapNpcs, Self::MapMonsters],
        }
    }

    /// Interpret a router relation hint (e.g. `ITEM-MONSTER`) for a
    /// subject of the given category. Falls back to `None` when the
    /// hint names no usable pairing; callers then use
    /// [`Traversal::defaults_for`].
    #[must_use]
    pub fn from_hint(hint: &str, subject: Category) -> Option<Self> {
        let upper = hint.to_uppercase();
        let mentions = |cat: Category| upper.contains(cat.as_str());

        match subject {
            Category::Item if mentions(Category::Monster) => Some(Self::ItemDroppers),
            Category::Item if mentions(Category::Npc) => Some(Self::ItemSellers),
            Category::Npc if mentions(Category::Map) => Some(Self::NpcLocation),
            Category::Monster if mentions(Category::Map) => Some(Self::MonsterLocations),
            Category::Map if mentions(Category::Npc) => Some(Self::MapNpcs),
            Category::Map if mentions(Category::Monster) => Some(Self::MapMonsters),
            Category::Map if mentions(Category::Map) => Some(Self::MapConnections),
            _ => None,
        }
    }
}

/// Graph traversal surface.
pub trait GraphSearch: Send + Sync {
    /// One traversal from a canonical subject name. Callers resolve
    /// synonyms first; passing a non-canonical subject returns empty.
    fn traverse(
        &self,
        traversal: Traversal,
        subject: &str,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<EntityRecord>>> + Send;
}
