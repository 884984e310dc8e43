//! Knowledge-base entity records.
//!
//! [`EntityRecord`] is the universal result type: every store adapter
//! projects its rows into this shape before anything reaches fusion.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Entity categories in the knowledge base.
///
/// A closed set; adding a category is a source change, and every match
/// arm downstream is checked by the compiler when one is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Npc,
    Map,
    Item,
    Monster,
}

impl Category {
    /// Canonical string form, matching the stored `category` column.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Npc => "NPC",
            Self::Map => "MAP",
            Self::Item => "ITEM",
            Self::Monster => "MONSTER",
        }
    }

    /// All categories, for iteration and CLI help.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Npc, Self::Map, Self::Item, Self::Monster]
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "NPC" => Ok(Self::Npc),
            "MAP" => Ok(Self::Map),
            "ITEM" => Ok(Self::Item),
            "MONSTER" | "MOB" => Ok(Self::Monster),
            other => Err(Error::Config(format!("unknown category: {other}"))),
        }
    }
}

/// One relationship edge attached to a returned record.
///
/// Populated only when the graph store contributed the record (or
/// enriched it); `peer_name` is always a canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub predicate: String,
    pub peer_name: String,
    pub peer_category: Category,
}

/// The universal retrieval record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Opaque stable identifier, unique across all entities.
    pub id: String,
    /// Authoritative display name; `(canonical_name, category)` is unique.
    pub canonical_name: String,
    /// Alternative surface forms. Each resolves to at most one id
    /// within a category.
    #[serde(default)]
    pub synonyms: Vec<String>,
    pub category: Category,
    #[serde(default)]
    pub description: String,
    /// Category-specific structured payload. Schema is asserted at
    /// ingestion, not at retrieval; kept opaque here.
    #[serde(default)]
    pub detail: serde_json::Map<String, serde_json::Value>,
    /// Relationship edges, populated by the graph store.
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl EntityRecord {
    /// Minimal record with empty synonyms/description/detail/relations.
    #[must_use]
    pub fn new(id: impl Into<String>, canonical_name: impl Into<String>, category: Category) -> Self {
        Self {
            id: id.into(),
            canonical_name: canonical_name.into(),
            synonyms: Vec::new(),
            category,
            description: String::new(),
            detail: serde_json::Map::new(),
            relations: Vec::new(),
        }
    }

    /// Merge relations from another view of the same entity,
    /// skipping duplicates.
    pub fn merge_relations(&mut self, other: &[Relation]) {
        for rel in other {
            if !self.relations.contains(rel) {
                self.relations.push(rel.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for cat in Category::all() {
            let parsed: Category = cat.as_str().parse().unwrap();
            assert_eq!(parsed, cat);
        }
    }

    #[test]
    fn test_category_accepts_lowercase_and_mob() {
        assert_eq!("npc".parse::<Category>().unwrap(), Category::Npc);
        assert_eq!("mob".parse::<Category>().unwrap(), Category::Monster);
        assert!("weapon".parse::<Category>().is_err());
    }

    #[test]
    fn test_merge_relations_skips_duplicates() {
        let mut record = EntityRecord::new("itm_1", "아이스진", Category::Item);
        let rel = Relation {
            predicate: "DROPS".to_string(),
            peer_name: "예티".to_string(),
            peer_category: Category::Monster,
        };
        record.merge_relations(&[rel.clone()]);
        record.merge_relations(&[rel]);
        assert_eq!(record.relations.len(), 1);
    }
}
