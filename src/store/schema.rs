//! Knowledge-base schema.
//!
//! The retrieval engine only reads these tables; ingestion (external)
//! writes them. The DDL lives here so `lorebase init` and test
//! fixtures create exactly the shape the adapters expect.

use rusqlite::Connection;

use crate::error::Result;

/// The complete knowledge-base schema.
///
/// Embeddings are stored as little-endian f32 blobs with an explicit
/// `dimensions` column; the vector adapter skips chunks whose
/// dimensionality does not match the active embedding model.
pub const SCHEMA_SQL: &str = r"
-- Entities: the unit of retrieval
CREATE TABLE IF NOT EXISTS entities (
    id TEXT PRIMARY KEY,
    canonical_name TEXT NOT NULL,
    category TEXT NOT NULL CHECK (category IN ('NPC', 'MAP', 'ITEM', 'MONSTER')),
    description TEXT NOT NULL DEFAULT '',
    detail TEXT NOT NULL DEFAULT '{}',
    UNIQUE (canonical_name, category)
);

CREATE INDEX IF NOT EXISTS idx_entities_name ON entities(canonical_name);
CREATE INDEX IF NOT EXISTS idx_entities_category ON entities(category);

-- Synonyms: alternative surface forms, each resolving to one entity
CREATE TABLE IF NOT EXISTS synonyms (
    entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    synonym TEXT NOT NULL,
    PRIMARY KEY (entity_id, synonym)
);

CREATE INDEX IF NOT EXISTS idx_synonyms_term ON synonyms(synonym);

-- Chunks: embedded description fragments, many per entity
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    chunk_index INTEGER NOT NULL DEFAULT 0,
    chunk_text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_entity ON chunks(entity_id);

-- Edges: fixed-arity relationships between entities
CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    predicate TEXT NOT NULL,
    src_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    dst_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_edges_src ON edges(src_id, predicate);
CREATE INDEX IF NOT EXISTS idx_edges_dst ON edges(dst_id, predicate);
";

/// Apply the schema to a connection (idempotent).
///
/// # Errors
///
/// Returns a database error if any statement fails.
pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
