//! Vector store adapter: brute-force cosine over embedded chunks.
//!
//! The query is embedded with the injected provider, compared against
//! every stored chunk, deduplicated to one chunk per entity (highest
//! similarity wins) and joined to `entities` so only confirmed
//! entities come back. Efficient for the <50K-chunk knowledge bases
//! this engine targets.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OpenFlags};
use tracing::{trace, warn};

use super::keyword::entity_from_row;
use super::{VectorHit, VectorSearch};
use crate::embed::BoxedEmbedder;
use crate::error::{Error, Result};
use crate::model::Category;

/// Vector store over the `chunks` table.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    embedder: Option<BoxedEmbedder>,
}

impl SqliteVectorStore {
    /// Open the knowledge base read-only with an optional embedder.
    ///
    /// Without an embedder every search fails open (the orchestrator
    /// logs a warning and fuses the other sources).
    ///
    /// # Errors
    ///
    /// Returns a database error if the file cannot be opened.
    pub fn open(path: &Path, embedder: Option<BoxedEmbedder>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("vector store connection lock poisoned".to_string()))
    }

    fn scan_blocking(
        &self,
        query_embedding: &[f32],
        categories: Option<&[Category]>,
        top_k: usize,
    ) -> Result<Vec<VectorHit>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT c.id, c.embedding, c.dimensions, c.entity_id, e.category
             FROM chunks c
             JOIN entities e ON e.id = c.entity_id",
        )?;

        let mut scored: Vec<(String, String, f32)> = Vec::new();
        let mut mismatched = 0usize;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let chunk_id: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            let dimensions: usize = row.get::<_, i64>(2)?.try_into().unwrap_or(0);
            let entity_id: String = row.get(3)?;
            let category_raw: String = row.get(4)?;

            if let Some(filter) = categories {
                let keep = category_raw
                    .parse::<Category>()
                    .is_ok_and(|c| filter.contains(&c));
                if !keep {
                    continue;
                }
            }

            if dimensions != query_embedding.len() {
                mismatched += 1;
                continue;
            }

            let embedding = blob_to_embedding(&blob);
            let similarity = cosine_similarity(query_embedding, &embedding);
            scored.push((chunk_id, entity_id, similarity));
        }
        drop(rows);
        drop(stmt);

        if mismatched > 0 {
            warn!(
                mismatched,
                query_dim = query_embedding.len(),
                "skipped chunks with mismatched embedding dimensionality"
            );
        }

        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        // At most one chunk per entity: without this, near-duplicate
        // description chunks saturate the top-k and starve fusion.
        let mut seen_entities: HashSet<String> = HashSet::new();
        let mut hits = Vec::new();
        for (chunk_id, entity_id, similarity) in scored {
            if hits.len() >= top_k {
                break;
            }
            if !seen_entities.insert(entity_id.clone()) {
                continue;
            }
            let mut stmt = conn.prepare(
                "SELECT id, canonical_name, category, description, detail
                 FROM entities WHERE id = ?1",
            )?;
            let mut rows = stmt.query([&entity_id])?;
            if let Some(row) = rows.next()? {
                if let Some(entity) = entity_from_row(&conn, row)? {
                    hits.push(VectorHit {
                        entity,
                        chunk_id,
                        similarity,
                    });
                }
            }
        }

        trace!(hits = hits.len(), "vector scan");
        Ok(hits)
    }
}

impl VectorSearch for SqliteVectorStore {
    async fn search(
        &self,
        text: &str,
        categories: Option<&[Category]>,
        top_k: usize,
    ) -> Result<Vec<VectorHit>> {
        if top_k == 0 || text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| Error::Embedding("no embedding provider configured".to_string()))?;

        let query_embedding = embedder.embed(text).await?;
        self.scan_blocking(&query_embedding, categories, top_k)
    }
}

/// Serialize an embedding as little-endian f32 bytes, the on-disk
/// chunk format.
#[must_use]
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`embedding_to_blob`].
#[must_use]
pub fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}

/// Cosine similarity between two equal-length vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{EmbedderInfo, EmbeddingProvider};
    use crate::store::schema;

    /// Maps fixed strings to fixed unit vectors.
    struct FakeEmbedder;

    impl EmbeddingProvider for FakeEmbedder {
        fn info(&self) -> EmbedderInfo {
            EmbedderInfo {
                name: "fake".to_string(),
                model: "fake".to_string(),
                dimensions: 3,
            }
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(match text {
                t if t.contains("물약") => vec![1.0, 0.0, 0.0],
                t if t.contains("도적") => vec![0.0, 1.0, 0.0],
                _ => vec![0.0, 0.0, 1.0],
            })
        }
    }

    fn fixture_store() -> (tempfile::TempDir, SqliteVectorStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.db");
        let conn = Connection::open(&path).unwrap();
        schema::apply(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO entities (id, canonical_name, category, description) VALUES
               ('npc_2', '미나', 'NPC', '헤네시스에서 물약을 파는 상인'),
               ('npc_1', '다크로드', 'NPC', '도적 직업 교관');",
        )
        .unwrap();
        // Ten near-duplicate potion chunks for one entity, one rogue chunk.
        for i in 0..10 {
            #[allow(clippy::cast_precision_loss)]
            let v = vec![1.0 - (i as f32) * 0.01, (i as f32) * 0.01, 0.0];
            conn.execute(
                "INSERT INTO chunks (id, entity_id, chunk_index, chunk_text, embedding, dimensions)
                 VALUES (?1, 'npc_2', ?2, '물약 상인 설명', ?3, 3)",
                rusqlite::params![format!("ch_potion_{i}"), i, embedding_to_blob(&v)],
            )
            .unwrap();
        }
        conn.execute(
            "INSERT INTO chunks (id, entity_id, chunk_index, chunk_text, embedding, dimensions)
             VALUES ('ch_rogue', 'npc_1', 0, '도적 교관 설명', ?1, 3)",
            rusqlite::params![embedding_to_blob(&[0.0, 1.0, 0.0])],
        )
        .unwrap();
        drop(conn);
        let store = SqliteVectorStore::open(&path, Some(BoxedEmbedder::new(FakeEmbedder))).unwrap();
        (dir, store)
    }

    #[test]
    fn test_blob_roundtrip() {
        let embedding = vec![0.25_f32, -1.5, 3.75];
        assert_eq!(blob_to_embedding(&embedding_to_blob(&embedding)), embedding);
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_dedup_one_chunk_per_entity() {
        let (_dir, store) = fixture_store();
        let hits = store.search("물약 파는 사람", None, 10).await.unwrap();
        // Ten potion chunks collapse into one hit for 미나 at rank 0.
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entity.canonical_name, "미나");
        assert_eq!(hits[0].chunk_id, "ch_potion_0");
    }

    #[tokio::test]
    async fn test_semantic_ordering() {
        let (_dir, store) = fixture_store();
        let hits = store.search("도적", None, 10).await.unwrap();
        assert_eq!(hits[0].entity.canonical_name, "다크로드");
    }

    #[tokio::test]
    async fn test_category_filter_restricts_hits() {
        let (_dir, store) = fixture_store();
        let hits = store
            .search("물약", Some(&[Category::Monster]), 10)
            .await
            .unwrap();
        assert!(hits.is_empty());

        let hits = store
            .search("물약", Some(&[Category::Npc]), 10)
            .await
            .unwrap();
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn test_no_embedder_fails_open_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.db");
        let conn = Connection::open(&path).unwrap();
        schema::apply(&conn).unwrap();
        drop(conn);
        let store = SqliteVectorStore::open(&path, None).unwrap();
        assert!(matches!(
            store.search("물약", None, 5).await,
            Err(Error::Embedding(_))
        ));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_skipped() {
        let (dir, _store) = fixture_store();
        let path = dir.path().join("kb.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "INSERT INTO chunks (id, entity_id, chunk_index, chunk_text, embedding, dimensions)
             VALUES ('ch_bad', 'npc_1', 1, '차원이 다른 청크', ?1, 5)",
            rusqlite::params![embedding_to_blob(&[1.0, 0.0, 0.0, 0.0, 0.0])],
        )
        .unwrap();
        drop(conn);
        let store = SqliteVectorStore::open(&path, Some(BoxedEmbedder::new(FakeEmbedder))).unwrap();
        let hits = store.search("물약", None, 10).await.unwrap();
        assert!(hits.iter().all(|h| h.chunk_id != "ch_bad"));
    }
}
