//! Graph store adapter: fixed-arity traversals over the `edges` table.
//!
//! Subjects are canonical names; the orchestrator resolves synonyms
//! before calling, and no re-resolution happens here. Every returned
//! record carries the relation that caused its inclusion and the full
//! entity payload joined from `entities`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OpenFlags, params};
use tracing::trace;

use super::keyword::entity_from_row;
use super::{EdgeSide, GraphSearch, Traversal};
use crate::error::{Error, Result};
use crate::model::{EntityRecord, Relation};

/// Graph store over the `edges` table.
pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
}

impl SqliteGraphStore {
    /// Open the knowledge base read-only.
    ///
    /// # Errors
    ///
    /// Returns a database error if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("graph store connection lock poisoned".to_string()))
    }

    fn traverse_blocking(
        &self,
        traversal: Traversal,
        subject: &str,
        limit: usize,
    ) -> Result<Vec<EntityRecord>> {
        if subject.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let subject_category = traversal.subject_category();
        let predicate = traversal.predicate();

        let peer_select = "SELECT p.id, p.canonical_name, p.category, p.description, p.detail";
        let sql = match traversal.edge_side() {
            EdgeSide::Outbound => format!(
                "{peer_select}
                 FROM entities s
                 JOIN edges ed ON ed.src_id = s.id AND ed.predicate = ?2
                 JOIN entities p ON p.id = ed.dst_id
                 WHERE s.canonical_name = ?1 AND s.category = ?3
                 LIMIT ?4"
            ),
            EdgeSide::Inbound => format!(
                "{peer_select}
                 FROM entities s
                 JOIN edges ed ON ed.dst_id = s.id AND ed.predicate = ?2
                 JOIN entities p ON p.id = ed.src_id
                 WHERE s.canonical_name = ?1 AND s.category = ?3
                 LIMIT ?4"
            ),
            EdgeSide::Both => format!(
                "{peer_select}
                 FROM entities s
                 JOIN edges ed ON (ed.src_id = s.id OR ed.dst_id = s.id) AND ed.predicate = ?2
                 JOIN entities p
                   ON p.id = CASE WHEN ed.src_id = s.id THEN ed.dst_id ELSE ed.src_id END
                 WHERE s.canonical_name = ?1 AND s.category = ?3
                 LIMIT ?4"
            ),
        };

        let relation = Relation {
            predicate: predicate.to_string(),
            peer_name: subject.to_string(),
            peer_category: subject_category,
        };

        let mut stmt = conn.prepare(&sql)?;
        let fetch = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = stmt.query(params![subject, predicate, subject_category.as_str(), fetch])?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            if let Some(mut entity) = entity_from_row(&conn, row)? {
                entity.relations.push(relation.clone());
                records.push(entity);
            }
        }

        trace!(
            ?traversal,
            subject,
            records = records.len(),
            "graph traversal"
        );
        Ok(records)
    }
}

impl GraphSearch for SqliteGraphStore {
    async fn traverse(
        &self,
        traversal: Traversal,
        subject: &str,
        limit: usize,
    ) -> Result<Vec<EntityRecord>> {
        self.traverse_blocking(traversal, subject, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;
    use crate::store::schema;

    fn fixture_store() -> (tempfile::TempDir, SqliteGraphStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.db");
        let conn = Connection::open(&path).unwrap();
        schema::apply(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO entities (id, canonical_name, category, description) VALUES
               ('npc_1', '다크로드', 'NPC', '도적 직업 교관'),
               ('npc_2', '미나', 'NPC', '물약 상인'),
               ('map_1', '커닝시티', 'MAP', '도적의 도시'),
               ('map_2', '지하철', 'MAP', '커닝시티 아래'),
               ('mon_1', '예티', 'MONSTER', '설산 몬스터'),
               ('itm_1', '아이스진', 'ITEM', '차가운 바지');
             INSERT INTO synonyms (entity_id, synonym) VALUES ('itm_1', '얼음바지');
             INSERT INTO edges (predicate, src_id, dst_id) VALUES
               ('LOCATED_IN', 'npc_1', 'map_1'),
               ('LOCATED_IN', 'npc_2', 'map_1'),
               ('SPAWNS_IN', 'mon_1', 'map_2'),
               ('DROPS', 'mon_1', 'itm_1'),
               ('SELLS', 'npc_2', 'itm_1'),
               ('CONNECTS_TO', 'map_1', 'map_2');",
        )
        .unwrap();
        drop(conn);
        let store = SqliteGraphStore::open(&path).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_npc_location() {
        let (_dir, store) = fixture_store();
        let maps = store
            .traverse(Traversal::NpcLocation, "다크로드", 10)
            .await
            .unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].canonical_name, "커닝시티");
        assert_eq!(maps[0].category, Category::Map);
        assert_eq!(maps[0].relations[0].predicate, "LOCATED_IN");
        assert_eq!(maps[0].relations[0].peer_name, "다크로드");
    }

    #[tokio::test]
    async fn test_item_droppers_and_sellers() {
        let (_dir, store) = fixture_store();
        let droppers = store
            .traverse(Traversal::ItemDroppers, "아이스진", 10)
            .await
            .unwrap();
        assert_eq!(droppers.len(), 1);
        assert_eq!(droppers[0].canonical_name, "예티");

        let sellers = store
            .traverse(Traversal::ItemSellers, "아이스진", 10)
            .await
            .unwrap();
        assert_eq!(sellers.len(), 1);
        assert_eq!(sellers[0].canonical_name, "미나");
    }

    #[tokio::test]
    async fn test_map_connections_bidirectional() {
        let (_dir, store) = fixture_store();
        let from_one = store
            .traverse(Traversal::MapConnections, "커닝시티", 10)
            .await
            .unwrap();
        assert_eq!(from_one[0].canonical_name, "지하철");

        let from_two = store
            .traverse(Traversal::MapConnections, "지하철", 10)
            .await
            .unwrap();
        assert_eq!(from_two[0].canonical_name, "커닝시티");
    }

    #[tokio::test]
    async fn test_map_npcs_and_monsters() {
        let (_dir, store) = fixture_store();
        let npcs = store
            .traverse(Traversal::MapNpcs, "커닝시티", 10)
            .await
            .unwrap();
        assert_eq!(npcs.len(), 2);

        let monsters = store
            .traverse(Traversal::MapMonsters, "지하철", 10)
            .await
            .unwrap();
        assert_eq!(monsters.len(), 1);
        assert_eq!(monsters[0].canonical_name, "예티");
    }

    #[tokio::test]
    async fn test_synonym_subject_returns_empty() {
        // Subjects must be canonical; no re-resolution here.
        let (_dir, store) = fixture_store();
        let records = store
            .traverse(Traversal::ItemDroppers, "얼음바지", 10)
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_category_subject_returns_empty() {
        let (_dir, store) = fixture_store();
        // 다크로드 is an NPC, not an ITEM.
        let records = store
            .traverse(Traversal::ItemDroppers, "다크로드", 10)
            .await
            .unwrap();
        assert!(records.is_empty());
    }
}
