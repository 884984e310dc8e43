//! Keyword store adapter: staged lookup over canonical names,
//! synonyms and descriptions.
//!
//! Stage 1 runs direct matches in precedence order (exact, prefix,
//! synonym, substring). Stage 2 fires only when stage 1 found fewer
//! than a configured number of records: entities discovered through
//! description substrings re-enter by canonical name so description
//! noise cannot dominate ranking.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OpenFlags, params};
use tracing::trace;

use super::{KeywordHit, KeywordSearch};
use crate::error::{Error, Result};
use crate::model::{Category, EntityRecord, MatchKind};

/// Stage 2 fires when stage 1 produced fewer hits than this.
const DESCRIPTION_FALLBACK_THRESHOLD: usize = 3;

/// Keyword store over the `entities` and `synonyms` tables.
pub struct SqliteKeywordStore {
    conn: Mutex<Connection>,
}

impl SqliteKeywordStore {
    /// Open the knowledge base read-only.
    ///
    /// # Errors
    ///
    /// Returns a database error if the file does not exist or is not
    /// a valid database.
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
            .map_err(|_| Error::Other("keyword store connection lock poisoned".to_string()))
    }

    fn search_blocking(
        &self,
        term: &str,
        categories: Option<&[Category]>,
        limit: usize,
    ) -> Result<Vec<KeywordHit>> {
        let term = term.trim();
        if term.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let cat_clause = category_clause(categories);
        let escaped = escape_like(term);

        let mut hits: Vec<KeywordHit> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let fetch = i64::try_from(limit.saturating_mul(2)).unwrap_or(i64::MAX);

        // Stage 1: direct matches in precedence order.
        collect_hits(
            &conn,
            &mut hits,
            &mut seen,
            &MatchKind::ExactName,
            &format!(
                "SELECT e.id, e.canonical_name, e.category, e.description, e.detail
                 FROM entities e
                 WHERE lower(e.canonical_name) = lower(?1){cat_clause}
                 LIMIT ?2"
            ),
            term,
            fetch,
        )?;
        collect_hits(
            &conn,
            &mut hits,
            &mut seen,
            &MatchKind::Prefix,
            &format!(
                "SELECT e.id, e.canonical_name, e.category, e.description, e.detail
                 FROM entities e
                 WHERE lower(e.canonical_name) LIKE lower(?1) || '%' ESCAPE '\\'{cat_clause}
                 LIMIT ?2"
            ),
            &escaped,
            fetch,
        )?;
        collect_hits(
            &conn,
            &mut hits,
            &mut seen,
            &MatchKind::Synonym,
            &format!(
                "SELECT e.id, e.canonical_name, e.category, e.description, e.detail
                 FROM entities e
                 JOIN synonyms s ON s.entity_id = e.id
                 WHERE lower(s.synonym) = lower(?1){cat_clause}
                 LIMIT ?2"
            ),
            term,
            fetch,
        )?;
        collect_hits(
            &conn,
            &mut hits,
            &mut seen,
            &MatchKind::Substring,
            &format!(
                "SELECT e.id, e.canonical_name, e.category, e.description, e.detail
                 FROM entities e
                 WHERE lower(e.canonical_name) LIKE '%' || lower(?1) || '%' ESCAPE '\\'{cat_clause}
                 LIMIT ?2"
            ),
            &escaped,
            fetch,
        )?;

        // Stage 2: description substrings, only when direct matches
        // are thin. Discovered entities enter at the lowest stage
        // score regardless of how strongly the description matched.
        if hits.len() < DESCRIPTION_FALLBACK_THRESHOLD {
            collect_hits(
                &conn,
                &mut hits,
                &mut seen,
                &MatchKind::DescriptionIlike,
                &format!(
                    "SELECT e.id, e.canonical_name, e.category, e.description, e.detail
                     FROM entities e
                     WHERE lower(e.description) LIKE '%' || lower(?1) || '%' ESCAPE '\\'{cat_clause}
                     LIMIT ?2"
                ),
                &escaped,
                fetch,
            )?;
        }

        trace!(term, hits = hits.len(), "keyword staged lookup");
        hits.truncate(limit);
        Ok(hits)
    }

    fn resolve_blocking(&self, term: &str) -> Result<Option<EntityRecord>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(None);
        }
        let conn = self.lock()?;

        for sql in [
            "SELECT e.id, e.canonical_name, e.category, e.description, e.detail
             FROM entities e
             WHERE lower(e.canonical_name) = lower(?1)
             LIMIT 1",
            "SELECT e.id, e.canonical_name, e.category, e.description, e.detail
             FROM entities e
             JOIN synonyms s ON s.entity_id = e.id
             WHERE lower(s.synonym) = lower(?1)
             LIMIT 1",
        ] {
            let mut stmt = conn.prepare(sql)?;
            let mut rows = stmt.query(params![term])?;
            if let Some(row) = rows.next()? {
                if let Some(entity) = entity_from_row(&conn, row)? {
                    return Ok(Some(entity));
                }
            }
        }
        Ok(None)
    }
}

impl KeywordSearch for SqliteKeywordStore {
    async fn search(
        &self,
        term: &str,
        categories: Option<&[Category]>,
        limit: usize,
    ) -> Result<Vec<KeywordHit>> {
        self.search_blocking(term, categories, limit)
    }

    async fn resolve_canonical(&self, term: &str) -> Result<Option<EntityRecord>> {
        self.resolve_blocking(term)
    }
}

/// `AND e.category IN (...)` clause from validated enum values.
fn category_clause(categories: Option<&[Category]>) -> String {
    match categories {
        None => String::new(),
        Some([]) => String::new(),
        Some(cats) => {
            let list = cats
                .iter()
                .map(|c| format!("'{}'", c.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            format!(" AND e.category IN ({list})")
        }
    }
}

/// Escape LIKE metacharacters for patterns using `ESCAPE '\'`.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn collect_hits(
    conn: &Connection,
    hits: &mut Vec<KeywordHit>,
    seen: &mut HashSet<String>,
    kind: &MatchKind,
    sql: &str,
    term: &str,
    fetch: i64,
) -> Result<()> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params![term, fetch])?;
    while let Some(row) = rows.next()? {
        let Some(entity) = entity_from_row(conn, row)? else {
            continue;
        };
        if seen.insert(entity.id.clone()) {
            hits.push(KeywordHit {
                entity,
                match_kind: kind.clone(),
                score: kind.stage_score(),
            });
        }
    }
    Ok(())
}

/// Map a `(id, canonical_name, category, description, detail)` row to
/// an [`EntityRecord`], loading its synonyms. Rows with an unknown
/// category are skipped rather than failing the whole query.
pub(crate) fn entity_from_row(
    conn: &Connection,
    row: &rusqlite::Row<'_>,
) -> Result<Option<EntityRecord>> {
    let id: String = row.get(0)?;
    let canonical_name: String = row.get(1)?;
    let category_raw: String = row.get(2)?;
    let description: String = row.get(3)?;
    let detail_json: String = row.get(4)?;

    let Ok(category) = category_raw.parse::<Category>() else {
        trace!(id, category = category_raw, "skipping row with unknown category");
        return Ok(None);
    };

    let mut stmt = conn.prepare("SELECT synonym FROM synonyms WHERE entity_id = ?1 ORDER BY synonym")?;
    let synonyms = stmt
        .query_map(params![id], |r| r.get::<_, String>(0))?
        .filter_map(std::result::Result::ok)
        .collect();

    let detail = serde_json::from_str(&detail_json).unwrap_or_default();

    Ok(Some(EntityRecord {
        id,
        canonical_name,
        synonyms,
        category,
        description,
        detail,
        relations: Vec::new(),
    }))
}
