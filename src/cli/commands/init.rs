//! Init command: create the knowledge-base schema.

use std::path::PathBuf;

use serde::Serialize;

use super::resolve_db_path;
use crate::error::{Error, Result};
use crate::store::schema;

#[derive(Serialize)]
struct InitOutput {
    path: String,
    created: bool,
}

/// Execute the init command.
pub fn execute(force: bool, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("cannot resolve a knowledge-base path".to_string()))?;

    if db_path.exists() && !force {
        return Err(Error::Config(format!(
            "knowledge base already exists at {} (use --force to recreate)",
            db_path.display()
        )));
    }

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if force && db_path.exists() {
        std::fs::remove_file(&db_path)?;
    }

    let conn = rusqlite::Connection::open(&db_path)?;
    schema::apply(&conn)?;

    if json {
        let output = InitOutput {
            path: db_path.display().to_string(),
            created: true,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized knowledge base at {}", db_path.display());
        println!("Load entities, chunks and edges with your ingestion pipeline, then run:");
        println!("  lorebase search \"다크로드\"");
    }

    Ok(())
}
