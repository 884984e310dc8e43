//! Search command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use tracing::debug;

use super::resolve_db_path;
use crate::cli::SearchArgs;
use crate::config::EngineConfig;
use crate::embed::create_embedder;
use crate::engine::{SearchEngine, SearchOptions};
use crate::error::{Error, Result};
use crate::llm::create_llm_client;
use crate::model::SearchResponse;
use crate::rerank::HttpReranker;
use crate::store::{SqliteGraphStore, SqliteKeywordStore, SqliteVectorStore};

/// Execute the search command.
pub fn execute(args: &SearchArgs, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("cannot resolve a knowledge-base path".to_string()))?;

    let mut config = EngineConfig::from_env()?;
    if let Some(strategy) = &args.strategy {
        config.strategy = strategy.parse()?;
    }
    config.limit = args.limit;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("failed to create async runtime: {e}")))?;

    let response = rt.block_on(async {
        let llm = create_llm_client().await.map(Arc::new);
        debug!(llm = llm.is_some(), "LLM client");
        let embedder = create_embedder().await;
        debug!(embedder = embedder.is_some(), "embedding provider");

        let keyword = SqliteKeywordStore::open(&db_path)?;
        let vector = SqliteVectorStore::open(&db_path, embedder)?;
        let graph = SqliteGraphStore::open(&db_path)?;

        let reranker = HttpReranker::from_env();
        let mut config = config;
        if reranker.is_some() {
            config.reranker_enabled = true;
        }

        let engine = SearchEngine::new(config, keyword, vector, graph, llm)?;
        let options = SearchOptions {
            limit: Some(args.limit),
            strategy: None,
            debug: args.debug,
        };

        match reranker {
            Some(reranker) => {
                engine
                    .with_reranker(reranker)
                    .search_with(&args.query, options, None)
                    .await
            }
            None => engine.search_with(&args.query, options, None).await,
        }
    })?;

    render(&response, args.debug, json)
}

fn render(response: &SearchResponse, debug: bool, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(response)?);
        return Ok(());
    }

    if response.results.is_empty() {
        println!("No results.");
        println!();
        println!(
            "  strategy: {} ({}ms)",
            response.telemetry.strategy_actual, response.telemetry.elapsed_ms
        );
        return Ok(());
    }

    println!(
        "Results ({}, strategy: {}, {}ms{}):",
        response.results.len(),
        response.telemetry.strategy_actual,
        response.telemetry.elapsed_ms,
        if response.telemetry.reranked {
            ", reranked"
        } else {
            ""
        }
    );
    println!();

    for (i, result) in response.results.iter().enumerate() {
        let sources: Vec<&str> = result.sources.iter().map(|s| s.as_str()).collect();
        println!(
            "{}. [{:>3.0}] {} {} {}",
            i + 1,
            result.score,
            result.entity.canonical_name.bold(),
            format!("({})", result.entity.category).dimmed(),
            format!("[{}]", sources.join("+")).cyan()
        );

        if !result.entity.description.is_empty() {
            let description: String = result.entity.description.chars().take(100).collect();
            println!("    {description}");
        }
        for relation in &result.entity.relations {
            println!(
                "    {} {} ({})",
                relation.predicate.dimmed(),
                relation.peer_name,
                relation.peer_category
            );
        }
        if debug {
            for (source, rank) in &result.per_source_rank {
                let raw = result
                    .per_source_score
                    .get(source)
                    .copied()
                    .unwrap_or_default();
                println!("    {source}: rank {rank}, raw {raw:.3}");
            }
            println!("    match: {}", result.match_type.tag());
        }
        println!();
    }

    Ok(())
}
