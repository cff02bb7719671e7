//! The staged build pipeline: parse → index → embed.
//!
//! `build` is cache-aware (a valid cache is a no-op); `rebuild` always
//! invalidates first. Each stage writes its artifacts and then commits its
//! stage flag through the coordinator, so an interruption at any point
//! leaves the document incomplete and rebuildable, never falsely complete.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::coordinator::{CacheCoordinator, StagePayload};
use crate::embedding;
use crate::index;
use crate::models::{EmbeddingRecord, Stage};
use crate::parse;

/// Build one document's cache, skipping work when the cache is valid.
pub async fn run_build(config: &Config, source: &Path, name: Option<&str>) -> Result<()> {
    let coordinator = CacheCoordinator::open(&config.storage).await?;

    let source = source
        .canonicalize()
        .with_context(|| format!("Source file not found: {}", source.display()))?;
    let doc_id = coordinator
        .register_document(&source.to_string_lossy(), name)
        .await?;

    if coordinator.is_cache_valid(doc_id).await? {
        println!("Document {} is up to date, nothing to build.", doc_id);
        return Ok(());
    }

    build_document(&coordinator, config, doc_id).await
}

/// Force a rebuild of one document, or of every registered document.
pub async fn run_rebuild(config: &Config, doc_id: Option<i64>) -> Result<()> {
    let coordinator = CacheCoordinator::open(&config.storage).await?;

    let ids = match doc_id {
        Some(id) => {
            coordinator.meta().get_document(id).await?;
            vec![id]
        }
        None => coordinator.meta().list_doc_ids().await?,
    };

    if ids.is_empty() {
        println!("No documents registered.");
        return Ok(());
    }

    for id in ids {
        build_document(&coordinator, config, id).await?;
    }
    Ok(())
}

/// Clear cached artifacts for one document, or for all of them. Documents
/// stay registered; only derived state is purged.
pub async fn run_clear(config: &Config, doc_id: Option<i64>) -> Result<()> {
    let coordinator = CacheCoordinator::open(&config.storage).await?;

    match doc_id {
        Some(id) => {
            coordinator.invalidate(id).await?;
            println!("Cleared cache for document {}.", id);
        }
        None => {
            let n = coordinator.invalidate_all().await?;
            println!("Cleared cache for {} document(s).", n);
        }
    }
    Ok(())
}

/// Run the full staged build for one registered document.
///
/// Always starts from a clean slate: stale artifacts are purged and the
/// fingerprint is refreshed from the live source before parsing. When the
/// embedding provider is disabled the first two stages still complete; the
/// embedded stage is left pending and the cache stays incomplete.
async fn build_document(
    coordinator: &CacheCoordinator,
    config: &Config,
    doc_id: i64,
) -> Result<()> {
    let doc = coordinator.meta().get_document(doc_id).await?;
    println!("Building document {} ({})...", doc_id, doc.display_name);

    coordinator.invalidate(doc_id).await?;
    coordinator.refresh_fingerprint(doc_id).await?;

    // Stage 1: parse
    let tree = parse::parse_source(Path::new(&doc.source_path))?;
    info!(doc_id, nodes = tree.node_count(), "parsed hierarchy");
    let guard = coordinator.begin_stage(doc_id, Stage::Parsed).await?;
    coordinator
        .persist_artifacts(guard, &StagePayload::Parsed(tree.clone()))
        .await?;
    println!("  parsed: {} nodes", tree.node_count());

    // Stage 2: index
    let index = index::build_index_structures(&tree);
    let summaries = index::build_summaries(&tree);
    let guard = coordinator.begin_stage(doc_id, Stage::Indexed).await?;
    coordinator
        .persist_artifacts(guard, &StagePayload::Indexed { index, summaries })
        .await?;
    println!("  indexed");

    // Stage 3: embed
    if !config.embedding.is_enabled() {
        println!("  embedding provider is disabled; embedded stage left pending");
        return Ok(());
    }

    let provider = embedding::create_provider(&config.embedding)?;
    info!(
        model = provider.model_name(),
        dims = provider.dims(),
        "embedding clauses"
    );

    let inputs = index::embedding_inputs(&tree);
    let mut records = Vec::with_capacity(inputs.len());
    for batch in inputs.chunks(config.embedding.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
        let vectors =
            embedding::embed_texts(provider.as_ref(), &config.embedding, &texts).await?;
        for ((node_ref, text), vector) in batch.iter().zip(vectors) {
            records.push(EmbeddingRecord {
                node_ref: node_ref.clone(),
                vector,
                excerpt: text.clone(),
            });
        }
    }

    let count = records.len();
    let guard = coordinator.begin_stage(doc_id, Stage::Embedded).await?;
    coordinator
        .persist_artifacts(guard, &StagePayload::Embedded(records))
        .await?;
    println!("  embedded: {} records ({})", count, provider.model_name());

    Ok(())
}
