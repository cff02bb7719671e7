//! The search command: embed a query and rank one document's clauses.

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::coordinator::CacheCoordinator;
use crate::embedding;
use crate::error::StoreError;

/// Run the search command against one document's vector collection.
///
/// Requires a complete, valid cache; an incomplete document is an error
/// directing the operator to `hirag build`, not an empty result.
pub async fn run_search(
    config: &Config,
    doc_id: i64,
    query: &str,
    top_k: Option<usize>,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Search requires an embedding provider; set embedding.provider in the config");
    }

    let provider = embedding::create_provider(&config.embedding)
        .context("Failed to initialize embedding provider")?;

    let coordinator = CacheCoordinator::open(&config.storage).await?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let query_vector = embedding::embed_query(provider.as_ref(), &config.embedding, query)
        .await
        .context("Failed to embed query")?;

    let hits = match coordinator.search(doc_id, &query_vector, top_k).await {
        Ok(hits) => hits,
        Err(StoreError::CacheMiss { doc_id }) => {
            bail!("Document {} is not fully built; run `hirag build` or `hirag rebuild` first", doc_id)
        }
        Err(e) => return Err(e.into()),
    };

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!("Top {} result(s) for: {}", hits.len(), query);
    println!();
    for (rank, hit) in hits.iter().enumerate() {
        println!("{:>2}. [{:.4}] {}", rank + 1, hit.score, hit.node_ref);
        println!("    {}", hit.excerpt);
        println!();
    }
    Ok(())
}
