//! Store inspection commands: an aggregate overview, a per-document listing,
//! and a single-document detail view. Used by `hirag info`, `hirag list`,
//! and `hirag inspect` to give confidence that builds and invalidations are
//! doing what they should.

use anyhow::Result;

use crate::config::Config;
use crate::coordinator::CacheCoordinator;
use crate::models::{Stage, StageStatus};

/// Run the info command: aggregate statistics across all three stores.
///
/// Best-effort by contract: a store that cannot be opened or read is
/// reported as unavailable, never a nonzero exit.
pub async fn run_info(config: &Config) -> Result<()> {
    let db_size = std::fs::metadata(config.storage.metadata_db_path())
        .map(|m| m.len())
        .unwrap_or(0);

    println!("hirag — Store Overview");
    println!("======================");
    println!();
    println!("  Root:        {}", config.storage.root.display());
    println!("  Metadata:    {}", format_bytes(db_size));

    let coordinator = match CacheCoordinator::open(&config.storage).await {
        Ok(c) => c,
        Err(e) => {
            println!();
            println!("  Stores:      unavailable ({})", e);
            println!();
            return Ok(());
        }
    };

    match coordinator.objects().total_size() {
        Ok(size) => println!("  Objects:     {}", format_bytes(size)),
        Err(e) => println!("  Objects:     unavailable ({})", e),
    }
    match coordinator.vectors().total_size() {
        Ok(size) => println!("  Vectors:     {}", format_bytes(size)),
        Err(e) => println!("  Vectors:     unavailable ({})", e),
    }
    println!();

    let total_docs = match coordinator.meta().document_count().await {
        Ok(n) => {
            println!("  Documents:   {}", n);
            Some(n)
        }
        Err(e) => {
            println!("  Documents:   unavailable ({})", e);
            None
        }
    };

    match coordinator.meta().stage_counts().await {
        Ok(stage_counts) => {
            for (stage, count) in stage_counts {
                match total_docs {
                    Some(total) => {
                        println!("  {:<12} {} / {}", format!("{}:", stage), count, total)
                    }
                    None => println!("  {:<12} {}", format!("{}:", stage), count),
                }
            }
        }
        Err(e) => println!("  Stages:      unavailable ({})", e),
    }

    match coordinator.vectors().stats() {
        Ok((collections, records)) => {
            println!("  Collections: {} ({} records)", collections, records);
        }
        Err(e) => println!("  Collections: unavailable ({})", e),
    }

    match coordinator.meta().node_kind_totals().await {
        Ok(kind_totals) => {
            if !kind_totals.is_empty() {
                println!();
                println!("  Nodes by kind:");
                for (kind, total) in kind_totals {
                    println!("    {:<10} {}", kind, total);
                }
            }
        }
        Err(e) => println!("  Nodes:       unavailable ({})", e),
    }

    println!();
    Ok(())
}

/// Run the list command: one line per registered document.
pub async fn run_list(config: &Config) -> Result<()> {
    let coordinator = CacheCoordinator::open(&config.storage).await?;
    let docs = coordinator.meta().list_documents().await?;

    if docs.is_empty() {
        println!("No documents registered.");
        return Ok(());
    }

    println!(
        "{:>4}  {:<28} {:<10} {}",
        "ID", "NAME", "STAGES", "SOURCE"
    );
    println!("{}", "-".repeat(76));
    for (doc, status) in &docs {
        println!(
            "{:>4}  {:<28} {:<10} {}",
            doc.id,
            truncate(&doc.display_name, 28),
            stage_flags(status),
            doc.source_path
        );
    }
    Ok(())
}

/// Run the inspect command: everything known about one document.
pub async fn run_inspect(config: &Config, doc_id: i64) -> Result<()> {
    let coordinator = CacheCoordinator::open(&config.storage).await?;

    // Unknown ids are an error, not an empty report
    let doc = coordinator.meta().get_document(doc_id).await?;
    let status = coordinator.meta().stage_status(doc_id).await?;
    let summary = coordinator.meta().get_summary(doc_id).await?;

    println!("Document {}", doc.id);
    println!("  Name:        {}", doc.display_name);
    println!("  Source:      {}", doc.source_path);
    println!("  Fingerprint: {}", &doc.content_fingerprint[..16.min(doc.content_fingerprint.len())]);
    println!("  Registered:  {}", format_ts(doc.registered_at));
    match doc.last_built_at {
        Some(ts) => println!("  Last built:  {}", format_ts(ts)),
        None => println!("  Last built:  never"),
    }
    println!();
    println!("  Stages:      {}", stage_flags(&status));

    match coordinator.is_cache_valid(doc_id).await {
        Ok(valid) => println!("  Cache:       {}", if valid { "valid" } else { "incomplete or stale" }),
        Err(e) => println!("  Cache:       unknown ({})", e),
    }

    if !summary.is_empty() {
        println!();
        println!("  Nodes by kind:");
        for (kind, count) in summary {
            println!("    {:<10} {}", kind, count);
        }
    }

    match coordinator.vectors().open_collection(doc_id) {
        Ok(handle) => {
            let records = coordinator.vectors().record_count(&handle)?;
            println!();
            println!("  Embeddings:  {} records", records);
        }
        Err(_) => {
            println!();
            println!("  Embeddings:  none");
        }
    }

    Ok(())
}

/// Render stage flags as a compact `P I E` / `P I -` string, one letter per
/// stage in commit order.
fn stage_flags(status: &StageStatus) -> String {
    Stage::ALL
        .iter()
        .map(|stage| {
            if status.get(*stage) {
                stage.as_str()[..1].to_uppercase()
            } else {
                "-".to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{}…", cut)
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_flags_render_in_order() {
        let status = StageStatus {
            parsed: true,
            indexed: true,
            embedded: false,
        };
        assert_eq!(stage_flags(&status), "P I -");
        assert_eq!(stage_flags(&StageStatus::default()), "- - -");
    }

    #[test]
    fn bytes_format_scales() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
