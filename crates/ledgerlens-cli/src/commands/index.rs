//! Retrieval commands: embed statement rows into the chunk store and search it

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ledgerlens_core::{
    anomaly::format_inr,
    config::EngineConfig,
    embed_batch,
    store::{Chunk, ChunkStore, SqliteChunkStore},
    CancelToken, ClassifiedTransaction, Embedder, OllamaEmbedder,
};
use serde_json::json;

use super::{classifier_for, load_statement, truncate};

/// `OLLAMA_HOST` wins over the configured base URL
fn embedder(config: &EngineConfig) -> Result<OllamaEmbedder> {
    let from_env = OllamaEmbedder::from_env().context("Failed to create embedding client")?;
    match from_env {
        Some(e) => Ok(e),
        None => OllamaEmbedder::from_config(&config.embedding)
            .context("Failed to create embedding client"),
    }
}

fn open_store(path: &Path) -> Result<SqliteChunkStore> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Store path is not valid UTF-8: {}", path.display()))?;
    SqliteChunkStore::new(path_str).context("Failed to open chunk store")
}

/// Text embedded for one transaction
pub fn chunk_text(tx: &ClassifiedTransaction) -> String {
    format!(
        "{} {} {} {}",
        tx.raw.date,
        tx.category.label(),
        format_inr(tx.raw.amount()),
        tx.narration()
    )
}

/// Chunk ids are scoped to their source so one statement can be indexed
/// under several sources
pub fn chunk_id(source_id: &str, tx: &ClassifiedTransaction) -> String {
    format!("{}:{}", source_id, tx.id)
}

/// Pair rows with their embeddings, dropping rows that failed to embed
pub fn build_chunks(
    txs: &[ClassifiedTransaction],
    texts: Vec<String>,
    vectors: Vec<Option<Vec<f32>>>,
    source_id: &str,
) -> Vec<Chunk> {
    txs.iter()
        .zip(texts)
        .zip(vectors)
        .filter_map(|((tx, text), vector)| {
            let vector = vector?;
            Some(
                Chunk::new(chunk_id(source_id, tx), source_id.to_string(), text, vector)
                    .with_metadata(json!({
                        "transaction_id": tx.id,
                        "date": tx.raw.date,
                        "category": tx.category,
                        "method": tx.method,
                        "amount": tx.raw.amount(),
                    })),
            )
        })
        .collect()
}

pub async fn cmd_index(
    config: &EngineConfig,
    file: &Path,
    store_path: &Path,
    source: Option<&str>,
) -> Result<()> {
    let txs = load_statement(file, &classifier_for(config, None))?;
    let source_id = source.map(str::to_string).unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "statement".to_string())
    });

    let embedder = embedder(config)?;
    println!(
        "📥 Embedding {} rows with {} at {}...",
        txs.len(),
        embedder.model(),
        embedder.host()
    );

    let texts: Vec<String> = txs.iter().map(chunk_text).collect();
    let vectors = embed_batch(
        Arc::new(embedder),
        &texts,
        config.embedding.max_concurrency,
        &CancelToken::new(),
    )
    .await
    .context("Embedding failed")?;

    let chunks = build_chunks(&txs, texts, vectors, &source_id);
    let failed = txs.len() - chunks.len();

    let store = open_store(store_path)?;
    let replaced = store.delete_by_source_id(&source_id)?;
    let stored = chunks.len();
    store.store_batch(chunks)?;

    println!("✅ Indexed {} rows as source '{}'", stored, source_id);
    if replaced > 0 {
        println!("   Replaced {} chunks from an earlier run", replaced);
    }
    if failed > 0 {
        println!("   ⚠️  {} rows could not be embedded", failed);
    }
    println!("   Store now holds {} chunks", store.count()?);
    Ok(())
}

pub async fn cmd_search(
    config: &EngineConfig,
    query: &str,
    store_path: &Path,
    top_k: usize,
    source: Option<&str>,
) -> Result<()> {
    let store = open_store(store_path)?;
    if store.count()? == 0 {
        println!("The chunk store is empty. Run 'ledgerlens index --file statement.csv' first.");
        return Ok(());
    }

    let embedder = embedder(config)?;
    let vector = embedder.embed(query).await.context("Failed to embed query")?;
    let hits = store.search(&vector, top_k, source)?;

    if hits.is_empty() {
        println!("No matches.");
        return Ok(());
    }
    println!("🔎 Top {} matches for \"{}\"", hits.len(), query);
    println!();
    for (chunk, score) in hits {
        println!(
            "   {:.3}  {:<16}  {}",
            score,
            truncate(&chunk.source_id, 16),
            truncate(&chunk.content, 80)
        );
    }
    Ok(())
}
