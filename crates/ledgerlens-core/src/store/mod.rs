//! Chunk storage for the retrieval pipeline
//!
//! A chunk is a piece of text with its embedding, grouped by `source_id`
//! (typically one statement or document). Two backends implement
//! [`ChunkStore`]:
//!
//! - [`MemoryChunkStore`]: a cosine-similarity scan over a `Vec`
//! - [`SqliteChunkStore`]: SQLite through an r2d2 pool, embeddings stored as
//!   little-endian `f32` blobs and ranked in Rust

mod memory;
mod sqlite;

pub use memory::MemoryChunkStore;
pub use sqlite::{ChunkPool, SqliteChunkStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            content: content.into(),
            embedding,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Chunk persistence with similarity search.
///
/// `store` replaces any chunk with the same id.
pub trait ChunkStore: Send + Sync {
    fn store(&self, chunk: Chunk) -> Result<()>;

    fn store_batch(&self, chunks: Vec<Chunk>) -> Result<()>;

    /// The `top_k` chunks most similar to `query`, best first, with their
    /// cosine similarity. `source_id` restricts the search to one source.
    fn search(
        &self,
        query: &[f32],
        top_k: usize,
        source_id: Option<&str>,
    ) -> Result<Vec<(Chunk, f32)>>;

    /// Returns the number of chunks removed
    fn delete_by_source_id(&self, source_id: &str) -> Result<usize>;

    fn count(&self) -> Result<usize>;
}

/// Cosine similarity. Zero when the lengths differ or either vector is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Score candidates against `query` and keep the best `top_k`
pub(crate) fn rank(
    candidates: impl IntoIterator<Item = Chunk>,
    query: &[f32],
    top_k: usize,
) -> Vec<(Chunk, f32)> {
    let mut scored: Vec<(Chunk, f32)> = candidates
        .into_iter()
        .map(|chunk| {
            let score = cosine_similarity(query, &chunk.embedding);
            (chunk, score)
        })
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    scored.truncate(top_k);
    scored
}
