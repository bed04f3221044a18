use std::sync::RwLock;

use super::{rank, Chunk, ChunkStore};
use crate::error::{Error, Result};

/// Chunks held in memory, searched with a linear cosine scan
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    chunks: RwLock<Vec<Chunk>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::InvalidData("chunk store lock poisoned".into())
}

fn upsert(chunks: &mut Vec<Chunk>, chunk: Chunk) {
    match chunks.iter_mut().find(|c| c.id == chunk.id) {
        Some(existing) => *existing = chunk,
        None => chunks.push(chunk),
    }
}

impl ChunkStore for MemoryChunkStore {
    fn store(&self, chunk: Chunk) -> Result<()> {
        let mut chunks = self.chunks.write().map_err(poisoned)?;
        upsert(&mut chunks, chunk);
        Ok(())
    }

    fn store_batch(&self, batch: Vec<Chunk>) -> Result<()> {
        let mut chunks = self.chunks.write().map_err(poisoned)?;
        for chunk in batch {
            upsert(&mut chunks, chunk);
        }
        Ok(())
    }

    fn search(
        &self,
        query: &[f32],
        top_k: usize,
        source_id: Option<&str>,
    ) -> Result<Vec<(Chunk, f32)>> {
        let chunks = self.chunks.read().map_err(poisoned)?;
        let candidates = chunks
            .iter()
            .filter(|c| source_id.map_or(true, |s| c.source_id == s))
            .cloned();
        Ok(rank(candidates, query, top_k))
    }

    fn delete_by_source_id(&self, source_id: &str) -> Result<usize> {
        let mut chunks = self.chunks.write().map_err(poisoned)?;
        let before = chunks.len();
        chunks.retain(|c| c.source_id != source_id);
        Ok(before - chunks.len())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.chunks.read().map_err(poisoned)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryChunkStore {
        let store = MemoryChunkStore::new();
        store
            .store_batch(vec![
                Chunk::new("1", "jan", "groceries", vec![1.0, 0.0, 0.0]),
                Chunk::new("2", "jan", "rent", vec![0.0, 1.0, 0.0]),
                Chunk::new("3", "feb", "groceries again", vec![0.9, 0.1, 0.0]),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_search_ranks_by_similarity() {
        let store = seeded();
        let hits = store.search(&[1.0, 0.0, 0.0], 2, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.id, "1");
        assert_eq!(hits[1].0.id, "3");
        assert!(hits[0].1 >= hits[1].1);
    }

    #[test]
    fn test_search_filters_by_source() {
        let store = seeded();
        let hits = store.search(&[1.0, 0.0, 0.0], 5, Some("feb")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, "3");
    }

    #[test]
    fn test_store_replaces_same_id() {
        let store = seeded();
        store
            .store(Chunk::new("2", "jan", "rent (edited)", vec![0.0, 1.0, 0.0]))
            .unwrap();
        assert_eq!(store.count().unwrap(), 3);
        let hits = store.search(&[0.0, 1.0, 0.0], 1, None).unwrap();
        assert_eq!(hits[0].0.content, "rent (edited)");
    }

    #[test]
    fn test_delete_by_source_id() {
        let store = seeded();
        assert_eq!(store.delete_by_source_id("jan").unwrap(), 2);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.delete_by_source_id("jan").unwrap(), 0);
    }
}
