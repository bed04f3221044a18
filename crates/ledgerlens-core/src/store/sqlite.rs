//! SQLite chunk store
//!
//! Embeddings are stored as little-endian `f32` blobs. SQLite has no vector
//! index here, so `search` loads the candidate rows and ranks them in Rust.

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::{rank, Chunk, ChunkStore};
use crate::error::{Error, Result};

pub type ChunkPool = Pool<SqliteConnectionManager>;
type ChunkConn = PooledConnection<SqliteConnectionManager>;

#[derive(Clone)]
pub struct SqliteChunkStore {
    pool: ChunkPool,
    /// Path to the database file, `:memory:` for in-memory stores
    db_path: String,
}

/// Columns as they come out of SQLite, before decoding
type RawRow = (String, String, String, Vec<u8>, Option<String>, String);

impl SqliteChunkStore {
    /// Open (or create) a chunk store at `path`
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(10).build(manager)?;
        let store = Self {
            pool,
            db_path: path.to_string(),
        };
        store.run_migrations()?;
        info!(path, "Chunk store ready");
        Ok(store)
    }

    /// Private in-memory store. Every pooled connection to `:memory:` is a
    /// separate database, so the pool holds exactly one.
    pub fn in_memory() -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())?;
        let store = Self {
            pool,
            db_path: ":memory:".to_string(),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    fn conn(&self) -> Result<ChunkConn> {
        Ok(self.pool.get()?)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT,
                created_at DATETIME NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id);
            "#,
        )?;
        Ok(())
    }

    /// Fetch one chunk by id
    pub fn get(&self, id: &str) -> Result<Option<Chunk>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, source_id, content, embedding, metadata, created_at
                 FROM chunks WHERE id = ?",
                params![id],
                read_row,
            )
            .optional()?;
        row.map(decode_row).transpose()
    }
}

fn insert(conn: &rusqlite::Connection, chunk: &Chunk) -> Result<()> {
    let metadata = if chunk.metadata.is_null() {
        None
    } else {
        Some(serde_json::to_string(&chunk.metadata)?)
    };
    conn.execute(
        "INSERT OR REPLACE INTO chunks (id, source_id, content, embedding, metadata, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            chunk.id,
            chunk.source_id,
            chunk.content,
            encode_embedding(&chunk.embedding),
            metadata,
            chunk.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_row((id, source_id, content, blob, metadata, created_at): RawRow) -> Result<Chunk> {
    let embedding = decode_embedding(&blob)?;
    let metadata = match metadata {
        Some(text) => serde_json::from_str(&text)?,
        None => serde_json::Value::Null,
    };
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidData(format!("chunk {} created_at: {}", id, e)))?;
    Ok(Chunk {
        id,
        source_id,
        content,
        embedding,
        metadata,
        created_at,
    })
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::InvalidData(format!(
            "embedding blob of {} bytes is not a whole number of f32s",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

impl ChunkStore for SqliteChunkStore {
    fn store(&self, chunk: Chunk) -> Result<()> {
        let conn = self.conn()?;
        insert(&conn, &chunk)
    }

    fn store_batch(&self, chunks: Vec<Chunk>) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for chunk in &chunks {
            insert(&tx, chunk)?;
        }
        tx.commit()?;
        debug!(count = chunks.len(), "Stored chunk batch");
        Ok(())
    }

    fn search(
        &self,
        query: &[f32],
        top_k: usize,
        source_id: Option<&str>,
    ) -> Result<Vec<(Chunk, f32)>> {
        let conn = self.conn()?;
        let rows: Vec<RawRow> = match source_id {
            Some(source) => {
                let mut stmt = conn.prepare(
                    "SELECT id, source_id, content, embedding, metadata, created_at
                     FROM chunks WHERE source_id = ?",
                )?;
                let rows = stmt.query_map(params![source], read_row)?;
                rows.collect::<rusqlite::Result<_>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, source_id, content, embedding, metadata, created_at FROM chunks",
                )?;
                let rows = stmt.query_map([], read_row)?;
                rows.collect::<rusqlite::Result<_>>()?
            }
        };
        let candidates = rows
            .into_iter()
            .map(decode_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(rank(candidates, query, top_k))
    }

    fn delete_by_source_id(&self, source_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM chunks WHERE source_id = ?", params![source_id])?;
        debug!(source_id, removed, "Deleted chunks");
        Ok(removed)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunks() -> Vec<Chunk> {
        vec![
            Chunk::new("c1", "stmt-jan", "Swiggy orders", vec![0.9, 0.1, 0.0])
                .with_metadata(json!({"page": 1})),
            Chunk::new("c2", "stmt-jan", "Rent to landlord", vec![0.0, 1.0, 0.0]),
            Chunk::new("c3", "stmt-feb", "Zomato orders", vec![1.0, 0.0, 0.1]),
        ]
    }

    #[test]
    fn test_embedding_blob_round_trip() {
        let v = vec![0.25f32, -1.5, 3.0e-7];
        assert_eq!(decode_embedding(&encode_embedding(&v)).unwrap(), v);
        assert!(decode_embedding(&[0, 1, 2]).is_err());
    }

    #[test]
    fn test_store_and_search_in_memory() {
        let store = SqliteChunkStore::in_memory().unwrap();
        store.store_batch(chunks()).unwrap();
        assert_eq!(store.count().unwrap(), 3);

        let hits = store.search(&[1.0, 0.0, 0.0], 2, None).unwrap();
        let ids: Vec<_> = hits.iter().map(|(c, _)| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c3", "c1"]);

        let jan = store.search(&[1.0, 0.0, 0.0], 10, Some("stmt-jan")).unwrap();
        assert_eq!(jan.len(), 2);
        assert_eq!(jan[0].0.metadata, json!({"page": 1}));
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.db");
        let path = path.to_str().unwrap();
        {
            let store = SqliteChunkStore::new(path).unwrap();
            store.store_batch(chunks()).unwrap();
        }
        let reopened = SqliteChunkStore::new(path).unwrap();
        assert_eq!(reopened.count().unwrap(), 3);
        let chunk = reopened.get("c2").unwrap().unwrap();
        assert_eq!(chunk.content, "Rent to landlord");
        assert_eq!(chunk.embedding, vec![0.0, 1.0, 0.0]);
        assert!(reopened.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_store_replaces_and_delete_by_source() {
        let store = SqliteChunkStore::in_memory().unwrap();
        store.store_batch(chunks()).unwrap();
        store
            .store(Chunk::new("c1", "stmt-jan", "Swiggy orders (v2)", vec![0.9, 0.1, 0.0]))
            .unwrap();
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(store.get("c1").unwrap().unwrap().content, "Swiggy orders (v2)");

        assert_eq!(store.delete_by_source_id("stmt-jan").unwrap(), 2);
        assert_eq!(store.count().unwrap(), 1);
    }
}
