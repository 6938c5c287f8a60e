//! SQLite-backed vector index.
//!
//! Embeddings are stored as little-endian f32 BLOBs and scored in Rust.
//! For large libraries consider the sqlite-vec extension or a dedicated
//! vector database; one video's worth of chunks does not need either.

use super::{
    pair_entries, rank_entries, CollectionHandle, CollectionSummary, IndexEntry, IngestLocks,
    RetrievalResult, VectorIndex,
};
use crate::chunking::Chunk;
use crate::error::{Result, SvarError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    video_id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    video_id TEXT NOT NULL,
    video_title TEXT NOT NULL,
    channel TEXT NOT NULL,
    text TEXT NOT NULL,
    start_seconds REAL NOT NULL,
    chunk_index INTEGER NOT NULL,
    total_chunks INTEGER NOT NULL,
    upload_date TEXT,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_video_id ON entries(video_id);
"#;

/// SQLite-backed vector index.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    ingest_locks: IngestLocks,
}

impl SqliteIndex {
    /// Open (or create) an index at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            ingest_locks: IngestLocks::new(),
        })
    }

    /// Create an in-memory SQLite index (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            ingest_locks: IngestLocks::new(),
        })
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SvarError::Index(format!("Failed to acquire connection lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn collection_exists(conn: &Connection, video_id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM collections WHERE video_id = ?1)",
            params![video_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn load_entries(conn: &Connection, video_id: &str) -> Result<Vec<IndexEntry>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, video_id, video_title, channel, text, start_seconds,
                   chunk_index, total_chunks, upload_date, embedding, indexed_at
            FROM entries
            WHERE video_id = ?1
            ORDER BY chunk_index
            "#,
        )?;

        let entries = stmt.query_map(params![video_id], |row| {
            let id_str: String = row.get(0)?;
            let upload_date_str: Option<String> = row.get(8)?;
            let embedding_bytes: Vec<u8> = row.get(9)?;
            let indexed_at_str: String = row.get(10)?;

            Ok(IndexEntry {
                id: uuid::Uuid::parse_str(&id_str).unwrap_or_default(),
                chunk: Chunk {
                    video_id: row.get(1)?,
                    video_title: row.get(2)?,
                    channel: row.get(3)?,
                    text: row.get(4)?,
                    start_seconds: row.get(5)?,
                    chunk_index: row.get(6)?,
                    total_chunks: row.get(7)?,
                    upload_date: upload_date_str
                        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
                },
                embedding: Self::bytes_to_embedding(&embedding_bytes),
                indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;

        Ok(entries.filter_map(|entry| entry.ok()).collect())
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    #[instrument(skip(self))]
    async fn create_collection(&self, video_id: &str) -> Result<CollectionHandle> {
        let conn = self.lock_conn()?;
        let tx = conn.unchecked_transaction()?;

        // Re-create clears prior entries.
        tx.execute("DELETE FROM entries WHERE video_id = ?1", params![video_id])?;
        tx.execute(
            "INSERT OR REPLACE INTO collections (video_id, created_at) VALUES (?1, ?2)",
            params![video_id, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        debug!("Created collection for {}", video_id);
        Ok(CollectionHandle::new(video_id))
    }

    async fn collection(&self, video_id: &str) -> Result<CollectionHandle> {
        let conn = self.lock_conn()?;
        if Self::collection_exists(&conn, video_id)? {
            Ok(CollectionHandle::new(video_id))
        } else {
            Err(SvarError::CollectionNotFound(video_id.to_string()))
        }
    }

    #[instrument(skip(self, chunks, vectors), fields(video_id = %handle.video_id(), count = chunks.len()))]
    async fn insert(
        &self,
        handle: &CollectionHandle,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<usize> {
        let lock = self.ingest_locks.for_video(handle.video_id());
        let _writer = lock.lock().await;

        let entries = pair_entries(chunks, vectors)?;
        let count = entries.len();

        let conn = self.lock_conn()?;
        if !Self::collection_exists(&conn, handle.video_id())? {
            return Err(SvarError::CollectionNotFound(handle.video_id().to_string()));
        }

        // One transaction per batch: either the whole append commits or
        // none of it does.
        let tx = conn.unchecked_transaction()?;
        for entry in &entries {
            let embedding_bytes = Self::embedding_to_bytes(&entry.embedding);
            tx.execute(
                r#"
                INSERT INTO entries
                (id, video_id, video_title, channel, text, start_seconds,
                 chunk_index, total_chunks, upload_date, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    entry.id.to_string(),
                    entry.chunk.video_id,
                    entry.chunk.video_title,
                    entry.chunk.channel,
                    entry.chunk.text,
                    entry.chunk.start_seconds,
                    entry.chunk.chunk_index,
                    entry.chunk.total_chunks,
                    entry.chunk.upload_date.map(|d| d.to_string()),
                    embedding_bytes,
                    entry.indexed_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;

        info!("Inserted {} entries for {}", count, handle.video_id());
        Ok(count)
    }

    #[instrument(skip(self, vector), fields(video_id = %handle.video_id()))]
    async fn query(
        &self,
        handle: &CollectionHandle,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let conn = self.lock_conn()?;
        if !Self::collection_exists(&conn, handle.video_id())? {
            return Err(SvarError::CollectionNotFound(handle.video_id().to_string()));
        }

        let entries = Self::load_entries(&conn, handle.video_id())?;
        rank_entries(&entries, vector, k)
    }

    #[instrument(skip(self))]
    async fn drop_collection(&self, video_id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        let tx = conn.unchecked_transaction()?;

        let removed = tx.execute(
            "DELETE FROM collections WHERE video_id = ?1",
            params![video_id],
        )?;
        if removed == 0 {
            return Err(SvarError::CollectionNotFound(video_id.to_string()));
        }
        tx.execute("DELETE FROM entries WHERE video_id = ?1", params![video_id])?;
        tx.commit()?;

        debug!("Dropped collection for {}", video_id);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT c.video_id,
                   COALESCE(MIN(e.video_title), 'Unknown'),
                   COALESCE(MIN(e.channel), 'Unknown'),
                   COUNT(e.id)
            FROM collections c
            LEFT JOIN entries e ON e.video_id = c.video_id
            GROUP BY c.video_id
            ORDER BY c.video_id
            "#,
        )?;

        let summaries = stmt.query_map([], |row| {
            Ok(CollectionSummary {
                video_id: row.get(0)?,
                video_title: row.get(1)?,
                channel: row.get(2)?,
                chunk_count: row.get(3)?,
            })
        })?;

        Ok(summaries.filter_map(|s| s.ok()).collect())
    }

    async fn contains(&self, video_id: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        Self::collection_exists(&conn, video_id)
    }
}
