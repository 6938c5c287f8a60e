//! Vector index abstraction.
//!
//! Entries are grouped into per-video collections, the unit of isolation:
//! a query scoped to one video never sees another video's entries. Vectors
//! are L2-normalized once at insert time and again for each query, so the
//! similarity score is a plain dot product on both paths.

mod memory;
mod sqlite;

pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

use crate::chunking::Chunk;
use crate::error::{Result, SvarError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Handle to one video's collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    video_id: String,
}

impl CollectionHandle {
    pub(crate) fn new(video_id: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
        }
    }

    /// The video this handle is scoped to.
    pub fn video_id(&self) -> &str {
        &self.video_id
    }
}

/// An entry owned by the index: a chunk paired with its normalized vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Unique entry ID.
    pub id: Uuid,
    /// The indexed chunk.
    pub chunk: Chunk,
    /// L2-normalized embedding vector.
    pub embedding: Vec<f32>,
    /// When this entry was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl IndexEntry {
    /// Create an entry, normalizing the vector.
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chunk,
            embedding: l2_normalized(&embedding),
            indexed_at: Utc::now(),
        }
    }
}

/// A retrieval candidate: a chunk with its relevance score and rank.
///
/// Produced per query and never persisted.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Cosine similarity clamped to [0, 1].
    pub relevance_score: f32,
    /// 0-based position in the result list.
    pub rank: usize,
}

/// Summary of one indexed collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSummary {
    /// Video ID.
    pub video_id: String,
    /// Video title ("Unknown" until entries are inserted).
    pub video_title: String,
    /// Channel name ("Unknown" until entries are inserted).
    pub channel: String,
    /// Number of entries in the collection.
    pub chunk_count: u32,
}

/// Trait for vector index implementations.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection for a video and return its handle.
    ///
    /// Re-creating an existing collection clears its prior entries.
    async fn create_collection(&self, video_id: &str) -> Result<CollectionHandle>;

    /// Handle to an existing collection.
    ///
    /// Fails with `CollectionNotFound` for a dropped or never-created video.
    async fn collection(&self, video_id: &str) -> Result<CollectionHandle>;

    /// Append a batch of chunks with their vectors as one atomic write.
    ///
    /// `chunks` and `vectors` must have equal length. Writers to the same
    /// collection are serialized behind an advisory lock keyed by video id,
    /// so `chunk_index` ordering is never interleaved.
    async fn insert(
        &self,
        handle: &CollectionHandle,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<usize>;

    /// Up to `k` nearest entries by cosine similarity, descending by score,
    /// ties broken by ascending `chunk_index`. `k == 0` is an invalid query.
    async fn query(
        &self,
        handle: &CollectionHandle,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalResult>>;

    /// Remove a collection and all its entries.
    async fn drop_collection(&self, video_id: &str) -> Result<()>;

    /// Summaries of all collections.
    async fn list_collections(&self) -> Result<Vec<CollectionSummary>>;

    /// Whether a collection exists for this video.
    async fn contains(&self, video_id: &str) -> Result<bool>;
}

/// Return a unit-length copy of `v`. A zero vector comes back unchanged.
pub fn l2_normalized(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Pair chunks with vectors into index entries, validating shapes.
pub(crate) fn pair_entries(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Vec<IndexEntry>> {
    if chunks.len() != vectors.len() {
        return Err(SvarError::DimensionMismatch(format!(
            "{} chunks paired with {} vectors",
            chunks.len(),
            vectors.len()
        )));
    }
    if let Some(first) = vectors.first() {
        let dim = first.len();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(SvarError::DimensionMismatch(format!(
                "vectors of length {} and {} in one batch",
                dim,
                bad.len()
            )));
        }
    }
    Ok(chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| IndexEntry::new(chunk, vector))
        .collect())
}

/// Score and order a collection's entries against a query vector.
///
/// Entry vectors are stored normalized; the query is normalized here, so the
/// score is a dot product, clamped to [0, 1]. Ordering is descending by
/// score with ties broken by ascending `chunk_index`, which keeps results
/// reproducible across runs.
pub(crate) fn rank_entries(
    entries: &[IndexEntry],
    query: &[f32],
    k: usize,
) -> Result<Vec<RetrievalResult>> {
    if k == 0 {
        return Err(SvarError::InvalidQuery("k must be positive".to_string()));
    }
    if let Some(entry) = entries.first() {
        if entry.embedding.len() != query.len() {
            return Err(SvarError::DimensionMismatch(format!(
                "query vector has {} dimensions, index has {}",
                query.len(),
                entry.embedding.len()
            )));
        }
    }

    let query = l2_normalized(query);

    let mut scored: Vec<(f32, &IndexEntry)> = entries
        .iter()
        .map(|entry| {
            let dot: f32 = entry
                .embedding
                .iter()
                .zip(query.iter())
                .map(|(a, b)| a * b)
                .sum();
            (dot.clamp(0.0, 1.0), entry)
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| a.1.chunk.chunk_index.cmp(&b.1.chunk.chunk_index))
    });
    scored.truncate(k);

    Ok(scored
        .into_iter()
        .enumerate()
        .map(|(rank, (score, entry))| RetrievalResult {
            chunk: entry.chunk.clone(),
            relevance_score: score,
            rank,
        })
        .collect())
}

/// Advisory ingestion locks, one per collection.
///
/// Held for the duration of a single insert batch so concurrent writers to
/// the same video serialize; readers and writers to other videos are
/// unaffected.
pub(crate) struct IngestLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IngestLocks {
    pub(crate) fn new() -> Self {
        Self {
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Lock object for one video's ingestion.
    pub(crate) fn for_video(&self, video_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("ingestion lock table poisoned");
        locks
            .entry(video_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Build a chunk with fixed metadata for index tests.
    pub(crate) fn chunk(video_id: &str, index: u32, start: f64, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            video_id: video_id.to_string(),
            video_title: "Test Video".to_string(),
            channel: "Test Channel".to_string(),
            start_seconds: start,
            chunk_index: index,
            total_chunks: index + 1,
            upload_date: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::chunk;
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_l2_normalized() {
        let v = l2_normalized(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        // Zero vector stays as-is rather than dividing by zero.
        assert_eq!(l2_normalized(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_pair_entries_rejects_length_mismatch() {
        let chunks = vec![chunk("v1", 0, 0.0, "a")];
        let err = pair_entries(chunks, vec![]).unwrap_err();
        assert!(matches!(err, SvarError::DimensionMismatch(_)));

        let chunks = vec![chunk("v1", 0, 0.0, "a"), chunk("v1", 1, 1.0, "b")];
        let err = pair_entries(chunks, vec![vec![1.0, 0.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, SvarError::DimensionMismatch(_)));
    }

    #[test]
    fn test_rank_entries_orders_and_breaks_ties_by_index() {
        let entries = vec![
            IndexEntry::new(chunk("v1", 2, 20.0, "far"), vec![0.0, 1.0]),
            IndexEntry::new(chunk("v1", 1, 10.0, "tie b"), vec![1.0, 0.0]),
            IndexEntry::new(chunk("v1", 0, 0.0, "tie a"), vec![1.0, 0.0]),
        ];

        let results = rank_entries(&entries, &[1.0, 0.0], 3).unwrap();

        assert_eq!(results.len(), 3);
        // Identical scores resolve by ascending chunk_index.
        assert_eq!(results[0].chunk.chunk_index, 0);
        assert_eq!(results[1].chunk.chunk_index, 1);
        assert_eq!(results[2].chunk.chunk_index, 2);
        assert_eq!(results[0].rank, 0);
        assert!(results[0].relevance_score > results[2].relevance_score);
    }

    #[test]
    fn test_rank_entries_clamps_negative_cosine() {
        let entries = vec![IndexEntry::new(chunk("v1", 0, 0.0, "opposite"), vec![-1.0, 0.0])];
        let results = rank_entries(&entries, &[1.0, 0.0], 1).unwrap();
        assert_eq!(results[0].relevance_score, 0.0);
    }

    #[test]
    fn test_rank_entries_rejects_zero_k_and_bad_dims() {
        let entries = vec![IndexEntry::new(chunk("v1", 0, 0.0, "a"), vec![1.0, 0.0])];

        let err = rank_entries(&entries, &[1.0, 0.0], 0).unwrap_err();
        assert!(matches!(err, SvarError::InvalidQuery(_)));

        let err = rank_entries(&entries, &[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, SvarError::DimensionMismatch(_)));
    }
}
