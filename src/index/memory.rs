//! In-memory vector index.
//!
//! Useful for testing and small datasets.

use super::{
    pair_entries, rank_entries, CollectionHandle, CollectionSummary, IndexEntry, IngestLocks,
    RetrievalResult, VectorIndex,
};
use crate::chunking::Chunk;
use crate::error::{Result, SvarError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory vector index, one entry list per collection.
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, Vec<IndexEntry>>>,
    ingest_locks: IngestLocks,
}

impl MemoryIndex {
    /// Create a new in-memory index.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            ingest_locks: IngestLocks::new(),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn create_collection(&self, video_id: &str) -> Result<CollectionHandle> {
        let mut collections = self.collections.write().expect("collection map poisoned");
        // Re-create clears prior entries.
        collections.insert(video_id.to_string(), Vec::new());
        Ok(CollectionHandle::new(video_id))
    }

    async fn collection(&self, video_id: &str) -> Result<CollectionHandle> {
        let collections = self.collections.read().expect("collection map poisoned");
        if collections.contains_key(video_id) {
            Ok(CollectionHandle::new(video_id))
        } else {
            Err(SvarError::CollectionNotFound(video_id.to_string()))
        }
    }

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

        let mut collections = self.collections.write().expect("collection map poisoned");
        let collection = collections
            .get_mut(handle.video_id())
            .ok_or_else(|| SvarError::CollectionNotFound(handle.video_id().to_string()))?;
        // Single extend under the write lock: the batch lands atomically.
        collection.extend(entries);

        Ok(count)
    }

    async fn query(
        &self,
        handle: &CollectionHandle,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let collections = self.collections.read().expect("collection map poisoned");
        let collection = collections
            .get(handle.video_id())
            .ok_or_else(|| SvarError::CollectionNotFound(handle.video_id().to_string()))?;
        rank_entries(collection, vector, k)
    }

    async fn drop_collection(&self, video_id: &str) -> Result<()> {
        let mut collections = self.collections.write().expect("collection map poisoned");
        collections
            .remove(video_id)
            .ok_or_else(|| SvarError::CollectionNotFound(video_id.to_string()))?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let collections = self.collections.read().expect("collection map poisoned");

        let mut summaries: Vec<CollectionSummary> = collections
            .iter()
            .map(|(video_id, entries)| CollectionSummary {
                video_id: video_id.clone(),
                video_title: entries
                    .first()
                    .map(|e| e.chunk.video_title.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                channel: entries
                    .first()
                    .map(|e| e.chunk.channel.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                chunk_count: entries.len() as u32,
            })
            .collect();

        summaries.sort_by(|a, b| a.video_id.cmp(&b.video_id));
        Ok(summaries)
    }

    async fn contains(&self, video_id: &str) -> Result<bool> {
        let collections = self.collections.read().expect("collection map poisoned");
        Ok(collections.contains_key(video_id))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::chunk;
    use super::*;

    #[tokio::test]
    async fn test_insert_and_query() {
        let index = MemoryIndex::new();
        let handle = index.create_collection("v1").await.unwrap();

        let inserted = index
            .insert(
                &handle,
                vec![chunk("v1", 0, 0.0, "hello"), chunk("v1", 1, 30.0, "goodbye")],
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let results = index.query(&handle, &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "hello");
        assert!(results[0].relevance_score > results[1].relevance_score);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let index = MemoryIndex::new();
        let a = index.create_collection("video-a").await.unwrap();
        let b = index.create_collection("video-b").await.unwrap();

        index
            .insert(&a, vec![chunk("video-a", 0, 0.0, "alpha")], vec![vec![1.0, 0.0]])
            .await
            .unwrap();

        // Nothing from video-a leaks into video-b.
        let results = index.query(&b, &[1.0, 0.0], 10).await.unwrap();
        assert!(results.is_empty());

        index
            .insert(&b, vec![chunk("video-b", 0, 0.0, "beta")], vec![vec![1.0, 0.0]])
            .await
            .unwrap();

        let results = index.query(&a, &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.video_id, "video-a");
    }

    #[tokio::test]
    async fn test_recreate_clears_entries() {
        let index = MemoryIndex::new();
        let handle = index.create_collection("v1").await.unwrap();
        index
            .insert(&handle, vec![chunk("v1", 0, 0.0, "old")], vec![vec![1.0, 0.0]])
            .await
            .unwrap();

        let handle = index.create_collection("v1").await.unwrap();
        let results = index.query(&handle, &[1.0, 0.0], 10).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_query_after_drop_fails() {
        let index = MemoryIndex::new();
        let handle = index.create_collection("v1").await.unwrap();
        index.drop_collection("v1").await.unwrap();

        let err = index.query(&handle, &[1.0, 0.0], 5).await.unwrap_err();
        assert!(matches!(err, SvarError::CollectionNotFound(_)));

        let err = index.drop_collection("v1").await.unwrap_err();
        assert!(matches!(err, SvarError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_top_k_monotonicity() {
        let index = MemoryIndex::new();
        let handle = index.create_collection("v1").await.unwrap();

        index
            .insert(
                &handle,
                vec![
                    chunk("v1", 0, 0.0, "a"),
                    chunk("v1", 1, 10.0, "b"),
                    chunk("v1", 2, 20.0, "c"),
                ],
                vec![vec![1.0, 0.0], vec![0.8, 0.6], vec![0.0, 1.0]],
            )
            .await
            .unwrap();

        let top2 = index.query(&handle, &[1.0, 0.0], 2).await.unwrap();
        let top3 = index.query(&handle, &[1.0, 0.0], 3).await.unwrap();

        // retrieve(k) is a prefix of retrieve(k+1).
        for (small, large) in top2.iter().zip(top3.iter()) {
            assert_eq!(small.chunk.chunk_index, large.chunk.chunk_index);
        }
        assert_eq!(top3.len(), 3);
    }

    #[tokio::test]
    async fn test_list_collections() {
        let index = MemoryIndex::new();
        let handle = index.create_collection("v1").await.unwrap();
        index.create_collection("v2").await.unwrap();

        index
            .insert(
                &handle,
                vec![chunk("v1", 0, 0.0, "a"), chunk("v1", 1, 10.0, "b")],
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .await
            .unwrap();

        let summaries = index.list_collections().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].video_id, "v1");
        assert_eq!(summaries[0].chunk_count, 2);
        assert_eq!(summaries[0].video_title, "Test Video");
        assert_eq!(summaries[1].chunk_count, 0);
        assert_eq!(summaries[1].video_title, "Unknown");
    }

    #[tokio::test]
    async fn test_insert_length_mismatch() {
        let index = MemoryIndex::new();
        let handle = index.create_collection("v1").await.unwrap();

        let err = index
            .insert(&handle, vec![chunk("v1", 0, 0.0, "a")], vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, SvarError::DimensionMismatch(_)));
    }
}
