//! Retrieval: embedding a question and selecting relevant chunks.
//!
//! The index's raw top-K tends to return near-duplicate passages because
//! neighboring chunks overlap. The retriever oversamples the index, drops
//! candidates below the relevance floor, collapses near-identical neighbors,
//! and only then truncates to the requested count.

use crate::config::RetrievalSettings;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::index::{CollectionHandle, RetrievalResult, VectorIndex};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Ranks index entries against a question.
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    relevance_floor: f32,
    oversample_factor: usize,
    dedup_epsilon: f32,
}

impl Retriever {
    /// Create a retriever over an index and embedder.
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        settings: &RetrievalSettings,
    ) -> Self {
        Self {
            index,
            embedder,
            relevance_floor: settings.relevance_floor,
            oversample_factor: settings.oversample_factor.max(1),
            dedup_epsilon: settings.dedup_epsilon,
        }
    }

    /// Retrieve up to `k` relevant chunks for a question.
    #[instrument(skip(self, question, handle), fields(video_id = %handle.video_id()))]
    pub async fn retrieve(
        &self,
        handle: &CollectionHandle,
        question: &str,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let query_vector = self.embedder.embed(question).await?;

        let oversampled = k.max(k.saturating_mul(self.oversample_factor));
        let candidates = self.index.query(handle, &query_vector, oversampled).await?;
        debug!("Index returned {} candidates", candidates.len());

        let results = self.select(candidates, k);
        debug!("Selected {} results", results.len());
        Ok(results)
    }

    /// Apply the selection policy: floor, dedup, truncate.
    fn select(&self, candidates: Vec<RetrievalResult>, k: usize) -> Vec<RetrievalResult> {
        let mut kept: Vec<RetrievalResult> = Vec::new();

        // Candidates arrive in descending score order, so iterating in order
        // and keeping the first of each near-duplicate pair keeps the
        // higher-scoring one.
        for candidate in candidates {
            if candidate.relevance_score < self.relevance_floor {
                continue;
            }

            let duplicate_of_kept = kept.iter().any(|prior| {
                let adjacent = prior.chunk.chunk_index.abs_diff(candidate.chunk.chunk_index) == 1;
                let close = (prior.relevance_score - candidate.relevance_score).abs()
                    < self.dedup_epsilon;
                adjacent && close
            });
            if duplicate_of_kept {
                continue;
            }

            kept.push(candidate);
            if kept.len() == k {
                break;
            }
        }

        for (rank, result) in kept.iter_mut().enumerate() {
            result.rank = rank;
        }
        kept
    }
}
