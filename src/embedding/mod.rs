//! Embedding generation for indexing and retrieval.
//!
//! Documents and queries must be embedded with the same model so they are
//! comparable in one vector space. For a fixed model version the mapping is
//! deterministic: identical text yields an identical vector.

mod openai;

pub use openai::OpenAIEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding generation.
///
/// A model that cannot be reached surfaces as
/// [`SvarError::EmbeddingUnavailable`](crate::error::SvarError::EmbeddingUnavailable);
/// implementations never degrade to a zero vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, order-preserving.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}
