//! Pipeline wiring for Svar.
//!
//! Coordinates the two independent flows: ingestion (chunk, embed, insert)
//! and question answering (embed, retrieve, assemble, generate). All
//! services are injected, so tests run against deterministic fakes and
//! concurrent pipelines can share one embedder and one index.

use crate::answer::{Answer, AnswerGenerator, GenerationModel, OpenAIGenerator};
use crate::chunking::TranscriptChunker;
use crate::config::{Prompts, Settings};
use crate::context::ContextAssembler;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::index::{CollectionSummary, MemoryIndex, RetrievalResult, SqliteIndex, VectorIndex};
use crate::retrieval::Retriever;
use crate::transcript::{Transcript, TranscriptSegment, TranscriptSource, VideoMetadata};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Outcome of ingesting one video.
#[derive(Debug, Clone)]
pub struct IngestResult {
    /// Video ID.
    pub video_id: String,
    /// Video title.
    pub title: String,
    /// Number of chunks indexed.
    pub chunks_indexed: usize,
    /// Whether ingestion was skipped because the video was already indexed.
    pub skipped: bool,
}

/// The question-answering pipeline.
pub struct Pipeline {
    settings: Settings,
    chunker: TranscriptChunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    retriever: Retriever,
    assembler: ContextAssembler,
    answerer: AnswerGenerator,
}

impl Pipeline {
    /// Create a pipeline with OpenAI-backed services per the settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::new(
            OpenAIEmbedder::with_config(
                &settings.embedding.model,
                settings.embedding.dimensions as usize,
            )
            .with_timeout(Duration::from_secs(settings.embedding.timeout_seconds)),
        );

        let index: Arc<dyn VectorIndex> = match settings.index.provider.as_str() {
            "memory" => Arc::new(MemoryIndex::new()),
            _ => Arc::new(SqliteIndex::new(&settings.sqlite_path())?),
        };

        let generation: Arc<dyn GenerationModel> =
            Arc::new(OpenAIGenerator::new(&settings.generation));

        Self::with_components(settings, Prompts::default(), embedder, index, generation)
    }

    /// Create a pipeline with explicitly supplied services.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generation: Arc<dyn GenerationModel>,
    ) -> Result<Self> {
        let chunker =
            TranscriptChunker::new(settings.chunking.chunk_size, settings.chunking.chunk_overlap)?;
        let retriever = Retriever::new(index.clone(), embedder.clone(), &settings.retrieval);
        let assembler = ContextAssembler::new(settings.context.budget);
        let answerer = AnswerGenerator::new(
            generation,
            prompts,
            Duration::from_secs(settings.generation.timeout_seconds),
        );

        Ok(Self {
            settings,
            chunker,
            embedder,
            index,
            retriever,
            assembler,
            answerer,
        })
    }

    /// The vector index this pipeline writes to.
    pub fn index(&self) -> Arc<dyn VectorIndex> {
        self.index.clone()
    }

    /// The embedder shared by ingestion and querying.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// The settings this pipeline was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Ingest a transcript: chunk, embed, and index it.
    ///
    /// An already-indexed video is skipped unless `force` is set; forcing
    /// re-creates the collection, clearing prior entries.
    #[instrument(skip(self, metadata, segments), fields(video_id = %metadata.video_id))]
    pub async fn ingest(
        &self,
        metadata: &VideoMetadata,
        segments: Vec<TranscriptSegment>,
        force: bool,
    ) -> Result<IngestResult> {
        if !force && self.index.contains(&metadata.video_id).await? {
            info!("Video {} is already indexed, skipping", metadata.video_id);
            return Ok(IngestResult {
                video_id: metadata.video_id.clone(),
                title: metadata.title.clone(),
                chunks_indexed: 0,
                skipped: true,
            });
        }

        let transcript = Transcript::new(metadata.video_id.clone(), segments);

        info!("Chunking transcript for {}", metadata.video_id);
        let chunks = self.chunker.chunk(&transcript, metadata)?;

        info!("Embedding {} chunks", chunks.len());
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let handle = self.index.create_collection(&metadata.video_id).await?;
        let indexed = self.index.insert(&handle, chunks, vectors).await?;
        info!("Indexed {} chunks for {}", indexed, metadata.video_id);

        Ok(IngestResult {
            video_id: metadata.video_id.clone(),
            title: metadata.title.clone(),
            chunks_indexed: indexed,
            skipped: false,
        })
    }

    /// Fetch a transcript from a source, then ingest it.
    pub async fn ingest_from(
        &self,
        source: &dyn TranscriptSource,
        video_id: &str,
        force: bool,
    ) -> Result<IngestResult> {
        let (metadata, segments) = source.fetch(video_id).await?;
        self.ingest(&metadata, segments, force).await
    }

    /// Answer a question about an indexed video.
    ///
    /// Fails with `CollectionNotFound` for a video that was never ingested
    /// or has been dropped; an indexed video with no relevant passages is a
    /// successful low-confidence answer instead.
    #[instrument(skip(self, question), fields(question = %question))]
    pub async fn ask(&self, video_id: &str, question: &str) -> Result<Answer> {
        let handle = self.index.collection(video_id).await?;

        let results = self
            .retriever
            .retrieve(&handle, question, self.settings.retrieval.top_k)
            .await?;

        let context = self.assembler.assemble(&results);
        self.answerer.generate(question, &context).await
    }

    /// Retrieve relevant chunks without generating an answer.
    pub async fn retrieve(
        &self,
        video_id: &str,
        question: &str,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let handle = self.index.collection(video_id).await?;
        self.retriever.retrieve(&handle, question, k).await
    }

    /// List all indexed videos.
    pub async fn list_videos(&self) -> Result<Vec<CollectionSummary>> {
        self.index.list_collections().await
    }

    /// Remove a video's collection from the index.
    pub async fn drop_video(&self, video_id: &str) -> Result<()> {
        self.index.drop_collection(video_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::testing::FixedGenerator;
    use crate::answer::Confidence;
    use crate::embedding::testing::FixedEmbedder;
    use crate::error::SvarError;

    const QUESTION: &str = "What is the main topic?";

    /// Unit vector whose cosine against [1, 0] equals `target`.
    fn vector_scoring(target: f32) -> Vec<f32> {
        vec![target, (1.0 - target * target).sqrt()]
    }

    fn segments() -> Vec<TranscriptSegment> {
        vec![
            TranscriptSegment::new(0.0, 5.0, "Rust ownership explained.".to_string()),
            TranscriptSegment::new(5.0, 10.0, "Borrowing rules in depth.".to_string()),
            TranscriptSegment::new(10.0, 15.0, "Cats are unrelated.".to_string()),
        ]
    }

    fn embedder() -> Arc<FixedEmbedder> {
        Arc::new(
            FixedEmbedder::new(2)
                .with("Rust ownership explained.", vector_scoring(0.9))
                .with("Borrowing rules in depth.", vector_scoring(0.6))
                .with("Cats are unrelated.", vector_scoring(0.2))
                .with(QUESTION, vec![1.0, 0.0]),
        )
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        // Sized so each transcript sentence lands in its own chunk.
        settings.chunking.chunk_size = 30;
        settings.chunking.chunk_overlap = 0;
        settings.retrieval.top_k = 2;
        settings.retrieval.relevance_floor = 0.3;
        settings.index.provider = "memory".to_string();
        settings
    }

    fn pipeline(generation: Arc<FixedGenerator>) -> Pipeline {
        Pipeline::with_components(
            settings(),
            Prompts::default(),
            embedder(),
            Arc::new(MemoryIndex::new()),
            generation,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_ask() {
        let generation = Arc::new(FixedGenerator::new("Ownership and borrowing."));
        let pipeline = pipeline(generation.clone());

        let metadata = VideoMetadata::new("v1", "Rust Talk", "Rust Channel");
        let result = pipeline.ingest(&metadata, segments(), false).await.unwrap();
        assert_eq!(result.chunks_indexed, 3);
        assert!(!result.skipped);

        let answer = pipeline.ask("v1", QUESTION).await.unwrap();

        // The 0.2-scoring chunk fell below the floor; two sources remain,
        // re-ordered chronologically.
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].start_seconds, 0.0);
        assert_eq!(answer.sources[1].start_seconds, 5.0);
        assert!((answer.sources[0].relevance_score - 0.9).abs() < 1e-4);
        assert!((answer.sources[1].relevance_score - 0.6).abs() < 1e-4);
        assert_eq!(answer.confidence, Confidence::High);
        assert_eq!(answer.text, "Ownership and borrowing.");
        assert_eq!(generation.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_orders_by_score() {
        let pipeline = pipeline(Arc::new(FixedGenerator::new("unused")));

        let metadata = VideoMetadata::new("v1", "Rust Talk", "Rust Channel");
        pipeline.ingest(&metadata, segments(), false).await.unwrap();

        let results = pipeline.retrieve("v1", QUESTION, 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!((results[0].relevance_score - 0.9).abs() < 1e-4);
        assert!((results[1].relevance_score - 0.6).abs() < 1e-4);
        assert_eq!(results[0].chunk.text, "Rust ownership explained.");
    }

    #[tokio::test]
    async fn test_empty_collection_fails_closed() {
        let generation = Arc::new(FixedGenerator::new("should never run"));
        let pipeline = pipeline(generation.clone());

        // Freshly created collection with nothing in it.
        pipeline.index().create_collection("v2").await.unwrap();

        let answer = pipeline.ask("v2", QUESTION).await.unwrap();
        assert_eq!(answer.confidence, Confidence::Low);
        assert!(answer.sources.is_empty());
        assert_eq!(generation.call_count(), 0);
    }

    #[tokio::test]
    async fn test_ask_unknown_video_is_not_found() {
        let pipeline = pipeline(Arc::new(FixedGenerator::new("unused")));

        let err = pipeline.ask("never-ingested", QUESTION).await.unwrap_err();
        assert!(matches!(err, SvarError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_reingest_skips_unless_forced() {
        let pipeline = pipeline(Arc::new(FixedGenerator::new("unused")));
        let metadata = VideoMetadata::new("v1", "Rust Talk", "Rust Channel");

        pipeline.ingest(&metadata, segments(), false).await.unwrap();

        let second = pipeline.ingest(&metadata, segments(), false).await.unwrap();
        assert!(second.skipped);
        assert_eq!(second.chunks_indexed, 0);

        // Forcing re-creates the collection rather than doubling it up.
        let forced = pipeline.ingest(&metadata, segments(), true).await.unwrap();
        assert!(!forced.skipped);
        assert_eq!(forced.chunks_indexed, 3);

        let summaries = pipeline.list_videos().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].chunk_count, 3);
    }

    #[tokio::test]
    async fn test_ingest_from_source() {
        struct FixtureSource;

        #[async_trait::async_trait]
        impl TranscriptSource for FixtureSource {
            async fn fetch(
                &self,
                video_id: &str,
            ) -> crate::error::Result<(VideoMetadata, Vec<TranscriptSegment>)> {
                Ok((
                    VideoMetadata::new(video_id, "Rust Talk", "Rust Channel"),
                    segments(),
                ))
            }
        }

        let pipeline = pipeline(Arc::new(FixedGenerator::new("unused")));

        let result = pipeline
            .ingest_from(&FixtureSource, "v1", false)
            .await
            .unwrap();

        assert_eq!(result.video_id, "v1");
        assert_eq!(result.title, "Rust Talk");
        assert_eq!(result.chunks_indexed, 3);
    }

    #[tokio::test]
    async fn test_drop_video_removes_collection() {
        let pipeline = pipeline(Arc::new(FixedGenerator::new("unused")));
        let metadata = VideoMetadata::new("v1", "Rust Talk", "Rust Channel");
        pipeline.ingest(&metadata, segments(), false).await.unwrap();

        pipeline.drop_video("v1").await.unwrap();

        let err = pipeline.ask("v1", QUESTION).await.unwrap_err();
        assert!(matches!(err, SvarError::CollectionNotFound(_)));
    }
}
