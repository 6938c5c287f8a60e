//! Svar - Transcript Question Answering
//!
//! A retrieval-augmented engine for answering natural-language questions
//! about a video's spoken content, with timestamped provenance.
//!
//! The name "Svar" comes from the Norwegian/Scandinavian word for "answer."
//!
//! # Overview
//!
//! Svar lets you:
//! - Index a video transcript as overlapping, timestamp-tagged chunks
//! - Retrieve the passages most relevant to a question
//! - Generate answers grounded in those passages, with sources and a
//!   confidence label
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt templates
//! - `transcript` - Transcript data model and source boundary
//! - `chunking` - Transcript chunking
//! - `embedding` - Embedding generation
//! - `index` - Vector index with per-video collections
//! - `retrieval` - Candidate selection policy
//! - `context` - Budget-bounded context assembly
//! - `answer` - Answer generation and confidence
//! - `pipeline` - Ingestion and question-answering coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use svar::config::Settings;
//! use svar::pipeline::Pipeline;
//! use svar::transcript::{TranscriptSegment, VideoMetadata};
//!
//! #[tokio::main]
//! async fn main() -> svar::Result<()> {
//!     let pipeline = Pipeline::new(Settings::load()?)?;
//!
//!     let metadata = VideoMetadata::new("dQw4w9WgXcQ", "A Talk", "A Channel");
//!     let segments = vec![TranscriptSegment::new(0.0, 4.2, "Hello there.".into())];
//!     pipeline.ingest(&metadata, segments, false).await?;
//!
//!     let answer = pipeline.ask("dQw4w9WgXcQ", "What is said first?").await?;
//!     println!("{}", answer.format_for_display());
//!
//!     Ok(())
//! }
//! ```

pub mod answer;
pub mod chunking;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod index;
pub mod openai;
pub mod pipeline;
pub mod retrieval;
pub mod transcript;

pub use error::{ErrorKind, Result, SvarError};
