//! Configuration module for Svar.
//!
//! Handles loading and managing pipeline settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, QaPrompts};
pub use settings::{
    ChunkingSettings, ContextSettings, EmbeddingSettings, GenerationSettings, IndexSettings,
    RetrievalSettings, Settings,
};
