//! Context assembly: turning retrieval results into a bounded prompt block.
//!
//! Entries are presented in chronological order rather than relevance
//! order, so the generation model reads the video's narrative as it was
//! spoken. The budget is measured in bytes of rendered UTF-8 text, the same
//! unit the chunker sizes chunks in.

use crate::index::RetrievalResult;
use serde::{Deserialize, Serialize};

/// A pointer from an answer back to the passage that supported it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SourceRef {
    /// Start time of the source passage in seconds.
    pub start_seconds: f64,
    /// Relevance score the passage was retrieved with.
    pub relevance_score: f32,
}

/// A rendered context block plus the sources that went into it.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// The rendered text block, one timestamped entry per passage.
    pub text: String,
    /// Included sources, in the same chronological order as the text.
    pub sources: Vec<SourceRef>,
    /// Title of the video the passages came from.
    pub video_title: String,
    /// Channel of the video the passages came from.
    pub channel: String,
}

impl AssembledContext {
    /// A context with no sources at all.
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            sources: Vec::new(),
            video_title: String::new(),
            channel: String::new(),
        }
    }

    /// Whether any source made it into the context.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Formats retrieval results into a budget-bounded context block.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    budget: usize,
}

impl ContextAssembler {
    /// Create an assembler with the given text budget.
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    /// Assemble results into a context block.
    ///
    /// Results are reordered by ascending `start_seconds` and appended until
    /// the next entry would push the rendered text past the budget. The first
    /// entry is always included, even when it alone exceeds the budget, so a
    /// non-empty result list never produces an empty context.
    pub fn assemble(&self, results: &[RetrievalResult]) -> AssembledContext {
        let mut ordered: Vec<&RetrievalResult> = results.iter().collect();
        ordered.sort_by(|a, b| {
            a.chunk
                .start_seconds
                .total_cmp(&b.chunk.start_seconds)
                .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });

        let mut context = AssembledContext::empty();
        if let Some(first) = ordered.first() {
            context.video_title = first.chunk.video_title.clone();
            context.channel = first.chunk.channel.clone();
        }

        for (i, result) in ordered.iter().enumerate() {
            let rendered = format!("[{}] {}", result.chunk.format_timestamp(), result.chunk.text);
            let separator_len = if context.text.is_empty() { 0 } else { 2 };

            if i > 0 && context.text.len() + separator_len + rendered.len() > self.budget {
                break;
            }

            if !context.text.is_empty() {
                context.text.push_str("\n\n");
            }
            context.text.push_str(&rendered);
            context.sources.push(SourceRef {
                start_seconds: result.chunk.start_seconds,
                relevance_score: result.relevance_score,
            });
        }

        context
    }
}
