//! Transcript chunking: splitting a transcript into overlapping,
//! timestamp-tagged segments for indexing.
//!
//! Sizes (`chunk_size`, `overlap`) are measured in bytes of UTF-8 text;
//! splits only ever happen at character boundaries, so multi-byte text is
//! never cut mid-character.

use crate::error::{Result, SvarError};
use crate::transcript::{Transcript, VideoMetadata};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Split separators in preference order, coarsest first.
const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

/// A bounded, timestamped span of transcript text. The unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Text content of this chunk.
    pub text: String,
    /// Video ID this chunk belongs to.
    pub video_id: String,
    /// Video title.
    pub video_title: String,
    /// Channel name.
    pub channel: String,
    /// Start time of the segment containing this chunk's first character.
    pub start_seconds: f64,
    /// Position of this chunk within the video, 0-based and contiguous.
    pub chunk_index: u32,
    /// Total number of chunks produced for the video.
    pub total_chunks: u32,
    /// Upload date of the source video, if known.
    pub upload_date: Option<NaiveDate>,
}

impl Chunk {
    /// Format the chunk's start time for display.
    pub fn format_timestamp(&self) -> String {
        let total_seconds = self.start_seconds as u32;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, secs)
        } else {
            format!("{:02}:{:02}", minutes, secs)
        }
    }
}

/// Separator-based overlapping chunker.
///
/// Concatenates segment text, then splits on the coarsest separator that
/// keeps pieces within `chunk_size`. Consecutive pieces overlap by walking
/// back `overlap` bytes from each split point, so boundary text appears in
/// both neighbors.
#[derive(Debug, Clone)]
pub struct TranscriptChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TranscriptChunker {
    /// Create a chunker. `overlap` must be strictly smaller than `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(SvarError::Config("chunk_size must be positive".to_string()));
        }
        if overlap >= chunk_size {
            return Err(SvarError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    /// Split a transcript into overlapping chunks tagged with metadata.
    ///
    /// Chunks come back in transcript order with `chunk_index` contiguous
    /// from 0 and `start_seconds` non-decreasing. A transcript shorter than
    /// `chunk_size` yields exactly one chunk.
    pub fn chunk(&self, transcript: &Transcript, metadata: &VideoMetadata) -> Result<Vec<Chunk>> {
        // Concatenate segment text, keeping a byte-offset -> start time map
        // so each chunk can be traced back to the segment that opens it.
        let mut full = String::new();
        let mut offsets: Vec<(usize, f64)> = Vec::new();

        for segment in &transcript.segments {
            let text = segment.text.trim();
            if text.is_empty() {
                continue;
            }
            if !full.is_empty() {
                full.push(' ');
            }
            offsets.push((full.len(), segment.start_seconds));
            full.push_str(text);
        }

        if full.is_empty() {
            return Err(SvarError::EmptyTranscript(transcript.video_id.clone()));
        }

        let pieces = self.split(&full);

        let total = pieces.len() as u32;
        let chunks = pieces
            .into_iter()
            .enumerate()
            .map(|(i, (offset, text))| Chunk {
                text,
                video_id: metadata.video_id.clone(),
                video_title: metadata.title.clone(),
                channel: metadata.channel.clone(),
                start_seconds: start_time_at(&offsets, offset),
                chunk_index: i as u32,
                total_chunks: total,
                upload_date: metadata.upload_date,
            })
            .collect();

        Ok(chunks)
    }

    /// Split concatenated text into (byte offset, text) pieces.
    fn split(&self, full: &str) -> Vec<(usize, String)> {
        let mut pieces = Vec::new();
        let len = full.len();
        let mut start = 0usize;
        let mut prev_end = 0usize;

        while start < len {
            let mut end = len.min(start + self.chunk_size);
            while end < len && !full.is_char_boundary(end) {
                end -= 1;
            }
            if end <= start {
                // A chunk_size narrower than one character still advances.
                end = (start + 1..=len)
                    .find(|&i| full.is_char_boundary(i))
                    .unwrap_or(len);
            }

            if end < len {
                // Prefer the coarsest separator present in the window;
                // fall back to a hard split when none fits. A split must
                // advance past the previous one, or the overlap walk-back
                // would keep rediscovering the same boundary.
                for sep in SEPARATORS {
                    if let Some(pos) = full[start..end].rfind(sep) {
                        let candidate = start + pos + sep.len();
                        if pos > 0 && candidate > prev_end {
                            end = candidate;
                            break;
                        }
                    }
                }
            }
            prev_end = end;

            let window = &full[start..end];
            let piece = window.trim();
            if !piece.is_empty() {
                let lead = window.len() - window.trim_start().len();
                pieces.push((start + lead, piece.to_string()));
            }

            if end >= len {
                break;
            }

            // Walk back from the split point to build the overlap.
            let mut next = end.saturating_sub(self.overlap);
            while next > start && !full.is_char_boundary(next) {
                next -= 1;
            }
            if next <= start {
                next = end;
            }
            start = next;
        }

        pieces
    }
}

/// Start time of the segment containing the given byte offset.
fn start_time_at(offsets: &[(usize, f64)], offset: usize) -> f64 {
    let idx = offsets.partition_point(|(o, _)| *o <= offset);
    offsets[idx.saturating_sub(1)].1
}
