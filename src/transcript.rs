//! Transcript data model and the upstream source boundary.
//!
//! Transcript acquisition itself (caption download, speech-to-text) lives
//! outside this crate; a [`TranscriptSource`] supplies segments plus video
//! metadata, and everything downstream works on those values only.

use crate::error::{Result, SvarError};
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A single timed span of spoken text, as delivered by the transcript source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Text of this segment.
    pub text: String,
    /// Start time in seconds.
    pub start_seconds: f64,
    /// End time in seconds.
    pub end_seconds: f64,
}

impl TranscriptSegment {
    pub fn new(start_seconds: f64, end_seconds: f64, text: String) -> Self {
        Self {
            text,
            start_seconds,
            end_seconds,
        }
    }
}

/// A complete transcript with segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Video ID this transcript belongs to.
    pub video_id: String,
    /// Individual transcript segments with timestamps.
    pub segments: Vec<TranscriptSegment>,
    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl Transcript {
    /// Create a new transcript from segments.
    pub fn new(video_id: String, segments: Vec<TranscriptSegment>) -> Self {
        let duration_seconds = segments.last().map(|s| s.end_seconds).unwrap_or(0.0);
        Self {
            video_id,
            segments,
            duration_seconds,
        }
    }
}

/// Metadata describing the video a transcript belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Video ID.
    pub video_id: String,
    /// Video title.
    pub title: String,
    /// Channel name.
    pub channel: String,
    /// Upload date, if the source knows it.
    pub upload_date: Option<NaiveDate>,
}

impl VideoMetadata {
    pub fn new(video_id: &str, title: &str, channel: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            title: title.to_string(),
            channel: channel.to_string(),
            upload_date: None,
        }
    }

    pub fn with_upload_date(mut self, upload_date: NaiveDate) -> Self {
        self.upload_date = Some(upload_date);
        self
    }
}

/// Trait for transcript providers.
///
/// A failed fetch (private video, missing captions) is an ingestion
/// precondition failure reported by the source; this crate never attempts
/// to fetch video data itself.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch metadata and transcript segments for a video.
    async fn fetch(&self, video_id: &str) -> Result<(VideoMetadata, Vec<TranscriptSegment>)>;
}

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            (?:
                # Full YouTube URLs
                (?:https?://)?
                (?:www\.)?
                (?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/v/)
                ([a-zA-Z0-9_-]{11})
            )
            |
            # Bare video ID (11 characters)
            ^([a-zA-Z0-9_-]{11})$
        ",
        )
        .expect("Invalid regex")
    })
}

/// Extract a video ID from a YouTube URL or bare ID.
pub fn extract_video_id(input: &str) -> Result<String> {
    let caps = video_id_regex()
        .captures(input.trim())
        .ok_or_else(|| SvarError::Config(format!("Could not parse video id from: {}", input)))?;

    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| SvarError::Config(format!("Could not parse video id from: {}", input)))
}
