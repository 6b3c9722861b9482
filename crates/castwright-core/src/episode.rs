//! Data model shared by the engine stages.

use crate::report::RunReport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A content item produced upstream, tagged with the segment that narrates it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Item title
    pub title: String,
    /// Canonical link
    #[serde(default)]
    pub url: String,
    /// Publication or feed the item came from
    #[serde(default)]
    pub source: String,
    /// Raw index of the originating segment in the script
    pub segment_index: usize,
}

impl ContentItem {
    /// Create a new content item
    #[must_use]
    pub fn new<T: Into<String>>(title: T, segment_index: usize) -> Self {
        Self {
            title: title.into(),
            url: String::new(),
            source: String::new(),
            segment_index,
        }
    }

    /// Set the item URL
    #[must_use]
    pub fn with_url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = url.into();
        self
    }

    /// Set the item source
    #[must_use]
    pub fn with_source<S: Into<String>>(mut self, source: S) -> Self {
        self.source = source.into();
        self
    }
}

/// One narration segment of a script. Empty segments keep their index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    /// Position of the segment in the marker-split script
    pub index: usize,
    /// Cleaned narration text; empty when the segment had nothing to say
    pub text: String,
}

impl TextSegment {
    /// Whether the segment produces no audio
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// One synthesized, encoded audio unit
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Sequence number, contiguous within its group (1-based)
    pub sequence: usize,
    /// Location of the encoded unit
    pub path: PathBuf,
    /// Encoded size in bytes
    pub bytes: u64,
    /// Raw duration in seconds, filled in once probed
    pub duration_secs: f64,
    /// Characters of source text the unit was synthesized from
    pub source_chars: usize,
    /// Bisection depth that produced the unit (0 = not split)
    pub depth: usize,
    /// Whether the unit exceeds the byte ceiling (accepted policy exception)
    pub oversized: bool,
}

/// Units belonging to one segment, in playback order
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Raw index of the segment these units were synthesized from
    pub segment_index: usize,
    /// Units in order
    pub chunks: Vec<AudioChunk>,
}

impl Group {
    /// Raw (pre-tempo) duration of the group
    #[must_use]
    pub fn raw_duration(&self) -> f64 {
        self.chunks.iter().map(|c| c.duration_secs).sum()
    }

    /// Total encoded size of the group
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.chunks.iter().map(|c| c.bytes).sum()
    }

    /// Whether the group has no units
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Playback offset of one content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampEntry {
    /// Item title
    pub title: String,
    /// Item link
    pub url: String,
    /// Item source
    pub source: String,
    /// Raw segment index the item belongs to
    pub segment_index: usize,
    /// Offset in seconds, or `None` when the segment produced no audio
    pub timestamp: Option<f64>,
}

impl TimestampEntry {
    /// Human-readable offset for show notes: `MM:SS`, `H:MM:SS`, or `--:--`
    #[must_use]
    pub fn label(&self) -> String {
        let Some(secs) = self.timestamp else {
            return "--:--".to_string();
        };
        let total = secs.max(0.0).round() as u64;
        let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
        if hours > 0 {
            format!("{hours}:{minutes:02}:{seconds:02}")
        } else {
            format!("{minutes:02}:{seconds:02}")
        }
    }
}

/// Serialized timestamp map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampMap {
    /// Tempo-adjusted start offset of every produced group
    pub group_starts: Vec<f64>,
    /// One record per content item
    pub items: Vec<TimestampEntry>,
}

/// Finished episode
#[derive(Debug, Clone)]
pub struct Episode {
    /// Full concatenated stream
    pub stream_path: PathBuf,
    /// Delivery files: the stream itself, or its size-capped parts
    pub parts: Vec<PathBuf>,
    /// Raw duration of the full stream in seconds
    pub raw_duration_secs: f64,
    /// Tempo-adjusted start offset of each group
    pub group_starts: Vec<f64>,
    /// Reconstructed timestamps, one per content item
    pub timestamps: Vec<TimestampEntry>,
    /// Unit-level issues and run statistics
    pub report: RunReport,
}

impl Episode {
    /// Timestamp map as written to `timestamps.json`
    #[must_use]
    pub fn timestamp_map(&self) -> TimestampMap {
        TimestampMap {
            group_starts: self.group_starts.clone(),
            items: self.timestamps.clone(),
        }
    }
}
