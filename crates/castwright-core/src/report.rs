//! Run-level reporting of unit failures and policy exceptions.
//!
//! Unit-level problems never abort a run. They are collected here and
//! surfaced with the finished episode and in `status.json`.

use serde::{Deserialize, Serialize};

/// Severity of a run issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Output was produced but violates a soft limit
    Warning,
    /// Some narration is missing from the episode
    Error,
}

/// Why an oversized unit was kept instead of bisected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizeReason {
    /// Text is shorter than the split minimum
    BelowSplitMinimum,
    /// Bisection depth limit reached
    DepthLimit,
    /// No split point leaves text on both sides
    Unsplittable,
}

impl OversizeReason {
    fn describe(self, chars: usize) -> String {
        match self {
            Self::BelowSplitMinimum => format!("{chars} chars is below the split minimum"),
            Self::DepthLimit => format!("{chars} chars reached the bisection depth limit"),
            Self::Unsplittable => format!("{chars} chars cannot be split"),
        }
    }
}

/// A unit-level problem recorded during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunIssue {
    /// No voice or engine produced audio; the text was skipped
    AllEnginesExhausted {
        /// Raw segment index
        segment_index: usize,
        /// Chunk label within the segment (chunk number and bisection path)
        label: String,
        /// Characters of text that are missing from the episode
        chars: usize,
        /// Last synthesis error
        message: String,
    },
    /// A unit stayed over the byte ceiling and could not be split again
    OversizeUnresolved {
        /// Raw segment index
        segment_index: usize,
        /// Chunk label within the segment
        label: String,
        /// Characters of source text
        chars: usize,
        /// Encoded size of the accepted unit
        bytes: u64,
        /// Ceiling it exceeds
        ceiling: u64,
        /// Why splitting stopped
        reason: OversizeReason,
    },
}

impl RunIssue {
    /// Severity of the issue
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::AllEnginesExhausted { .. } => Severity::Error,
            Self::OversizeUnresolved { .. } => Severity::Warning,
        }
    }

    /// Raw segment the issue belongs to
    #[must_use]
    pub const fn segment_index(&self) -> usize {
        match self {
            Self::AllEnginesExhausted { segment_index, .. }
            | Self::OversizeUnresolved { segment_index, .. } => *segment_index,
        }
    }

    /// One-line description for summaries
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::AllEnginesExhausted { segment_index, label, chars, message } => format!(
                "segment {segment_index} chunk {label}: skipped {chars} chars, synthesis failed ({message})"
            ),
            Self::OversizeUnresolved { segment_index, label, chars, bytes, ceiling, reason } => format!(
                "segment {segment_index} chunk {label}: {bytes} bytes exceeds {ceiling} but {}",
                reason.describe(*chars)
            ),
        }
    }
}

/// Statistics and issues of a finished run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Segments in the script, including empty ones
    pub segments_total: usize,
    /// Segments that produced at least one unit
    pub groups_produced: usize,
    /// Units in the episode
    pub units_produced: usize,
    /// Items with a reconstructed timestamp
    pub items_timestamped: usize,
    /// Items whose segment produced no audio
    pub items_unavailable: usize,
    /// Delivery files written
    pub parts_written: usize,
    /// Raw duration of the full stream
    pub raw_duration_secs: f64,
    /// Duration at the configured tempo
    pub playback_duration_secs: f64,
    /// Unit-level issues in the order they were found
    pub issues: Vec<RunIssue>,
}

impl RunReport {
    /// Issues of the given severity
    pub fn issues_with(&self, severity: Severity) -> impl Iterator<Item = &RunIssue> {
        self.issues.iter().filter(move |i| i.severity() == severity)
    }

    /// Whether any narration was dropped
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.issues_with(Severity::Error).next().is_some()
    }
}
