//! Size-bounded unit generation.
//!
//! A [`UnitGenerator`] synthesizes one chunk of text and guarantees that every
//! unit it keeps fits under the byte ceiling. An oversized unit is discarded
//! and its text bisected; the halves go back on an explicit work stack. Text
//! that cannot be bisected further (shorter than the split minimum, at the
//! depth limit, or without a usable split point) is accepted even when
//! oversized and reported as a [`RunIssue::OversizeUnresolved`] with the
//! matching [`OversizeReason`].

use crate::context::RunContext;
use crate::episode::AudioChunk;
use crate::error::{CastError, CastResult};
use crate::report::{OversizeReason, RunIssue};
use crate::segmenter::split_in_two;
use crate::synthesis::SynthesisAdapter;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default bisection depth after which a unit is accepted regardless of size
pub const MAX_SPLIT_DEPTH: usize = 32;

/// Text waiting to be synthesized
#[derive(Debug)]
struct Pending {
    text: String,
    depth: usize,
    label: String,
}

impl Pending {
    fn child(&self, text: String, side: char) -> Self {
        let sep = if self.depth == 0 { "_" } else { "" };
        Self {
            text,
            depth: self.depth + 1,
            label: format!("{}{sep}{side}", self.label),
        }
    }
}

/// Units produced for one chunk
#[derive(Debug, Clone, Default)]
pub struct UnitBatch {
    /// Accepted units in text order; `duration_secs` is not yet probed
    pub units: Vec<AudioChunk>,
    /// First sequence number not used by this batch
    pub next_seq: usize,
    /// Skipped text and oversize exceptions
    pub issues: Vec<RunIssue>,
    /// Synthesis calls made, including discarded attempts
    pub attempts: usize,
}

/// Synthesizes chunks into units that respect a byte ceiling
#[derive(Debug, Clone)]
pub struct UnitGenerator {
    adapter: Arc<SynthesisAdapter>,
    max_unit_bytes: u64,
    min_split_chars: usize,
    max_depth: usize,
}

impl UnitGenerator {
    /// Create a generator
    #[must_use]
    pub fn new(adapter: Arc<SynthesisAdapter>, max_unit_bytes: u64, min_split_chars: usize) -> Self {
        Self {
            adapter,
            max_unit_bytes,
            min_split_chars: min_split_chars.max(2),
            max_depth: MAX_SPLIT_DEPTH,
        }
    }

    /// Limit how many times one chunk's text may be bisected
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Byte ceiling for a unit
    #[must_use]
    pub const fn max_unit_bytes(&self) -> u64 {
        self.max_unit_bytes
    }

    /// File extension of generated units
    #[must_use]
    pub fn extension(&self) -> &str {
        self.adapter.extension()
    }

    /// Generate units for chunk `chunk_no` of segment `segment_index`.
    ///
    /// Accepted units are numbered from `first_seq` in text order with no
    /// gaps; the returned `next_seq` continues the numbering. Files are named
    /// by chunk label so chunks of one segment can run concurrently.
    ///
    /// # Errors
    ///
    /// Synthesis failures are recorded as issues, not returned. An error is
    /// returned only when a unit file cannot be moved or removed.
    pub async fn generate(
        &self,
        segment_index: usize,
        chunk_no: usize,
        text: &str,
        first_seq: usize,
        ctx: &RunContext,
    ) -> CastResult<UnitBatch> {
        let extension = self.extension().to_string();
        let mut batch = UnitBatch {
            next_seq: first_seq,
            ..UnitBatch::default()
        };

        let mut stack = vec![Pending {
            text: text.trim().to_string(),
            depth: 0,
            label: format!("c{chunk_no:03}"),
        }];

        while let Some(pending) = stack.pop() {
            if pending.text.is_empty() {
                continue;
            }
            let chars = pending.text.chars().count();
            let scratch = ctx.scratch_unit_path(segment_index, &pending.label, &extension);

            batch.attempts += 1;
            let unit = match self.adapter.synthesize_to_file(&pending.text, &scratch).await {
                Ok(unit) => unit,
                Err(err @ CastError::AllEnginesExhausted { .. }) => {
                    warn!(
                        segment = segment_index,
                        label = %pending.label,
                        chars,
                        error = %err,
                        "Skipping text that no engine could synthesize"
                    );
                    batch.issues.push(RunIssue::AllEnginesExhausted {
                        segment_index,
                        label: pending.label,
                        chars,
                        message: err.to_string(),
                    });
                    continue;
                }
                Err(err) => return Err(err),
            };

            let oversized = unit.bytes > self.max_unit_bytes;
            if oversized {
                let reason = if chars < self.min_split_chars {
                    OversizeReason::BelowSplitMinimum
                } else if pending.depth >= self.max_depth {
                    OversizeReason::DepthLimit
                } else {
                    let (a, b) = split_in_two(&pending.text);
                    if !a.is_empty() && !b.is_empty() {
                        debug!(
                            segment = segment_index,
                            label = %pending.label,
                            bytes = unit.bytes,
                            ceiling = self.max_unit_bytes,
                            left = a.chars().count(),
                            right = b.chars().count(),
                            "Unit over ceiling, bisecting"
                        );
                        tokio::fs::remove_file(&scratch).await.map_err(|e| {
                            CastError::file(format!("Cannot discard {}: {e}", scratch.display()))
                        })?;
                        let right = pending.child(b, 'b');
                        let left = pending.child(a, 'a');
                        stack.push(right);
                        stack.push(left);
                        continue;
                    }
                    OversizeReason::Unsplittable
                };

                warn!(
                    segment = segment_index,
                    label = %pending.label,
                    chars,
                    depth = pending.depth,
                    bytes = unit.bytes,
                    ceiling = self.max_unit_bytes,
                    ?reason,
                    "Accepting oversized unit"
                );
                batch.issues.push(RunIssue::OversizeUnresolved {
                    segment_index,
                    label: pending.label.clone(),
                    chars,
                    bytes: unit.bytes,
                    ceiling: self.max_unit_bytes,
                    reason,
                });
            }

            let sequence = batch.next_seq;
            batch.next_seq += 1;
            let path = ctx.chunk_unit_path(segment_index, &pending.label, &extension);
            tokio::fs::rename(&scratch, &path).await.map_err(|e| {
                CastError::file(format!("Cannot move unit to {}: {e}", path.display()))
            })?;

            debug!(
                segment = segment_index,
                label = %pending.label,
                sequence,
                bytes = unit.bytes,
                engine = %unit.engine,
                voice = %unit.voice,
                "Accepted unit"
            );
            batch.units.push(AudioChunk {
                sequence,
                path,
                bytes: unit.bytes,
                duration_secs: 0.0,
                source_chars: chars,
                depth: pending.depth,
                oversized,
            });
        }

        Ok(batch)
    }
}
