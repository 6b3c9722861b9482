//! Per-segment grouping of synthesized units.
//!
//! Every segment is cut into bounded chunks, the chunks are generated through
//! a bounded worker pool, and the results are put back into (segment, chunk)
//! order. Units of one segment form a [`Group`] numbered `1..=n` without
//! gaps. Segments that yield no unit produce no group, but the mapping from
//! raw segment index to group index keeps every other segment addressable.

use crate::context::RunContext;
use crate::episode::{Group, TextSegment};
use crate::error::{CastError, CastResult};
use crate::media::MediaTool;
use crate::report::RunIssue;
use crate::segmenter::chunk_text;
use crate::unit_generator::{UnitBatch, UnitGenerator};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Groups in segment order plus the lookup from raw segment index
#[derive(Debug, Clone, Default)]
pub struct GroupedAudio {
    /// Non-empty groups in segment order
    pub groups: Vec<Group>,
    /// Raw segment index to position in `groups`; absent for dropped segments
    pub segment_to_group: BTreeMap<usize, usize>,
    /// Unit-level issues in (segment, chunk) order
    pub issues: Vec<RunIssue>,
}

impl GroupedAudio {
    /// Total units across all groups
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.groups.iter().map(|g| g.chunks.len()).sum()
    }
}

/// Drives unit generation for a whole script
#[derive(Debug, Clone)]
pub struct SegmentGrouper {
    generator: Arc<UnitGenerator>,
    media: Arc<dyn MediaTool>,
    chunk_chars: usize,
    max_concurrent: usize,
}

impl SegmentGrouper {
    /// Create a grouper
    #[must_use]
    pub fn new(
        generator: Arc<UnitGenerator>,
        media: Arc<dyn MediaTool>,
        chunk_chars: usize,
        max_concurrent: usize,
    ) -> Self {
        Self {
            generator,
            media,
            chunk_chars: chunk_chars.max(1),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Synthesize every segment and group the units.
    ///
    /// # Errors
    ///
    /// Returns an error when a unit file cannot be moved, a worker panics, or
    /// the media tool cannot probe a unit. Synthesis failures become issues.
    pub async fn synthesize_segments(
        &self,
        segments: &[TextSegment],
        ctx: &RunContext,
    ) -> CastResult<GroupedAudio> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut workers = JoinSet::new();
        let mut dispatched = 0usize;

        for segment in segments.iter().filter(|s| !s.is_empty()) {
            for (chunk_no, chunk) in chunk_text(&segment.text, self.chunk_chars)
                .into_iter()
                .enumerate()
            {
                let generator = Arc::clone(&self.generator);
                let semaphore = Arc::clone(&semaphore);
                let ctx = ctx.clone();
                let segment_index = segment.index;
                let chunk_no = chunk_no + 1;

                workers.spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| CastError::assembly("Synthesis pool closed"))?;
                    let batch = generator
                        .generate(segment_index, chunk_no, &chunk, 1, &ctx)
                        .await?;
                    Ok::<_, CastError>((segment_index, chunk_no, batch))
                });
                dispatched += 1;
            }
        }

        info!(
            chunks = dispatched,
            workers = self.max_concurrent,
            "Dispatched chunk synthesis"
        );

        let mut finished: Vec<(usize, usize, UnitBatch)> = Vec::with_capacity(dispatched);
        while let Some(joined) = workers.join_next().await {
            let result = joined.map_err(|e| CastError::assembly(format!("Synthesis worker failed: {e}")))?;
            finished.push(result?);
        }
        finished.sort_by_key(|(segment, chunk, _)| (*segment, *chunk));

        self.group(finished, ctx).await
    }

    /// Renumber ordered batches per segment and probe unit durations
    async fn group(
        &self,
        finished: Vec<(usize, usize, UnitBatch)>,
        ctx: &RunContext,
    ) -> CastResult<GroupedAudio> {
        let extension = self.generator.extension().to_string();
        let mut by_segment: BTreeMap<usize, Vec<UnitBatch>> = BTreeMap::new();
        for (segment, _, batch) in finished {
            by_segment.entry(segment).or_default().push(batch);
        }

        let mut grouped = GroupedAudio::default();
        for (segment_index, batches) in by_segment {
            let mut group = Group {
                segment_index,
                chunks: Vec::new(),
            };

            for batch in batches {
                grouped.issues.extend(batch.issues);
                for mut unit in batch.units {
                    let sequence = group.chunks.len() + 1;
                    let path = ctx.unit_path(segment_index, sequence, &extension);
                    tokio::fs::rename(&unit.path, &path).await.map_err(|e| {
                        CastError::file(format!("Cannot number unit {}: {e}", path.display()))
                    })?;
                    unit.duration_secs = self.media.probe_duration(&path).await?;
                    unit.sequence = sequence;
                    unit.path = path;
                    group.chunks.push(unit);
                }
            }

            if group.is_empty() {
                debug!(segment = segment_index, "Segment produced no audio");
                continue;
            }

            debug!(
                segment = segment_index,
                group = grouped.groups.len(),
                units = group.chunks.len(),
                raw_duration = group.raw_duration(),
                "Grouped segment"
            );
            grouped
                .segment_to_group
                .insert(segment_index, grouped.groups.len());
            grouped.groups.push(group);
        }

        Ok(grouped)
    }
}
