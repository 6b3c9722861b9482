//! Episode assembly and distribution splitting.
//!
//! Groups are concatenated in order with the transition cue strictly between
//! them. When the finished stream is larger than the distribution ceiling it
//! is cut into contiguous parts, each re-encoded from a time window sized to
//! land under the target.

use crate::config::EngineConfig;
use crate::context::RunContext;
use crate::cue::RenderedCue;
use crate::episode::Group;
use crate::error::{CastError, CastResult};
use crate::media::MediaTool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Remaining stream shorter than this is not worth another part
const MIN_PART_SECS: f64 = 0.05;

/// Size-cap settings for delivery parts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitPolicy {
    /// Streams larger than this are split
    pub ceiling_bytes: u64,
    /// Size each part should stay under
    pub target_bytes: u64,
    /// Multiplier on the proportional duration estimate
    pub safety_factor: f64,
    /// Fraction removed from the window after an oversized attempt
    pub shrink_ratio: f64,
    /// Attempts per part before accepting the last result
    pub max_attempts: u32,
}

impl SplitPolicy {
    /// Split settings from configuration
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            ceiling_bytes: config.distribution_ceiling_bytes,
            target_bytes: config.distribution_target_bytes,
            safety_factor: config.split_safety_factor,
            shrink_ratio: config.split_shrink_ratio,
            max_attempts: config.split_max_attempts.max(1),
        }
    }
}

/// The concatenated episode stream
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledStream {
    /// Encoded stream
    pub path: PathBuf,
    /// Size on disk
    pub bytes: u64,
    /// Raw duration reported by the media tool
    pub duration_secs: f64,
    /// Number of cue insertions
    pub cue_count: usize,
}

/// One delivery file cut from the stream
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionPart {
    /// Encoded part
    pub path: PathBuf,
    /// Size on disk
    pub bytes: u64,
    /// Window start within the stream
    pub start_secs: f64,
    /// Window length
    pub duration_secs: f64,
}

/// Ordered file list for concatenation: each group's units, with the cue
/// between consecutive groups only. Empty groups are skipped.
#[must_use]
pub fn build_sequence(groups: &[Group], cue: &Path) -> Vec<PathBuf> {
    let mut sequence = Vec::new();
    for (i, group) in groups.iter().filter(|g| !g.is_empty()).enumerate() {
        if i > 0 {
            sequence.push(cue.to_path_buf());
        }
        sequence.extend(group.chunks.iter().map(|c| c.path.clone()));
    }
    sequence
}

async fn file_size(path: &Path) -> CastResult<u64> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| CastError::assembly(format!("Cannot stat {}: {e}", path.display())))?;
    Ok(metadata.len())
}

/// Concatenates groups and splits the result for distribution
#[derive(Debug, Clone)]
pub struct Assembler {
    media: Arc<dyn MediaTool>,
    policy: SplitPolicy,
}

impl Assembler {
    /// Create an assembler
    #[must_use]
    pub fn new(media: Arc<dyn MediaTool>, policy: SplitPolicy) -> Self {
        Self { media, policy }
    }

    /// Concatenate `groups` with `cue` between them into `output`.
    ///
    /// # Errors
    ///
    /// Returns [`CastError::AssemblyFatal`] when there is no group, and
    /// propagates media tool failures.
    pub async fn assemble(
        &self,
        groups: &[Group],
        cue: &RenderedCue,
        output: &Path,
    ) -> CastResult<AssembledStream> {
        let group_count = groups.iter().filter(|g| !g.is_empty()).count();
        if group_count == 0 {
            return Err(CastError::assembly("No audio groups to assemble"));
        }

        let sequence = build_sequence(groups, &cue.path);
        let cue_count = group_count - 1;
        info!(
            groups = group_count,
            files = sequence.len(),
            cue_count,
            output = %output.display(),
            "Concatenating episode"
        );

        self.media.concat_copy(&sequence, output).await?;

        let stream = AssembledStream {
            path: output.to_path_buf(),
            bytes: file_size(output).await?,
            duration_secs: self.media.probe_duration(output).await?,
            cue_count,
        };
        debug!(bytes = stream.bytes, duration_secs = stream.duration_secs, "Episode stream ready");
        Ok(stream)
    }

    /// Cut `stream` into parts no larger than the target when it exceeds the
    /// ceiling. Returns no parts when the stream is already small enough.
    ///
    /// # Errors
    ///
    /// Propagates media tool failures; fails if the stream has no duration.
    pub async fn split_for_distribution(
        &self,
        stream: &AssembledStream,
        ctx: &RunContext,
        extension: &str,
    ) -> CastResult<Vec<DistributionPart>> {
        if stream.bytes <= self.policy.ceiling_bytes {
            return Ok(Vec::new());
        }
        if stream.duration_secs <= 0.0 || stream.bytes == 0 {
            return Err(CastError::assembly("Cannot split a stream without duration"));
        }

        let estimate = self.policy.target_bytes as f64 / stream.bytes as f64
            * stream.duration_secs
            * self.policy.safety_factor;
        if estimate <= 0.0 {
            return Err(CastError::assembly("Distribution target too small to split"));
        }
        info!(
            bytes = stream.bytes,
            ceiling = self.policy.ceiling_bytes,
            target = self.policy.target_bytes,
            estimate_secs = estimate,
            "Splitting episode for distribution"
        );

        let mut parts = Vec::new();
        let mut start = 0.0;
        while stream.duration_secs - start > MIN_PART_SECS {
            let path = ctx.distribution_part_path(parts.len() + 1, extension);
            let part = self.cut_part(stream, start, estimate, path).await?;
            start += part.duration_secs;
            parts.push(part);
        }

        info!(parts = parts.len(), "Distribution parts written");
        Ok(parts)
    }

    /// Cut one part starting at `start`, shrinking the window until it fits
    async fn cut_part(
        &self,
        stream: &AssembledStream,
        start: f64,
        estimate: f64,
        path: PathBuf,
    ) -> CastResult<DistributionPart> {
        let remaining = stream.duration_secs - start;
        let mut window = estimate.min(remaining);
        let mut attempt = 1;

        loop {
            self.media
                .reencode_window(&stream.path, start, window, &path)
                .await?;
            let bytes = file_size(&path).await?;

            if bytes <= self.policy.target_bytes {
                debug!(part = %path.display(), start, window, bytes, attempt, "Part fits target");
                return Ok(DistributionPart {
                    path,
                    bytes,
                    start_secs: start,
                    duration_secs: window,
                });
            }
            if attempt >= self.policy.max_attempts {
                warn!(
                    part = %path.display(),
                    bytes,
                    target = self.policy.target_bytes,
                    attempts = attempt,
                    "Accepting part above target after final attempt"
                );
                return Ok(DistributionPart {
                    path,
                    bytes,
                    start_secs: start,
                    duration_secs: window,
                });
            }

            debug!(part = %path.display(), bytes, window, attempt, "Part over target, shrinking window");
            window *= 1.0 - self.policy.shrink_ratio;
            attempt += 1;
        }
    }
}
