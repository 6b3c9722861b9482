//! End-to-end episode production.
//!
//! [`EpisodePipeline::run`] takes a marker-delimited script and its content
//! items and produces the episode audio, the distribution parts, the
//! timestamp map and the run report. Unit-level failures are reported;
//! anything that breaks assembly aborts the run and removes what was written.

use crate::assembler::{Assembler, SplitPolicy};
use crate::config::{EngineConfig, EPISODE_FORMAT};
use crate::context::RunContext;
use crate::cue::TransitionCue;
use crate::episode::{ContentItem, Episode, TextSegment};
use crate::error::{CastError, CastResult};
use crate::grouping::SegmentGrouper;
use crate::media::{FfmpegTool, MediaTool};
use crate::report::RunReport;
use crate::script::split_script;
use crate::synthesis::{SpeechApiBackend, SpeechBackend, SynthesisAdapter, TranslateTtsBackend};
use crate::timestamps::{reconstruct, StreamLayout};
use crate::unit_generator::UnitGenerator;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Contents of `status.json`
#[derive(Debug, Serialize)]
struct RunStatus<'a> {
    run_id: Uuid,
    episode: &'a str,
    stream: &'a Path,
    parts: &'a [PathBuf],
    report: &'a RunReport,
}

/// Produces an episode from a script
#[derive(Debug, Clone)]
pub struct EpisodePipeline {
    config: EngineConfig,
    adapter: Arc<SynthesisAdapter>,
    media: Arc<dyn MediaTool>,
}

impl EpisodePipeline {
    /// Create a pipeline over an explicit adapter and media tool
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the adapter's
    /// engines do not produce MP3 units
    pub fn new(
        config: EngineConfig,
        adapter: SynthesisAdapter,
        media: Arc<dyn MediaTool>,
    ) -> CastResult<Self> {
        config.validate()?;
        if adapter.extension() != EPISODE_FORMAT {
            return Err(CastError::configuration(format!(
                "Synthesis engines return .{} audio; episodes are assembled from .{EPISODE_FORMAT} units",
                adapter.extension()
            )));
        }
        Ok(Self {
            config,
            adapter: Arc::new(adapter),
            media,
        })
    }

    /// Create a pipeline with the HTTP engines and `ffmpeg` from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a client cannot be built
    pub fn from_config(config: EngineConfig) -> CastResult<Self> {
        config.validate()?;
        let primary: Arc<dyn SpeechBackend> = Arc::new(SpeechApiBackend::new(&config.speech_api)?);
        let secondary: Option<Arc<dyn SpeechBackend>> = if config.secondary.enabled {
            Some(Arc::new(TranslateTtsBackend::new(&config.secondary)?))
        } else {
            None
        };
        let adapter = SynthesisAdapter::from_config(&config, primary, secondary)?;
        let media: Arc<dyn MediaTool> = Arc::new(FfmpegTool::new(&config.ffmpeg));
        Self::new(config, adapter, media)
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Split the script on the segment marker into cleaned segments, keeping
    /// empty segments at their raw index
    #[must_use]
    pub fn prepare_segments(&self, script: &str) -> Vec<TextSegment> {
        split_script(script, &self.config.segment_marker)
    }

    /// Produce the episode for `script` and `items` inside `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`CastError::AssemblyFatal`] when no unit could be produced,
    /// and any media tool or file error hit during assembly. No episode file
    /// is left behind on error.
    pub async fn run(
        &self,
        script: &str,
        items: &[ContentItem],
        ctx: &RunContext,
    ) -> CastResult<Episode> {
        info!(
            run_id = %ctx.run_id(),
            started_at = %ctx.started_at(),
            out = %ctx.output_dir().display(),
            "Starting episode run"
        );

        let result = self.produce(script, items, ctx).await;
        if let Err(err) = &result {
            error!(run_id = %ctx.run_id(), error = %err, category = err.category(), "Episode run failed");
            remove_outputs(ctx, self.adapter.extension()).await;
        }
        if !self.config.keep_intermediate {
            remove_intermediate(ctx, self.adapter.extension()).await;
        }
        result
    }

    async fn produce(
        &self,
        script: &str,
        items: &[ContentItem],
        ctx: &RunContext,
    ) -> CastResult<Episode> {
        let extension = self.adapter.extension().to_string();
        let segments = self.prepare_segments(script);
        debug!(
            segments = segments.len(),
            empty = segments.iter().filter(|s| s.is_empty()).count(),
            "Prepared script"
        );

        let generator = Arc::new(UnitGenerator::new(
            Arc::clone(&self.adapter),
            self.config.max_unit_bytes,
            self.config.min_split_chars,
        ));
        let grouper = SegmentGrouper::new(
            generator,
            Arc::clone(&self.media),
            self.config.chunk_chars,
            self.config.max_concurrent_synthesis,
        );
        let grouped = grouper.synthesize_segments(&segments, ctx).await?;

        if grouped.groups.is_empty() {
            return Err(CastError::assembly(format!(
                "No usable audio units ({} issue(s) recorded)",
                grouped.issues.len()
            )));
        }

        let cue = TransitionCue::new(self.config.cue.clone())?
            .render_to(self.media.as_ref(), ctx, &extension)
            .await?;

        let assembler = Assembler::new(Arc::clone(&self.media), SplitPolicy::from_config(&self.config));
        let stream = assembler
            .assemble(&grouped.groups, &cue, &ctx.episode_path(&extension))
            .await?;
        let split = assembler.split_for_distribution(&stream, ctx, &extension).await?;
        let parts: Vec<PathBuf> = if split.is_empty() {
            vec![stream.path.clone()]
        } else {
            split.into_iter().map(|p| p.path).collect()
        };

        let durations: Vec<f64> = grouped.groups.iter().map(|g| g.raw_duration()).collect();
        let map = reconstruct(
            &StreamLayout {
                segments: &segments,
                segment_to_group: &grouped.segment_to_group,
                group_raw_durations: &durations,
                cue_raw_secs: cue.duration_secs,
                tempo: self.config.tempo,
            },
            items,
        );

        let items_timestamped = map.items.iter().filter(|e| e.timestamp.is_some()).count();
        let report = RunReport {
            segments_total: segments.len(),
            groups_produced: grouped.groups.len(),
            units_produced: grouped.unit_count(),
            items_timestamped,
            items_unavailable: map.items.len() - items_timestamped,
            parts_written: parts.len(),
            raw_duration_secs: stream.duration_secs,
            playback_duration_secs: stream.duration_secs / self.config.tempo,
            issues: grouped.issues,
        };

        let episode = Episode {
            stream_path: stream.path,
            parts,
            raw_duration_secs: stream.duration_secs,
            group_starts: map.group_starts,
            timestamps: map.items,
            report,
        };
        write_artifacts(&episode, ctx).await?;

        for issue in &episode.report.issues {
            warn!(severity = ?issue.severity(), "{}", issue.summary());
        }
        info!(
            groups = episode.report.groups_produced,
            units = episode.report.units_produced,
            parts = episode.report.parts_written,
            playback_secs = episode.report.playback_duration_secs,
            issues = episode.report.issues.len(),
            "Episode ready"
        );
        Ok(episode)
    }
}

async fn write_artifacts(episode: &Episode, ctx: &RunContext) -> CastResult<()> {
    let timestamps = serde_json::to_string_pretty(&episode.timestamp_map())?;
    tokio::fs::write(ctx.timestamps_path(), timestamps).await?;

    let status = RunStatus {
        run_id: ctx.run_id(),
        episode: ctx.episode_name(),
        stream: &episode.stream_path,
        parts: &episode.parts,
        report: &episode.report,
    };
    tokio::fs::write(ctx.status_path(), serde_json::to_string_pretty(&status)?).await?;
    Ok(())
}

async fn remove_file_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Cannot remove file"),
    }
}

/// Delete every delivery artifact of the episode
async fn remove_outputs(ctx: &RunContext, extension: &str) {
    remove_file_quietly(&ctx.episode_path(extension)).await;
    let mut part = 1;
    loop {
        let path = ctx.distribution_part_path(part, extension);
        if !path.exists() {
            break;
        }
        remove_file_quietly(&path).await;
        part += 1;
    }
    remove_file_quietly(&ctx.timestamps_path()).await;
    remove_file_quietly(&ctx.status_path()).await;
}

/// Delete units and the cue
async fn remove_intermediate(ctx: &RunContext, extension: &str) {
    let parts_dir = ctx.parts_dir();
    match tokio::fs::remove_dir_all(&parts_dir).await {
        Ok(()) => debug!(dir = %parts_dir.display(), "Removed synthesized units"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(dir = %parts_dir.display(), error = %e, "Cannot remove units"),
    }
    remove_file_quietly(&ctx.cue_wav_path()).await;
    remove_file_quietly(&ctx.cue_path(extension)).await;
}
