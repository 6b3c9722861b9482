//! Run-scoped output namespace.
//!
//! A [`RunContext`] is created once per episode and passed by reference into
//! every synthesis and assembly call. It owns the output directory layout;
//! nothing about a run lives in process-wide state.

use crate::error::{CastError, CastResult};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Output layout and identity of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    output_dir: PathBuf,
    episode_name: String,
}

impl RunContext {
    /// Create a context rooted at `output_dir`, creating the directory
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or the directory cannot be created
    pub fn create<P: Into<PathBuf>>(output_dir: P, episode_name: &str) -> CastResult<Self> {
        let episode_name = episode_name.trim();
        if episode_name.is_empty() || episode_name.contains(&['/', '\\'][..]) {
            return Err(CastError::invalid_input(format!(
                "Episode name must be a plain file stem, got '{episode_name}'"
            )));
        }

        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|e| {
            CastError::file(format!("Cannot create {}: {e}", output_dir.display()))
        })?;

        let ctx = Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            output_dir,
            episode_name: episode_name.to_string(),
        };
        debug!(run_id = %ctx.run_id, dir = %ctx.output_dir.display(), "Created run context");
        Ok(ctx)
    }

    /// Unique identifier of this run
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// When the run started
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Root output directory
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File stem of the final episode
    #[must_use]
    pub fn episode_name(&self) -> &str {
        &self.episode_name
    }

    /// Directory holding every synthesized unit
    #[must_use]
    pub fn parts_dir(&self) -> PathBuf {
        self.output_dir.join("tts_parts")
    }

    /// Directory for one segment's units
    #[must_use]
    pub fn segment_dir(&self, segment_index: usize) -> PathBuf {
        self.parts_dir().join(format!("seg_{segment_index:03}"))
    }

    /// Scratch file for one synthesis attempt.
    ///
    /// `label` encodes the chunk and its bisection path (`c002_ab`), so
    /// concurrent generators never collide and no counter is shared.
    #[must_use]
    pub fn scratch_unit_path(&self, segment_index: usize, label: &str, extension: &str) -> PathBuf {
        self.segment_dir(segment_index)
            .join(format!("scratch_{label}.{extension}"))
    }

    /// Location of a unit accepted by the generator, before group numbering
    #[must_use]
    pub fn chunk_unit_path(&self, segment_index: usize, label: &str, extension: &str) -> PathBuf {
        self.segment_dir(segment_index)
            .join(format!("unit_{label}.{extension}"))
    }

    /// Final location of a unit in its group
    #[must_use]
    pub fn unit_path(&self, segment_index: usize, sequence: usize, extension: &str) -> PathBuf {
        self.segment_dir(segment_index)
            .join(format!("part_{sequence:03}.{extension}"))
    }

    /// Uncompressed render of the transition cue
    #[must_use]
    pub fn cue_wav_path(&self) -> PathBuf {
        self.output_dir.join("transition_cue.wav")
    }

    /// Encoded transition cue
    #[must_use]
    pub fn cue_path(&self, extension: &str) -> PathBuf {
        self.output_dir.join(format!("transition_cue.{extension}"))
    }

    /// Full episode stream
    #[must_use]
    pub fn episode_path(&self, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.{extension}", self.episode_name))
    }

    /// One size-capped distribution part (1-based)
    #[must_use]
    pub fn distribution_part_path(&self, part: usize, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_part{part:02}.{extension}", self.episode_name))
    }

    /// Timestamp map artifact
    #[must_use]
    pub fn timestamps_path(&self) -> PathBuf {
        self.output_dir.join("timestamps.json")
    }

    /// Run status artifact
    #[must_use]
    pub fn status_path(&self) -> PathBuf {
        self.output_dir.join("status.json")
    }
}
