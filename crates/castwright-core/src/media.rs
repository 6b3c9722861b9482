//! External encode/decode tool boundary.
//!
//! Assembly needs exactly three operations from a media tool: probe a file's
//! duration, concatenate files losslessly, and re-encode a time window. The
//! [`MediaTool`] trait is that boundary; [`FfmpegTool`] implements it with
//! the `ffmpeg`/`ffprobe` binaries.

use crate::config::FfmpegConfig;
use crate::error::{CastError, CastResult};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// Duration probing, lossless concatenation and windowed re-encoding
#[async_trait]
pub trait MediaTool: Send + Sync + std::fmt::Debug {
    /// Duration of an encoded file in seconds
    async fn probe_duration(&self, path: &Path) -> CastResult<f64>;

    /// Concatenate `inputs` in order into `output` without re-encoding
    async fn concat_copy(&self, inputs: &[PathBuf], output: &Path) -> CastResult<()>;

    /// Re-encode `duration` seconds of `input` starting at `start` into an
    /// MP3 `output`
    async fn reencode_window(&self, input: &Path, start: f64, duration: f64, output: &Path) -> CastResult<()>;
}

/// [`MediaTool`] backed by `ffmpeg` and `ffprobe`. Windows are always
/// re-encoded with LAME, so every input is expected to be MP3.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    quality: u8,
}

impl FfmpegTool {
    /// Create a tool from configuration
    #[must_use]
    pub fn new(config: &FfmpegConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_bin.clone(),
            ffprobe: config.ffprobe_bin.clone(),
            quality: config.quality.min(9),
        }
    }

    async fn exec(&self, operation: &str, program: &Path, args: Vec<OsString>) -> CastResult<Output> {
        debug!(operation, program = %program.display(), ?args, "Running media tool");

        let output = Command::new(program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                CastError::media_tool(operation, format!("cannot launch {}: {e}", program.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            let detail = tail.into_iter().rev().collect::<Vec<_>>().join(" | ");
            return Err(CastError::media_tool(
                operation,
                format!("{} exited with {}: {detail}", program.display(), output.status),
            ));
        }
        Ok(output)
    }

    fn ffmpeg_args(extra: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.extend(extra);
        args
    }
}

/// Quote a path for an ffmpeg concat list entry
fn concat_entry(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', r"'\''");
    format!("file '{escaped}'\n")
}

fn seconds_arg(secs: f64) -> OsString {
    OsString::from(format!("{secs:.3}"))
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn probe_duration(&self, path: &Path) -> CastResult<f64> {
        let args = vec![
            OsString::from("-v"),
            OsString::from("error"),
            OsString::from("-show_entries"),
            OsString::from("format=duration"),
            OsString::from("-of"),
            OsString::from("default=noprint_wrappers=1:nokey=1"),
            path.as_os_str().to_os_string(),
        ];
        let output = self.exec("probe", &self.ffprobe, args).await?;

        let raw = String::from_utf8_lossy(&output.stdout);
        let duration: f64 = raw.trim().parse().map_err(|_| {
            CastError::media_tool(
                "probe",
                format!("unreadable duration '{}' for {}", raw.trim(), path.display()),
            )
        })?;
        if !duration.is_finite() || duration < 0.0 {
            return Err(CastError::media_tool("probe", format!("invalid duration {duration}")));
        }
        Ok(duration)
    }

    async fn concat_copy(&self, inputs: &[PathBuf], output: &Path) -> CastResult<()> {
        if inputs.is_empty() {
            return Err(CastError::media_tool("concat", "no inputs"));
        }

        let mut list_name = output.file_name().map(OsString::from).unwrap_or_default();
        list_name.push(".concat.txt");
        let list_path = output.with_file_name(list_name);

        let listing: String = inputs.iter().map(|p| concat_entry(p)).collect();
        tokio::fs::write(&list_path, listing).await.map_err(|e| {
            CastError::media_tool("concat", format!("cannot write {}: {e}", list_path.display()))
        })?;

        let args = Self::ffmpeg_args([
            OsString::from("-f"),
            OsString::from("concat"),
            OsString::from("-safe"),
            OsString::from("0"),
            OsString::from("-i"),
            list_path.as_os_str().to_os_string(),
            OsString::from("-c"),
            OsString::from("copy"),
            output.as_os_str().to_os_string(),
        ]);
        let result = self.exec("concat", &self.ffmpeg, args).await;

        // The list is only meaningful for this one invocation
        let _ = tokio::fs::remove_file(&list_path).await;
        result.map(|_| ())
    }

    async fn reencode_window(&self, input: &Path, start: f64, duration: f64, output: &Path) -> CastResult<()> {
        if duration <= 0.0 || start < 0.0 {
            return Err(CastError::media_tool(
                "reencode",
                format!("invalid window start={start} duration={duration}"),
            ));
        }

        let args = Self::ffmpeg_args([
            OsString::from("-ss"),
            seconds_arg(start),
            OsString::from("-t"),
            seconds_arg(duration),
            OsString::from("-i"),
            input.as_os_str().to_os_string(),
            OsString::from("-vn"),
            OsString::from("-c:a"),
            OsString::from("libmp3lame"),
            OsString::from("-q:a"),
            OsString::from(self.quality.to_string()),
            output.as_os_str().to_os_string(),
        ]);
        self.exec("reencode", &self.ffmpeg, args).await.map(|_| ())
    }
}
