//! Transition cue played between segment groups.
//!
//! The cue is a silence, tone, silence pattern rendered to PCM and then
//! encoded to the episode format with the media tool, so it can be
//! stream-copied alongside the synthesized units. It is rendered fresh on
//! every run.

use crate::config::CueConfig;
use crate::context::RunContext;
use crate::error::{CastError, CastResult};
use crate::media::MediaTool;
use std::f32::consts::TAU;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fade applied to both ends of the tone to avoid clicks
const FADE_MS: u32 = 8;

/// An encoded cue ready for assembly
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCue {
    /// Encoded cue file
    pub path: PathBuf,
    /// Measured raw duration of the encoded cue
    pub duration_secs: f64,
}

/// Generator for the transition cue
#[derive(Debug, Clone)]
pub struct TransitionCue {
    config: CueConfig,
}

impl TransitionCue {
    /// Create a cue generator
    ///
    /// # Errors
    ///
    /// Returns an error if the shape has no audible length
    pub fn new(config: CueConfig) -> CastResult<Self> {
        if config.sample_rate == 0 {
            return Err(CastError::configuration("cue.sample_rate must be positive"));
        }
        if config.lead_silence_ms + config.tone_ms + config.tail_silence_ms == 0 {
            return Err(CastError::configuration("cue must have a non-zero length"));
        }
        if !(0.0..=1.0).contains(&config.amplitude) {
            return Err(CastError::configuration("cue.amplitude must be within 0.0..=1.0"));
        }
        Ok(Self { config })
    }

    fn samples_for(&self, ms: u32) -> usize {
        (u64::from(self.config.sample_rate) * u64::from(ms) / 1000) as usize
    }

    /// PCM samples of the cue
    #[must_use]
    pub fn samples(&self) -> Vec<i16> {
        let lead = self.samples_for(self.config.lead_silence_ms);
        let tone = self.samples_for(self.config.tone_ms);
        let tail = self.samples_for(self.config.tail_silence_ms);
        let fade = self.samples_for(FADE_MS).min(tone / 2).max(1);

        let rate = self.config.sample_rate as f32;
        let peak = self.config.amplitude * f32::from(i16::MAX);

        let mut out = Vec::with_capacity(lead + tone + tail);
        out.resize(lead, 0);
        for i in 0..tone {
            let envelope = (i.min(tone - 1 - i) as f32 / fade as f32).min(1.0);
            let phase = TAU * self.config.tone_hz * i as f32 / rate;
            out.push((phase.sin() * peak * envelope).round() as i16);
        }
        out.resize(lead + tone + tail, 0);
        out
    }

    /// PCM layout of the rendered cue: mono, 16-bit
    #[must_use]
    pub const fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate: self.config.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    /// Write the cue samples to a WAV file at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written
    pub fn write_wav(&self, path: &Path) -> CastResult<()> {
        let mut writer = hound::WavWriter::create(path, self.wav_spec())?;
        for sample in self.samples() {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Render the cue to WAV and encode it to `extension` inside the run
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the WAV cannot be written or the media tool fails
    pub async fn render_to(
        &self,
        media: &dyn MediaTool,
        ctx: &RunContext,
        extension: &str,
    ) -> CastResult<RenderedCue> {
        let wav_path = ctx.cue_wav_path();
        self.write_wav(&wav_path)?;

        let path = ctx.cue_path(extension);
        media
            .reencode_window(&wav_path, 0.0, self.config.total_secs(), &path)
            .await?;
        let duration_secs = media.probe_duration(&path).await?;

        debug!(path = %path.display(), duration_secs, "Rendered transition cue");
        Ok(RenderedCue { path, duration_secs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_layout() {
        let cue = TransitionCue::new(CueConfig {
            lead_silence_ms: 100,
            tone_ms: 200,
            tail_silence_ms: 50,
            sample_rate: 1000,
            ..CueConfig::default()
        })
        .unwrap();

        let samples = cue.samples();
        assert_eq!(samples.len(), 350);
        assert!(samples[..100].iter().all(|&s| s == 0));
        assert!(samples[300..].iter().all(|&s| s == 0));
        assert!(samples[100..300].iter().any(|&s| s != 0));
    }

    #[test]
    fn test_tone_respects_amplitude() {
        let config = CueConfig::default();
        let limit = (config.amplitude * f32::from(i16::MAX)).ceil() as i16;
        let cue = TransitionCue::new(config).unwrap();
        assert!(cue.samples().iter().all(|s| s.abs() <= limit));
    }

    #[test]
    fn test_wav_holds_mono_pcm_samples() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("cue.wav");
        let cue = TransitionCue::new(CueConfig {
            sample_rate: 8_000,
            ..CueConfig::default()
        })
        .unwrap();

        cue.write_wav(&path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 8_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);

        let written: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(written, cue.samples());
        assert!((reader.duration() as f64 / 8_000.0 - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_write_wav_into_missing_dir_fails() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cue = TransitionCue::new(CueConfig::default()).unwrap();
        let err = cue
            .write_wav(&temp_dir.path().join("missing").join("cue.wav"))
            .unwrap_err();
        assert_eq!(err.category(), "file");
    }

    #[test]
    fn test_rejects_silent_cue() {
        let config = CueConfig {
            lead_silence_ms: 0,
            tone_ms: 0,
            tail_silence_ms: 0,
            ..CueConfig::default()
        };
        assert!(TransitionCue::new(config).is_err());
    }
}
