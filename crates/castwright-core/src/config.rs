//! Engine configuration.
//!
//! Every option has a default so a partial (or absent) TOML file is valid.
//! Byte limits are expressed in bytes; the defaults mirror common podcast
//! host upload limits (10 MiB) with headroom for container overhead.

use crate::error::{CastError, CastResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const MIB: u64 = 1024 * 1024;

/// Default per-unit byte ceiling (9.5 MiB)
pub const DEFAULT_MAX_UNIT_BYTES: u64 = 9 * MIB + MIB / 2;

/// Default distribution ceiling (10 MiB)
pub const DEFAULT_DISTRIBUTION_CEILING_BYTES: u64 = 10 * MIB;

/// Container of units, the cue and the episode. The secondary engine only
/// returns MPEG audio and re-encoding targets LAME, so nothing else can be
/// stream-copied together.
pub const EPISODE_FORMAT: &str = "mp3";

/// Default distribution part target (9.9 MiB)
pub const DEFAULT_DISTRIBUTION_TARGET_BYTES: u64 = 10 * MIB - MIB / 10;

/// Text shorter than this is never bisected again
pub const DEFAULT_MIN_SPLIT_CHARS: usize = 400;

/// Sentinel between narration segments in a script
pub const DEFAULT_SEGMENT_MARKER: &str = "[[TRANSITION]]";

/// Speaking rate passed to speech engines.
///
/// Accepts either a signed percentage (`"+20%"`, `"-10%"`) or a bare
/// multiplier (`"1.2"`). Stored as a multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechRate(f32);

impl SpeechRate {
    /// Create a rate from a multiplier (1.0 = engine default)
    ///
    /// # Errors
    ///
    /// Returns an error if the multiplier is outside 0.25..=4.0
    pub fn from_multiplier(multiplier: f32) -> CastResult<Self> {
        if !(0.25..=4.0).contains(&multiplier) {
            return Err(CastError::configuration(format!(
                "Speech rate must be between 0.25 and 4.0, got {multiplier}"
            )));
        }
        Ok(Self(multiplier))
    }

    /// Rate as a multiplier
    #[must_use]
    pub const fn multiplier(self) -> f32 {
        self.0
    }

    /// Rate as a signed percentage string, e.g. `+20%`
    #[must_use]
    pub fn as_percent(self) -> String {
        let pct = ((self.0 - 1.0) * 100.0).round() as i32;
        format!("{pct:+}%")
    }
}

impl Default for SpeechRate {
    fn default() -> Self {
        Self(1.2)
    }
}

impl FromStr for SpeechRate {
    type Err = CastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || CastError::configuration(format!("Unrecognized speech rate '{s}'"));

        if let Some(pct) = trimmed.strip_suffix('%') {
            let value: f32 = pct.trim().parse().map_err(|_| invalid())?;
            return Self::from_multiplier(1.0 + value / 100.0);
        }

        let value: f32 = trimmed.parse().map_err(|_| invalid())?;
        Self::from_multiplier(value)
    }
}

impl fmt::Display for SpeechRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_percent())
    }
}

impl Serialize for SpeechRate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_percent())
    }
}

impl<'de> Deserialize<'de> for SpeechRate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Retry policy applied to every synthesis candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per voice before advancing to the next candidate
    pub attempts_per_voice: u32,
    /// Delay after the first failed attempt; doubles on each retry
    pub base_delay_ms: u64,
    /// Upper bound for a single synthesis request
    pub attempt_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts_per_voice: 3,
            base_delay_ms: 800,
            attempt_timeout_secs: 60,
        }
    }
}

impl RetryConfig {
    /// Timeout for one synthesis request
    #[must_use]
    pub const fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

/// Shape of the transition cue: silence, tone, silence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    /// Leading silence in milliseconds
    pub lead_silence_ms: u32,
    /// Tone length in milliseconds
    pub tone_ms: u32,
    /// Trailing silence in milliseconds
    pub tail_silence_ms: u32,
    /// Tone frequency in Hz
    pub tone_hz: f32,
    /// Peak amplitude of the tone (0.0 to 1.0)
    pub amplitude: f32,
    /// Sample rate of the rendered cue
    pub sample_rate: u32,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            lead_silence_ms: 350,
            tone_ms: 250,
            tail_silence_ms: 350,
            tone_hz: 880.0,
            amplitude: 0.35,
            sample_rate: 24_000,
        }
    }
}

impl CueConfig {
    /// Total cue length in seconds
    #[must_use]
    pub fn total_secs(&self) -> f64 {
        f64::from(self.lead_silence_ms + self.tone_ms + self.tail_silence_ms) / 1000.0
    }
}

/// OpenAI-compatible speech endpoint used as the primary engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechApiConfig {
    /// Base URL, without the `/v1/audio/speech` path
    pub base_url: String,
    /// Model name sent with each request
    pub model: String,
    /// Optional bearer token
    pub api_key: Option<String>,
    /// Encoded format requested from the engine
    pub response_format: String,
}

impl Default for SpeechApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8880".to_string(),
            model: "kokoro".to_string(),
            api_key: None,
            response_format: "mp3".to_string(),
        }
    }
}

/// Lower-fidelity last-resort engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondaryEngineConfig {
    /// Whether the secondary engine is tried at all
    pub enabled: bool,
    /// Language code sent to the engine
    pub language: String,
    /// Endpoint serving `translate_tts`
    pub base_url: String,
}

impl Default for SecondaryEngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "en".to_string(),
            base_url: "https://translate.google.com".to_string(),
        }
    }
}

/// Location and encoder settings of the external media tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    /// ffmpeg executable
    pub ffmpeg_bin: PathBuf,
    /// ffprobe executable
    pub ffprobe_bin: PathBuf,
    /// LAME VBR quality used when re-encoding (0 best, 9 worst)
    pub quality: u8,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            quality: 4,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Primary voice identifier
    pub voice: String,
    /// Voices tried, in order, after the primary voice fails
    pub fallback_voices: Vec<String>,
    /// Speaking rate
    pub rate: SpeechRate,
    /// Upper bound for a text chunk handed to the synthesizer
    pub chunk_chars: usize,
    /// Byte ceiling for one encoded unit
    pub max_unit_bytes: u64,
    /// Text shorter than this is accepted even when its unit is oversized
    pub min_split_chars: usize,
    /// Episodes larger than this are split into parts
    pub distribution_ceiling_bytes: u64,
    /// Size each distribution part aims to stay under
    pub distribution_target_bytes: u64,
    /// Multiplier applied to the estimated part duration
    pub split_safety_factor: f64,
    /// Fraction removed from a part's duration when it comes out too large
    pub split_shrink_ratio: f64,
    /// Cut attempts per part before accepting the result
    pub split_max_attempts: u32,
    /// Playback tempo multiplier applied to the whole stream
    pub tempo: f64,
    /// Sentinel separating narration segments in a script
    pub segment_marker: String,
    /// Concurrent synthesis requests
    pub max_concurrent_synthesis: usize,
    /// Keep unit files, cue and concat list after assembly
    pub keep_intermediate: bool,
    /// Retry policy
    pub retry: RetryConfig,
    /// Transition cue shape
    pub cue: CueConfig,
    /// Primary engine
    pub speech_api: SpeechApiConfig,
    /// Secondary engine
    pub secondary: SecondaryEngineConfig,
    /// External media tool
    pub ffmpeg: FfmpegConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            voice: "bm_george".to_string(),
            fallback_voices: vec![
                "bm_lewis".to_string(),
                "am_michael".to_string(),
                "bf_emma".to_string(),
            ],
            rate: SpeechRate::default(),
            chunk_chars: 3000,
            max_unit_bytes: DEFAULT_MAX_UNIT_BYTES,
            min_split_chars: DEFAULT_MIN_SPLIT_CHARS,
            distribution_ceiling_bytes: DEFAULT_DISTRIBUTION_CEILING_BYTES,
            distribution_target_bytes: DEFAULT_DISTRIBUTION_TARGET_BYTES,
            split_safety_factor: 0.97,
            split_shrink_ratio: 0.08,
            split_max_attempts: 4,
            tempo: 1.0,
            segment_marker: DEFAULT_SEGMENT_MARKER.to_string(),
            max_concurrent_synthesis: 4,
            keep_intermediate: false,
            retry: RetryConfig::default(),
            cue: CueConfig::default(),
            speech_api: SpeechApiConfig::default(),
            secondary: SecondaryEngineConfig::default(),
            ffmpeg: FfmpegConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text and validate it
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or a value is out of range
    pub fn from_toml_str(raw: &str) -> CastResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> CastResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading engine configuration");
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CastError::configuration(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Primary voice followed by the fallback voices, without duplicates
    #[must_use]
    pub fn voice_candidates(&self) -> Vec<String> {
        let mut out = vec![self.voice.clone()];
        for voice in &self.fallback_voices {
            if !out.contains(voice) {
                out.push(voice.clone());
            }
        }
        out
    }

    /// Validate configuration values
    pub fn validate(&self) -> CastResult<()> {
        if self.voice.trim().is_empty() {
            return Err(CastError::configuration("Voice cannot be empty"));
        }

        if self.chunk_chars == 0 {
            return Err(CastError::configuration("chunk_chars must be greater than 0"));
        }

        if self.min_split_chars < 2 {
            return Err(CastError::configuration(format!(
                "min_split_chars must be at least 2, got {}",
                self.min_split_chars
            )));
        }

        if self.max_unit_bytes == 0 {
            return Err(CastError::configuration("max_unit_bytes must be greater than 0"));
        }

        if self.distribution_target_bytes == 0
            || self.distribution_target_bytes > self.distribution_ceiling_bytes
        {
            return Err(CastError::configuration(format!(
                "distribution_target_bytes ({}) must be in 1..={}",
                self.distribution_target_bytes, self.distribution_ceiling_bytes
            )));
        }

        if !(0.1..=1.0).contains(&self.split_safety_factor) {
            return Err(CastError::configuration(format!(
                "split_safety_factor must be between 0.1 and 1.0, got {}",
                self.split_safety_factor
            )));
        }

        if !(0.01..0.9).contains(&self.split_shrink_ratio) {
            return Err(CastError::configuration(format!(
                "split_shrink_ratio must be between 0.01 and 0.9, got {}",
                self.split_shrink_ratio
            )));
        }

        if self.split_max_attempts == 0 {
            return Err(CastError::configuration("split_max_attempts must be at least 1"));
        }

        if !(self.tempo.is_finite() && self.tempo > 0.0) {
            return Err(CastError::configuration(format!(
                "tempo must be a positive number, got {}",
                self.tempo
            )));
        }

        if self.segment_marker.trim().is_empty() {
            return Err(CastError::configuration("segment_marker cannot be empty"));
        }

        if self.max_concurrent_synthesis == 0 {
            return Err(CastError::configuration(
                "max_concurrent_synthesis must be at least 1",
            ));
        }

        if self.retry.attempts_per_voice == 0 {
            return Err(CastError::configuration("retry.attempts_per_voice must be at least 1"));
        }

        if !(0.0..=1.0).contains(&self.cue.amplitude) {
            return Err(CastError::configuration(format!(
                "cue.amplitude must be between 0.0 and 1.0, got {}",
                self.cue.amplitude
            )));
        }

        if self.speech_api.response_format != EPISODE_FORMAT {
            return Err(CastError::configuration(format!(
                "speech_api.response_format must be \"{EPISODE_FORMAT}\", got \"{}\"",
                self.speech_api.response_format
            )));
        }

        if self.cue.sample_rate < 8000 || self.cue.sample_rate > 48000 {
            return Err(CastError::configuration(format!(
                "cue.sample_rate must be between 8000 and 48000 Hz, got {}",
                self.cue.sample_rate
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.max_unit_bytes, 9_961_472);
        assert_eq!(config.min_split_chars, 400);
        assert_eq!(config.distribution_ceiling_bytes, 10_485_760);
        assert!(config.distribution_target_bytes < config.distribution_ceiling_bytes);
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case("+20%", 1.2)]
    #[case("-10%", 0.9)]
    #[case("+0%", 1.0)]
    #[case("1.35", 1.35)]
    fn test_speech_rate_parsing(#[case] raw: &str, #[case] expected: f32) {
        let rate: SpeechRate = raw.parse().unwrap();
        assert!((rate.multiplier() - expected).abs() < 1e-6);
    }

    #[rstest]
    #[case("fast")]
    #[case("+900%")]
    #[case("0.1")]
    fn test_speech_rate_rejects(#[case] raw: &str) {
        assert!(raw.parse::<SpeechRate>().is_err());
    }

    #[test]
    fn test_speech_rate_percent_round_trip() {
        let rate: SpeechRate = "-15%".parse().unwrap();
        assert_eq!(rate.as_percent(), "-15%");
        assert_eq!(SpeechRate::default().to_string(), "+20%");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            voice = "af_heart"
            rate = "+5%"
            tempo = 1.25

            [cue]
            tone_hz = 660.0
            "#,
        )
        .unwrap();

        assert_eq!(config.voice, "af_heart");
        assert!((config.rate.multiplier() - 1.05).abs() < 1e-6);
        assert!((config.tempo - 1.25).abs() < f64::EPSILON);
        assert!((config.cue.tone_hz - 660.0).abs() < f32::EPSILON);
        assert_eq!(config.cue.tone_ms, 250);
        assert_eq!(config.chunk_chars, 3000);
    }

    #[test]
    fn test_invalid_toml_values_rejected() {
        assert!(EngineConfig::from_toml_str("tempo = 0.0").is_err());
        assert!(EngineConfig::from_toml_str("min_split_chars = 1").is_err());
        assert!(EngineConfig::from_toml_str(
            "distribution_target_bytes = 20000000\ndistribution_ceiling_bytes = 10000000"
        )
        .is_err());
        assert!(EngineConfig::from_toml_str("voice = [1, 2]").is_err());
    }

    #[rstest]
    #[case("wav")]
    #[case("opus")]
    #[case("flac")]
    #[case("MP3")]
    fn test_non_mp3_response_format_rejected(#[case] format: &str) {
        let toml = format!("[speech_api]\nresponse_format = \"{format}\"");
        let err = EngineConfig::from_toml_str(&toml).unwrap_err();
        assert_eq!(err.category(), "configuration");
        assert!(err.to_string().contains("response_format"));
    }

    #[test]
    fn test_voice_candidates_deduplicated() {
        let config = EngineConfig {
            voice: "bm_lewis".to_string(),
            ..EngineConfig::default()
        };
        assert_eq!(
            config.voice_candidates(),
            vec!["bm_lewis", "am_michael", "bf_emma"]
        );
    }

    #[test]
    fn test_cue_total_secs() {
        assert!((CueConfig::default().total_secs() - 0.95).abs() < 1e-9);
    }
}
