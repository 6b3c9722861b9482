//! Speech synthesis with voice and engine fallback.
//!
//! A [`SynthesisAdapter`] owns an ordered list of [`Candidate`]s: the primary
//! engine with the primary voice, the same engine with each fallback voice,
//! and finally a secondary, lower-fidelity engine. Each candidate gets the
//! same [`RetryPolicy`]. The walk over candidates is an explicit state
//! machine, [`CandidateState`].

pub mod speech_api;
pub mod translate;

use crate::config::{EngineConfig, RetryConfig, SpeechRate};
use crate::error::{CastError, CastResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use speech_api::SpeechApiBackend;
pub use translate::TranslateTtsBackend;

/// A speech engine reachable over the network.
///
/// Implementations return one encoded audio unit for the whole `text`. They
/// classify failures: [`CastError::TransientSynthesis`] (and network or
/// timeout errors) are retried, [`CastError::VoiceUnavailable`] moves on to
/// the next candidate immediately.
#[async_trait]
pub trait SpeechBackend: Send + Sync + std::fmt::Debug {
    /// Short engine name used in logs
    fn name(&self) -> &str;

    /// File extension of the encoded audio this engine returns
    fn extension(&self) -> &str {
        "mp3"
    }

    /// Synthesize `text` with `voice` at `rate`
    ///
    /// # Errors
    ///
    /// Returns a classified error when the engine produces no audio
    async fn synthesize(&self, text: &str, voice: &str, rate: SpeechRate) -> CastResult<Vec<u8>>;
}

/// One engine/voice pair to try
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Engine
    pub backend: Arc<dyn SpeechBackend>,
    /// Voice passed to the engine
    pub voice: String,
}

impl Candidate {
    /// Create a candidate
    #[must_use]
    pub fn new<S: Into<String>>(backend: Arc<dyn SpeechBackend>, voice: S) -> Self {
        Self {
            backend,
            voice: voice.into(),
        }
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.backend.name(), self.voice)
    }
}

/// Retry behaviour for a single candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before advancing to the next candidate
    pub attempts: u32,
    /// Delay after the first failure; doubles after each further failure
    pub base_delay: Duration,
    /// Upper bound for one attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based)
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts_per_voice.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            attempt_timeout: config.attempt_timeout(),
        }
    }
}

/// Progress through the candidate list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateState {
    /// Attempting candidate `i`
    Trying(usize),
    /// Candidate `candidate` produced `audio`
    Success {
        /// Index of the successful candidate
        candidate: usize,
        /// Encoded audio
        audio: Vec<u8>,
    },
    /// Every candidate failed
    AllExhausted,
}

impl CandidateState {
    /// Whether the walk is finished
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Trying(_))
    }
}

/// One encoded unit written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedUnit {
    /// Where the unit was written
    pub path: PathBuf,
    /// Encoded size
    pub bytes: u64,
    /// Engine that produced it
    pub engine: String,
    /// Voice that produced it
    pub voice: String,
}

/// Synthesizes text through an ordered candidate list
#[derive(Debug, Clone)]
pub struct SynthesisAdapter {
    candidates: Vec<Candidate>,
    rate: SpeechRate,
    policy: RetryPolicy,
}

impl SynthesisAdapter {
    /// Create an adapter over explicit candidates
    ///
    /// # Errors
    ///
    /// Returns an error if no candidate is given, or if the candidates
    /// produce different containers (their units could not be stream-copied
    /// into one group)
    pub fn new(candidates: Vec<Candidate>, rate: SpeechRate, policy: RetryPolicy) -> CastResult<Self> {
        let Some(first) = candidates.first() else {
            return Err(CastError::configuration("At least one synthesis candidate is required"));
        };
        let extension = first.backend.extension();
        if let Some(odd) = candidates.iter().find(|c| c.backend.extension() != extension) {
            return Err(CastError::configuration(format!(
                "Engine {} returns .{} audio but {} returns .{extension}",
                odd.backend.name(),
                odd.backend.extension(),
                first.backend.name(),
            )));
        }
        Ok(Self {
            candidates,
            rate,
            policy,
        })
    }

    /// Build the candidate list from configuration: every configured voice on
    /// `primary`, then `secondary` (when given) as the last resort
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration yields no candidate
    pub fn from_config(
        config: &EngineConfig,
        primary: Arc<dyn SpeechBackend>,
        secondary: Option<Arc<dyn SpeechBackend>>,
    ) -> CastResult<Self> {
        let mut candidates: Vec<Candidate> = config
            .voice_candidates()
            .into_iter()
            .map(|voice| Candidate::new(Arc::clone(&primary), voice))
            .collect();

        if let Some(secondary) = secondary {
            candidates.push(Candidate::new(secondary, config.secondary.language.clone()));
        }

        Self::new(candidates, config.rate, RetryPolicy::from(&config.retry))
    }

    /// Candidates in the order they are tried
    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Extension shared by every candidate's units
    #[must_use]
    pub fn extension(&self) -> &str {
        self.candidates[0].backend.extension()
    }

    /// Synthesize `text` and write the unit to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CastError::AllEnginesExhausted`] when no candidate produced
    /// audio, or a file error when the unit cannot be written.
    pub async fn synthesize_to_file(&self, text: &str, path: &Path) -> CastResult<SynthesizedUnit> {
        let (candidate, audio) = self.run(text).await?;
        let candidate = &self.candidates[candidate];

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &audio).await.map_err(|e| {
            CastError::file(format!("Cannot write unit {}: {e}", path.display()))
        })?;

        Ok(SynthesizedUnit {
            path: path.to_path_buf(),
            bytes: audio.len() as u64,
            engine: candidate.backend.name().to_string(),
            voice: candidate.voice.clone(),
        })
    }

    /// Walk the candidates until one produces audio.
    async fn run(&self, text: &str) -> CastResult<(usize, Vec<u8>)> {
        let mut state = CandidateState::Trying(0);
        let mut last_error = CastError::exhausted(0, "no attempt made");

        while !state.is_terminal() {
            state = match state {
                CandidateState::Trying(i) if i >= self.candidates.len() => CandidateState::AllExhausted,
                CandidateState::Trying(i) => match self.try_candidate(&self.candidates[i], text).await {
                    Ok(audio) => CandidateState::Success { candidate: i, audio },
                    Err(err) => {
                        if i + 1 < self.candidates.len() {
                            warn!(
                                candidate = %self.candidates[i].describe(),
                                next = %self.candidates[i + 1].describe(),
                                error = %err,
                                "Synthesis candidate failed, advancing"
                            );
                        }
                        last_error = err;
                        CandidateState::Trying(i + 1)
                    }
                },
                terminal => terminal,
            };
        }

        match state {
            CandidateState::Success { candidate, audio } => {
                if candidate > 0 {
                    info!(
                        candidate = %self.candidates[candidate].describe(),
                        "Synthesis succeeded on a fallback candidate"
                    );
                }
                Ok((candidate, audio))
            }
            _ => Err(CastError::exhausted(self.candidates.len(), last_error.to_string())),
        }
    }

    /// Apply the retry policy to one candidate.
    async fn try_candidate(&self, candidate: &Candidate, text: &str) -> CastResult<Vec<u8>> {
        let mut last_error = CastError::transient(&candidate.voice, "no attempt made");

        for attempt in 1..=self.policy.attempts {
            debug!(
                candidate = %candidate.describe(),
                attempt,
                chars = text.chars().count(),
                "Synthesis attempt"
            );

            let outcome = tokio::time::timeout(
                self.policy.attempt_timeout,
                candidate.backend.synthesize(text, &candidate.voice, self.rate),
            )
            .await;

            let err = match outcome {
                Ok(Ok(audio)) if !audio.is_empty() => return Ok(audio),
                Ok(Ok(_)) => CastError::transient(&candidate.voice, "engine returned no audio"),
                Ok(Err(err)) => err,
                Err(elapsed) => CastError::from(elapsed),
            };

            if !err.is_retriable() {
                debug!(candidate = %candidate.describe(), error = %err, "Candidate rejected request");
                return Err(err);
            }

            if attempt < self.policy.attempts {
                let delay = self.policy.delay_after(attempt);
                debug!(candidate = %candidate.describe(), ?delay, error = %err, "Retrying after backoff");
                tokio::time::sleep(delay).await;
            }
            last_error = err;
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(800),
            attempt_timeout: Duration::from_secs(60),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(800));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1600));
        assert_eq!(policy.delay_after(3), Duration::from_millis(3200));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from(&RetryConfig {
            attempts_per_voice: 0,
            base_delay_ms: 10,
            attempt_timeout_secs: 5,
        });
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_candidate_state_terminal() {
        assert!(!CandidateState::Trying(2).is_terminal());
        assert!(CandidateState::AllExhausted.is_terminal());
        assert!(CandidateState::Success { candidate: 0, audio: vec![1] }.is_terminal());
    }

    #[test]
    fn test_adapter_requires_candidates() {
        let result = SynthesisAdapter::new(Vec::new(), SpeechRate::default(), RetryPolicy::default());
        assert!(result.is_err());
    }
}
