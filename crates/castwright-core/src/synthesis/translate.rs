//! Last-resort engine backed by a `translate_tts` endpoint.
//!
//! The endpoint only accepts short inputs, so text is cut into pieces of at
//! most [`MAX_REQUEST_CHARS`] and the returned MPEG frames are appended to
//! each other. Voice and rate are not supported; the configured language is
//! used instead.

use super::speech_api::classify_status;
use super::SpeechBackend;
use crate::config::{SecondaryEngineConfig, SpeechRate};
use crate::error::{CastError, CastResult};
use crate::segmenter::chunk_text;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Longest text accepted by one `translate_tts` request
pub const MAX_REQUEST_CHARS: usize = 200;

/// Client for a `translate_tts` endpoint
#[derive(Debug, Clone)]
pub struct TranslateTtsBackend {
    client: reqwest::Client,
    endpoint: String,
    language: String,
}

impl TranslateTtsBackend {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or language is empty, or the HTTP
    /// client cannot be built
    pub fn new(config: &SecondaryEngineConfig) -> CastResult<Self> {
        let base = config.base_url.trim().trim_end_matches('/');
        if base.is_empty() || config.language.trim().is_empty() {
            return Err(CastError::configuration(
                "secondary.base_url and secondary.language are required",
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (castwright)")
            .build()
            .map_err(|e| CastError::configuration(format!("Cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{base}/translate_tts"),
            language: config.language.trim().to_string(),
        })
    }

    async fn fetch_piece(&self, piece: &str, idx: usize, total: usize) -> CastResult<Vec<u8>> {
        let total = total.to_string();
        let idx = idx.to_string();
        let textlen = piece.chars().count().to_string();
        let query = [
            ("ie", "UTF-8"),
            ("client", "tw-ob"),
            ("tl", self.language.as_str()),
            ("q", piece),
            ("total", total.as_str()),
            ("idx", idx.as_str()),
            ("textlen", textlen.as_str()),
        ];

        let response = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &self.language, &detail));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechBackend for TranslateTtsBackend {
    fn name(&self) -> &str {
        "translate-tts"
    }

    async fn synthesize(&self, text: &str, _voice: &str, _rate: SpeechRate) -> CastResult<Vec<u8>> {
        let pieces = chunk_text(text, MAX_REQUEST_CHARS);
        if pieces.is_empty() {
            return Err(CastError::invalid_input("Nothing to synthesize"));
        }

        let mut audio = Vec::new();
        for (idx, piece) in pieces.iter().enumerate() {
            let frames = self.fetch_piece(piece, idx, pieces.len()).await?;
            if frames.is_empty() {
                return Err(CastError::transient(&self.language, format!("piece {idx} returned no audio")));
            }
            audio.extend_from_slice(&frames);
        }

        debug!(pieces = pieces.len(), bytes = audio.len(), "translate-tts returned audio");
        Ok(audio)
    }
}
