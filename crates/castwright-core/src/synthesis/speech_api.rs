//! OpenAI-compatible `/v1/audio/speech` client.
//!
//! This is the primary engine: a local or hosted speech server that takes a
//! JSON request and answers with the encoded audio body.

use super::SpeechBackend;
use crate::config::{SpeechApiConfig, SpeechRate};
use crate::error::{CastError, CastResult};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
    response_format: &'a str,
}

/// Client for an OpenAI-compatible speech endpoint
#[derive(Debug, Clone)]
pub struct SpeechApiBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    response_format: String,
}

impl SpeechApiBackend {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is empty or the HTTP client cannot be built
    pub fn new(config: &SpeechApiConfig) -> CastResult<Self> {
        let base = config.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(CastError::configuration("speech_api.base_url cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CastError::configuration(format!("Cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{base}/v1/audio/speech"),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            response_format: config.response_format.clone(),
        })
    }

    /// Full request URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Map an HTTP failure to the synthesis error taxonomy.
///
/// Request-shape and authorization failures will not improve on retry, so
/// they mark the voice unavailable; throttling and server errors are
/// transient.
pub(crate) fn classify_status(status: StatusCode, voice: &str, detail: &str) -> CastError {
    let detail = detail.trim();
    let message = if detail.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", detail.chars().take(200).collect::<String>())
    };

    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::NOT_FOUND
        | StatusCode::UNPROCESSABLE_ENTITY => CastError::voice_unavailable(voice, message),
        _ => CastError::transient(voice, message),
    }
}

#[async_trait]
impl SpeechBackend for SpeechApiBackend {
    fn name(&self) -> &str {
        "speech-api"
    }

    fn extension(&self) -> &str {
        &self.response_format
    }

    async fn synthesize(&self, text: &str, voice: &str, rate: SpeechRate) -> CastResult<Vec<u8>> {
        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice,
            speed: rate.multiplier(),
            response_format: &self.response_format,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, voice, &detail));
        }

        let audio = response.bytes().await?;

        if audio.is_empty() {
            return Err(CastError::transient(voice, "empty audio body"));
        }

        debug!(voice, bytes = audio.len(), "speech-api returned audio");
        Ok(audio.to_vec())
    }
}
