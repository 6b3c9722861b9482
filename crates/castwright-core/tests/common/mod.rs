// Shared fakes for the integration tests: a speech engine that returns bytes
// proportional to the text, and a media tool that treats files as raw byte
// streams with a fixed byte rate.

#![allow(dead_code)]

use async_trait::async_trait;
use castwright_core::{
    CastError, CastResult, Candidate, MediaTool, RetryPolicy, SpeechBackend, SpeechRate,
    SynthesisAdapter,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Speech engine returning `bytes_per_char` bytes per input character
#[derive(Debug)]
pub struct FakeSpeechBackend {
    name: String,
    bytes_per_char: usize,
    scripted: Mutex<VecDeque<CastError>>,
    always_fail: Option<CastError>,
    rejected_voices: Vec<String>,
    poison: Option<(String, usize)>,
    delay: Option<Duration>,
    marked_delay: Option<(String, Duration)>,
    extension: String,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeSpeechBackend {
    pub fn new(name: &str, bytes_per_char: usize) -> Self {
        Self {
            name: name.to_string(),
            bytes_per_char,
            scripted: Mutex::new(VecDeque::new()),
            always_fail: None,
            rejected_voices: Vec::new(),
            poison: None,
            delay: None,
            marked_delay: None,
            extension: "mp3".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next calls with these errors, in order
    pub fn with_failures(self, failures: Vec<CastError>) -> Self {
        *self.scripted.lock() = failures.into();
        self
    }

    /// Fail every call
    pub fn failing(mut self, err: CastError) -> Self {
        self.always_fail = Some(err);
        self
    }

    /// Reject a voice as unavailable
    pub fn rejecting(mut self, voice: &str) -> Self {
        self.rejected_voices.push(voice.to_string());
        self
    }

    /// Fail transiently on text of at most `max_chars` containing `marker`
    pub fn poisoned_by(mut self, marker: &str, max_chars: usize) -> Self {
        self.poison = Some((marker.to_string(), max_chars));
        self
    }

    /// Sleep before answering
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep before answering, only for text containing `marker`
    pub fn slow_on(mut self, marker: &str, delay: Duration) -> Self {
        self.marked_delay = Some((marker.to_string(), delay));
        self
    }

    /// Claim to return audio in another container
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.to_string();
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, voice: &str) -> usize {
        self.calls.lock().iter().filter(|(v, _)| v == voice).count()
    }
}

#[async_trait]
impl SpeechBackend for FakeSpeechBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    async fn synthesize(&self, text: &str, voice: &str, _rate: SpeechRate) -> CastResult<Vec<u8>> {
        self.calls.lock().push((voice.to_string(), text.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((marker, delay)) = &self.marked_delay {
            if text.contains(marker.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }
        if self.rejected_voices.iter().any(|v| v == voice) {
            return Err(CastError::voice_unavailable(voice, "HTTP 403"));
        }
        if let Some((marker, max_chars)) = &self.poison {
            if text.contains(marker.as_str()) && text.chars().count() <= *max_chars {
                return Err(CastError::transient(voice, "HTTP 500"));
            }
        }
        if let Some(err) = self.scripted.lock().pop_front() {
            return Err(err);
        }
        if let Some(err) = &self.always_fail {
            return Err(err.clone());
        }
        Ok(vec![b'a'; text.chars().count() * self.bytes_per_char])
    }
}

/// Retry policy without real waiting
pub fn fast_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        attempts,
        base_delay: Duration::from_millis(1),
        attempt_timeout: Duration::from_secs(5),
    }
}

/// Adapter over a single fake engine and voice
pub fn single_voice_adapter(backend: Arc<FakeSpeechBackend>) -> SynthesisAdapter {
    SynthesisAdapter::new(
        vec![Candidate::new(backend, "test_voice")],
        SpeechRate::default(),
        fast_policy(2),
    )
    .unwrap()
}

/// A recorded media tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum MediaCall {
    Probe(PathBuf),
    Concat(Vec<PathBuf>, PathBuf),
    Reencode {
        input: PathBuf,
        start: f64,
        duration: f64,
        output: PathBuf,
    },
}

/// Media tool over raw bytes: duration = size / `bytes_per_sec`
#[derive(Debug)]
pub struct FakeMediaTool {
    bytes_per_sec: f64,
    reencode_overhead: usize,
    fail_concat: bool,
    calls: Mutex<Vec<MediaCall>>,
}

impl FakeMediaTool {
    pub fn new(bytes_per_sec: f64) -> Self {
        Self {
            bytes_per_sec,
            reencode_overhead: 0,
            fail_concat: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Pad every re-encoded file with `bytes` of container overhead
    pub fn with_reencode_overhead(mut self, bytes: usize) -> Self {
        self.reencode_overhead = bytes;
        self
    }

    /// Make concatenation fail like a crashed encoder
    pub fn failing_concat(mut self) -> Self {
        self.fail_concat = true;
        self
    }

    pub fn calls(&self) -> Vec<MediaCall> {
        self.calls.lock().clone()
    }

    pub fn concat_calls(&self) -> Vec<(Vec<PathBuf>, PathBuf)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MediaCall::Concat(inputs, output) => Some((inputs, output)),
                _ => None,
            })
            .collect()
    }

    pub fn reencode_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MediaCall::Reencode { .. }))
            .count()
    }
}

#[async_trait]
impl MediaTool for FakeMediaTool {
    async fn probe_duration(&self, path: &Path) -> CastResult<f64> {
        self.calls.lock().push(MediaCall::Probe(path.to_path_buf()));
        let len = tokio::fs::metadata(path)
            .await
            .map_err(|e| CastError::media_tool("probe", e.to_string()))?
            .len();
        Ok(len as f64 / self.bytes_per_sec)
    }

    async fn concat_copy(&self, inputs: &[PathBuf], output: &Path) -> CastResult<()> {
        self.calls
            .lock()
            .push(MediaCall::Concat(inputs.to_vec(), output.to_path_buf()));
        if self.fail_concat {
            return Err(CastError::media_tool("concat", "encoder crashed"));
        }

        let mut joined = Vec::new();
        for input in inputs {
            let bytes = tokio::fs::read(input)
                .await
                .map_err(|e| CastError::media_tool("concat", e.to_string()))?;
            joined.extend_from_slice(&bytes);
        }
        tokio::fs::write(output, joined)
            .await
            .map_err(|e| CastError::media_tool("concat", e.to_string()))
    }

    async fn reencode_window(&self, input: &Path, start: f64, duration: f64, output: &Path) -> CastResult<()> {
        self.calls.lock().push(MediaCall::Reencode {
            input: input.to_path_buf(),
            start,
            duration,
            output: output.to_path_buf(),
        });

        let bytes = tokio::fs::read(input)
            .await
            .map_err(|e| CastError::media_tool("reencode", e.to_string()))?;
        let from = ((start * self.bytes_per_sec).round() as usize).min(bytes.len());
        let to = (((start + duration) * self.bytes_per_sec).round() as usize).min(bytes.len());

        let mut window = bytes[from..to.max(from)].to_vec();
        window.extend(std::iter::repeat(0u8).take(self.reencode_overhead));
        tokio::fs::write(output, window)
            .await
            .map_err(|e| CastError::media_tool("reencode", e.to_string()))
    }
}

/// Write a byte blob standing in for an encoded file
pub fn write_blob(path: &Path, len: usize) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, vec![b'z'; len]).unwrap();
    path.to_path_buf()
}

/// Remove all whitespace, for lossless-content comparisons
pub fn squash(text: &str) -> String {
    text.split_whitespace().collect()
}
