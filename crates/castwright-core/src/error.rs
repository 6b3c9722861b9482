//! Error types for the Castwright synthesis and assembly engine.

/// Result type alias for Castwright operations
pub type CastResult<T> = Result<T, CastError>;

/// Main error type for Castwright operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CastError {
    /// A single synthesis attempt failed in a way that may succeed on retry
    #[error("Transient synthesis failure on voice '{voice}': {message}")]
    TransientSynthesis {
        /// Voice the attempt was made with
        voice: String,
        /// Error message describing the failure
        message: String,
    },

    /// A voice or engine rejects requests consistently
    #[error("Voice '{voice}' unavailable: {message}")]
    VoiceUnavailable {
        /// The voice that was rejected
        voice: String,
        /// Error message describing the rejection
        message: String,
    },

    /// No candidate voice or engine produced audio for a unit
    #[error("All synthesis candidates exhausted after {candidates} candidate(s): {last_error}")]
    AllEnginesExhausted {
        /// Number of candidates that were tried
        candidates: usize,
        /// Last error observed before giving up
        last_error: String,
    },

    /// Episode assembly cannot proceed
    #[error("Assembly failed: {message}")]
    AssemblyFatal {
        /// Error message describing the assembly failure
        message: String,
    },

    /// External media tool invocation failed
    #[error("Media tool '{operation}' failed: {message}")]
    MediaTool {
        /// Which boundary operation failed (probe, concat, reencode)
        operation: String,
        /// Error message, usually the tool's stderr
        message: String,
    },

    /// File I/O error
    #[error("File I/O error: {message}")]
    FileError {
        /// Error message describing the file operation failure
        message: String,
    },

    /// Invalid input error
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message describing the invalid input
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Network error talking to a speech engine
    #[error("Network error: {message}")]
    NetworkError {
        /// Error message describing the network issue
        message: String,
    },

    /// Timeout error
    #[error("Operation timed out: {message}")]
    TimeoutError {
        /// Error message describing the timeout
        message: String,
    },
}

impl CastError {
    /// Create a new transient synthesis error
    #[must_use]
    pub fn transient<V: Into<String>, S: Into<String>>(voice: V, message: S) -> Self {
        Self::TransientSynthesis {
            voice: voice.into(),
            message: message.into(),
        }
    }

    /// Create a new voice unavailable error
    #[must_use]
    pub fn voice_unavailable<V: Into<String>, S: Into<String>>(voice: V, message: S) -> Self {
        Self::VoiceUnavailable {
            voice: voice.into(),
            message: message.into(),
        }
    }

    /// Create a new exhausted-candidates error
    #[must_use]
    pub fn exhausted<S: Into<String>>(candidates: usize, last_error: S) -> Self {
        Self::AllEnginesExhausted {
            candidates,
            last_error: last_error.into(),
        }
    }

    /// Create a new fatal assembly error
    #[must_use]
    pub fn assembly<S: Into<String>>(message: S) -> Self {
        Self::AssemblyFatal {
            message: message.into(),
        }
    }

    /// Create a new media tool error
    #[must_use]
    pub fn media_tool<O: Into<String>, S: Into<String>>(operation: O, message: S) -> Self {
        Self::MediaTool {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a new file error
    #[must_use]
    pub fn file<S: Into<String>>(message: S) -> Self {
        Self::FileError {
            message: message.into(),
        }
    }

    /// Create a new invalid input error
    #[must_use]
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    #[must_use]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a new network error
    #[must_use]
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    #[must_use]
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::TimeoutError {
            message: message.into(),
        }
    }

    /// Check if this error is worth another attempt on the same candidate
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::TransientSynthesis { .. } | Self::NetworkError { .. } | Self::TimeoutError { .. }
        )
    }

    /// Check if this error aborts the whole run
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AssemblyFatal { .. } | Self::MediaTool { .. } | Self::ConfigurationError { .. }
        )
    }

    /// Get the error category for logging and run reports
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::TransientSynthesis { .. } => "transient_synthesis",
            Self::VoiceUnavailable { .. } => "voice_unavailable",
            Self::AllEnginesExhausted { .. } => "all_engines_exhausted",
            Self::AssemblyFatal { .. } => "assembly",
            Self::MediaTool { .. } => "media_tool",
            Self::FileError { .. } => "file",
            Self::InvalidInput { .. } => "input",
            Self::ConfigurationError { .. } => "configuration",
            Self::NetworkError { .. } => "network",
            Self::TimeoutError { .. } => "timeout",
        }
    }
}

// Convert from common error types
impl From<std::io::Error> for CastError {
    fn from(err: std::io::Error) -> Self {
        Self::file(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for CastError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::timeout(format!("Operation timed out: {err}"))
    }
}

impl From<serde_json::Error> for CastError {
    fn from(err: serde_json::Error) -> Self {
        Self::file(format!("JSON serialization error: {err}"))
    }
}

impl From<toml::de::Error> for CastError {
    fn from(err: toml::de::Error) -> Self {
        Self::configuration(format!("Invalid TOML: {err}"))
    }
}

impl From<hound::Error> for CastError {
    fn from(err: hound::Error) -> Self {
        Self::file(format!("WAV error: {err}"))
    }
}

impl From<reqwest::Error> for CastError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}
