//! Speechloop Error Types
//!
//! Typed failures raised by the engine adapters, the answer backend and the
//! control socket. The session controller never propagates these to its caller;
//! they are logged and turned into "no action".

use thiserror::Error;

/// Central error type for Speechloop
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Speech engine error: {0}")]
    Engine(String),

    #[error("Answer backend returned HTTP {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Answer backend returned no answer")]
    EmptyAnswer,

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Invalid value: {0}")]
    Parse(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Speechloop operations
pub type SpeechResult<T> = Result<T, SpeechError>;

impl SpeechError {
    /// True for failures reported by the answer backend itself rather than the
    /// transport (non-200 status or an empty answer).
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, SpeechError::Backend { .. } | SpeechError::EmptyAnswer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = SpeechError::Backend {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Answer backend returned HTTP 500: boom");
        assert!(err.is_backend_failure());
        assert!(!SpeechError::Config("x".into()).is_backend_failure());
    }
}
