//! ASR (Automatic Speech Recognition) Module
//!
//! The recognizer boundary, the events it emits and the listening session
//! built on top of it.

pub mod azure;
pub mod session;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

pub use azure::AzureRecognizer;
pub use session::{ListeningFlag, RecognitionOutcome, RecognitionSession};

/// Why the engine produced a recognition result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionReason {
    /// Speech was transcribed
    RecognizedSpeech,
    /// Audio was heard but could not be transcribed
    NoMatch,
}

/// Event delivered asynchronously by a recognizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Recognized {
        text: String,
        reason: RecognitionReason,
    },
    Canceled {
        reason: String,
        detail: String,
    },
}

impl RecognitionEvent {
    pub fn recognized(text: impl Into<String>) -> Self {
        RecognitionEvent::Recognized {
            text: text.into(),
            reason: RecognitionReason::RecognizedSpeech,
        }
    }

    pub fn no_match() -> Self {
        RecognitionEvent::Recognized {
            text: String::new(),
            reason: RecognitionReason::NoMatch,
        }
    }

    pub fn canceled(reason: impl Into<String>, detail: impl Into<String>) -> Self {
        RecognitionEvent::Canceled {
            reason: reason.into(),
            detail: detail.into(),
        }
    }
}

/// Subscription point recognizers publish into
pub type RecognitionSender = mpsc::UnboundedSender<RecognitionEvent>;
pub type RecognitionEvents = mpsc::UnboundedReceiver<RecognitionEvent>;

/// Create the channel a session's recognizers report through
pub fn recognition_channel() -> (RecognitionSender, RecognitionEvents) {
    mpsc::unbounded_channel()
}

/// Trait for continuous recognition engines
#[async_trait]
pub trait Recognizer: Send + Sync + std::fmt::Debug {
    /// Begin continuous recognition. Returns without waiting for the engine;
    /// start-up failures arrive later as [`RecognitionEvent::Canceled`].
    fn start_continuous(&self);

    /// Stop continuous recognition, returning once the engine is quiesced
    async fn stop_continuous(&self) -> Result<()>;

    /// Get the engine name
    fn name(&self) -> &str;
}
