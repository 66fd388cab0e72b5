//! Recognition Session
//!
//! Owns the Stopped/Listening state of continuous recognition and decides which
//! recognizer events become utterances.

use super::{RecognitionEvent, RecognitionReason, Recognizer};
use crate::error::{SpeechError, SpeechResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shared view of the listening state
#[derive(Debug, Clone, Default)]
pub struct ListeningFlag(Arc<AtomicBool>);

impl ListeningFlag {
    pub fn is_listening(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Set the state, returning the previous one
    fn swap(&self, listening: bool) -> bool {
        self.0.swap(listening, Ordering::SeqCst)
    }
}

/// What a recognizer event means for the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutcome {
    /// Non-empty trimmed text to hand to the controller
    Utterance(String),
    /// Audio was heard but not transcribed
    NoMatch,
    /// The engine canceled recognition
    Canceled { reason: String, detail: String },
    /// Nothing to do (stopped session or empty transcript)
    Ignored,
}

/// Classify an event given the current listening state
pub fn route_event(listening: bool, event: RecognitionEvent) -> RecognitionOutcome {
    match event {
        RecognitionEvent::Recognized { text, reason } => {
            if !listening {
                info!("🔇 Recognition result arrived while the microphone is off, ignoring");
                return RecognitionOutcome::Ignored;
            }
            match reason {
                RecognitionReason::NoMatch => {
                    error!("❓ Speech could not be recognized (NoMatch)");
                    RecognitionOutcome::NoMatch
                }
                RecognitionReason::RecognizedSpeech => {
                    let text = text.trim();
                    if text.is_empty() {
                        debug!("Empty recognition result, ignoring");
                        return RecognitionOutcome::Ignored;
                    }
                    info!("📝 Recognized: '{}'", text);
                    RecognitionOutcome::Utterance(text.to_string())
                }
            }
        }
        RecognitionEvent::Canceled { reason, detail } => {
            error!("❌ Recognition canceled: {}. Error: {}", reason, detail);
            RecognitionOutcome::Canceled { reason, detail }
        }
    }
}

/// Continuous listening on top of one recognizer handle
#[derive(Debug)]
pub struct RecognitionSession {
    recognizer: Arc<dyn Recognizer>,
    listening: ListeningFlag,
}

impl RecognitionSession {
    pub fn new(recognizer: Arc<dyn Recognizer>, listening: ListeningFlag) -> Self {
        Self {
            recognizer,
            listening,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.is_listening()
    }

    /// Stopped → Listening. Returns `false` (and touches nothing) if already listening.
    pub fn start(&self) -> bool {
        if self.listening.swap(true) {
            debug!("Recognition already running");
            return false;
        }
        self.recognizer.start_continuous();
        info!("🎙️ Continuous recognition started ({})", self.recognizer.name());
        true
    }

    /// Listening → Stopped, waiting for the engine to quiesce. Returns `false`
    /// (and touches nothing) if already stopped.
    ///
    /// The state flips before the engine call so results produced while the
    /// engine winds down are dropped.
    pub async fn stop(&self) -> bool {
        if !self.listening.swap(false) {
            debug!("Recognition already stopped");
            return false;
        }
        match self.recognizer.stop_continuous().await {
            Ok(()) => info!("🔇 Continuous recognition stopped"),
            Err(e) => error!("❌ Failed to stop recognition cleanly: {}", e),
        }
        true
    }

    /// Swap the recognizer handle. Only allowed while stopped.
    pub fn replace_recognizer(&mut self, recognizer: Arc<dyn Recognizer>) -> SpeechResult<()> {
        if self.is_listening() {
            return Err(SpeechError::Engine(
                "cannot replace the recognizer while listening".to_string(),
            ));
        }
        debug!("🔁 Recognizer handle replaced ({})", recognizer.name());
        self.recognizer = recognizer;
        Ok(())
    }
}
