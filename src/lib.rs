//! speechloop Library
//!
//! Core modules for the speechloop voice conversation loop: continuous
//! recognition, answer resolution and interruptible synthesis.

pub mod answer;
pub mod asr;
pub mod audio;
pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod session;
pub mod tts;

pub use answer::{AnswerBackend, AnswerResolver, EndpointClient, ResponseMode};
pub use engine::{AzureSpeechEngine, SpeechEngine};
pub use error::{SpeechError, SpeechResult};
pub use session::{SessionController, SessionEvent, SessionOptions, SessionState, UtteranceOrigin};
