//! TTS (Text-to-Speech) Module
//!
//! The synthesizer boundary, the SSML builder and the worker that runs
//! synthesis without blocking the session.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

pub mod azure;
pub mod markup;
pub mod worker;

pub use markup::{build_markup, EmphasisLevel, SynthesisSettings, Volume};
pub use worker::SynthesisWorker;

/// How a single synthesis request settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// Audio was fully produced and played
    Completed,
    /// The engine canceled the request
    Canceled { reason: String, detail: String },
}

impl fmt::Display for SynthesisOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesisOutcome::Completed => f.write_str("completed"),
            SynthesisOutcome::Canceled { reason, detail } => {
                write!(f, "canceled ({reason}): {detail}")
            }
        }
    }
}

/// Trait for synthesis engines
#[async_trait]
pub trait Synthesizer: Send + Sync + std::fmt::Debug {
    /// Synthesize and play an SSML document, returning once playback settles
    async fn speak_markup(&self, markup: &str) -> Result<SynthesisOutcome>;

    /// Stop any in-progress synthesis, returning once the engine confirms
    async fn stop_speaking(&self) -> Result<()>;

    /// Get the engine name
    fn name(&self) -> &str;
}
