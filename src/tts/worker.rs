//! Synthesis Worker
//!
//! Runs one synthesis request at a time on a spawned task and tracks whether
//! the session is currently speaking.

use super::{SynthesisOutcome, Synthesizer};
use crate::asr::ListeningFlag;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Speaking flag with ticketed ownership.
///
/// Each synthesis takes a ticket; finishing only clears the flag when that
/// ticket is still the active one. `0` means idle.
#[derive(Debug, Default)]
pub struct SpeakingFlag {
    active: AtomicU64,
    issued: AtomicU64,
}

impl SpeakingFlag {
    /// Mark a new synthesis as the owner of the flag
    pub fn begin(&self) -> u64 {
        let ticket = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.active.store(ticket, Ordering::SeqCst);
        ticket
    }

    /// Release the flag if `ticket` still owns it
    pub fn finish(&self, ticket: u64) -> bool {
        self.active
            .compare_exchange(ticket, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Force the flag to idle regardless of owner
    pub fn clear(&self) {
        self.active.store(0, Ordering::SeqCst);
    }

    pub fn is_speaking(&self) -> bool {
        self.active.load(Ordering::SeqCst) != 0
    }
}

/// Releases the speaking flag on every exit path of a synthesis task
struct SpeakingGuard {
    flag: Arc<SpeakingFlag>,
    ticket: u64,
}

impl Drop for SpeakingGuard {
    fn drop(&mut self) {
        if !self.flag.finish(self.ticket) {
            debug!("Synthesis #{} finished after losing the speaking flag", self.ticket);
        }
    }
}

/// Non-blocking front end to the current synthesizer handle
pub struct SynthesisWorker {
    synthesizer: RwLock<Arc<dyn Synthesizer>>,
    speaking: Arc<SpeakingFlag>,
    listening: ListeningFlag,
}

impl SynthesisWorker {
    pub fn new(synthesizer: Arc<dyn Synthesizer>, listening: ListeningFlag) -> Self {
        Self {
            synthesizer: RwLock::new(synthesizer),
            speaking: Arc::new(SpeakingFlag::default()),
            listening,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.is_speaking()
    }

    /// Current synthesizer handle
    pub fn synthesizer(&self) -> Arc<dyn Synthesizer> {
        self.synthesizer
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Swap in a freshly created synthesizer. In-flight synthesis keeps the old one.
    pub fn replace_synthesizer(&self, synthesizer: Arc<dyn Synthesizer>) {
        let mut slot = self
            .synthesizer
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        debug!("🔁 Synthesizer handle replaced ({})", synthesizer.name());
        *slot = synthesizer;
    }

    /// Speak only while the microphone is on
    pub fn speak_gated(&self, markup: String) -> Option<JoinHandle<()>> {
        if !self.listening.is_listening() {
            info!("🔇 Microphone is off, gated synthesis skipped");
            return None;
        }
        Some(self.speak(markup))
    }

    /// Speak unconditionally. Returns immediately; completion is observable
    /// through [`SynthesisWorker::is_speaking`].
    pub fn speak(&self, markup: String) -> JoinHandle<()> {
        let synthesizer = self.synthesizer();
        let ticket = self.speaking.begin();
        let guard = SpeakingGuard {
            flag: self.speaking.clone(),
            ticket,
        };

        tokio::spawn(async move {
            let _guard = guard;
            debug!("📢 Synthesis #{} started on {}", ticket, synthesizer.name());
            match synthesizer.speak_markup(&markup).await {
                Ok(SynthesisOutcome::Completed) => {
                    info!("✅ Synthesis #{} completed", ticket);
                }
                Ok(SynthesisOutcome::Canceled { reason, detail }) => {
                    error!("❌ Synthesis #{} canceled: {} - {}", ticket, reason, detail);
                }
                Err(e) => {
                    error!("❌ Synthesis #{} failed: {}", ticket, e);
                }
            }
        })
    }

    /// Stop the current synthesis and wait for the engine to confirm.
    ///
    /// Never fails: engine errors and panics are logged and the speaking flag
    /// is forced to idle.
    pub async fn interrupt(&self) {
        let synthesizer = self.synthesizer();
        match AssertUnwindSafe(synthesizer.stop_speaking())
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => info!("🛑 Speech interrupted"),
            Ok(Err(e)) => error!("❌ Failed to interrupt speech: {}", e),
            Err(_) => error!("❌ Synthesizer panicked while stopping"),
        }
        self.speaking.clear();
    }
}
