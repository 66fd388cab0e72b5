//! Mock speech engine for testing
//!
//! Records handle creation, recognition start/stop and every synthesis
//! request. Synthesis can be held until stopped, and stopping can be made
//! to fail.

use super::Journal;
use anyhow::Result;
use async_trait::async_trait;
use speechloop::asr::{RecognitionEvent, RecognitionSender, Recognizer};
use speechloop::engine::SpeechEngine;
use speechloop::tts::{SynthesisOutcome, Synthesizer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Switches shared by the engine and every handle it created
#[derive(Debug, Default)]
pub struct Behaviour {
    pub hold_speech: AtomicBool,
    pub fail_stop: AtomicBool,
    pub fail_synthesizers: AtomicBool,
    pub fail_recognizers: AtomicBool,
}

#[derive(Debug)]
pub struct MockEngine {
    journal: Journal,
    behaviour: Arc<Behaviour>,
    events: Mutex<Option<RecognitionSender>>,
}

impl MockEngine {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            behaviour: Arc::new(Behaviour::default()),
            events: Mutex::new(None),
        }
    }

    /// Keep every following synthesis playing until `stop_speaking`
    pub fn hold_speech(&self, hold: bool) {
        self.behaviour.hold_speech.store(hold, Ordering::SeqCst);
    }

    pub fn fail_stop(&self, fail: bool) {
        self.behaviour.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn fail_synthesizers(&self, fail: bool) {
        self.behaviour.fail_synthesizers.store(fail, Ordering::SeqCst);
    }

    pub fn fail_recognizers(&self, fail: bool) {
        self.behaviour.fail_recognizers.store(fail, Ordering::SeqCst);
    }

    /// Deliver an event as if the current recognizer produced it
    pub fn emit(&self, event: RecognitionEvent) {
        let events = self.events.lock().unwrap();
        events
            .as_ref()
            .expect("no recognizer created yet")
            .send(event)
            .unwrap();
    }
}

impl SpeechEngine for MockEngine {
    fn create_recognizer(
        &self,
        language: &str,
        events: RecognitionSender,
    ) -> Result<Arc<dyn Recognizer>> {
        if self.behaviour.fail_recognizers.load(Ordering::SeqCst) {
            anyhow::bail!("mock recognizer creation failed");
        }
        self.journal.record(format!("create_recognizer {language}"));
        *self.events.lock().unwrap() = Some(events);
        Ok(Arc::new(MockRecognizer {
            journal: self.journal.clone(),
        }))
    }

    fn create_synthesizer(&self, language: &str, voice: &str) -> Result<Arc<dyn Synthesizer>> {
        if self.behaviour.fail_synthesizers.load(Ordering::SeqCst) {
            anyhow::bail!("mock synthesizer creation failed");
        }
        self.journal
            .record(format!("create_synthesizer {language} {voice}"));
        Ok(Arc::new(MockSynthesizer {
            journal: self.journal.clone(),
            behaviour: self.behaviour.clone(),
            stopped: Notify::new(),
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[derive(Debug)]
pub struct MockRecognizer {
    journal: Journal,
}

#[async_trait]
impl Recognizer for MockRecognizer {
    fn start_continuous(&self) {
        self.journal.record("start_continuous");
    }

    async fn stop_continuous(&self) -> Result<()> {
        self.journal.record("stop_continuous");
        // Give other tasks a chance to run while the engine winds down
        tokio::task::yield_now().await;
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[derive(Debug)]
pub struct MockSynthesizer {
    journal: Journal,
    behaviour: Arc<Behaviour>,
    stopped: Notify,
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn speak_markup(&self, markup: &str) -> Result<SynthesisOutcome> {
        self.journal.record(format!("speak {markup}"));
        if self.behaviour.hold_speech.load(Ordering::SeqCst) {
            self.stopped.notified().await;
            return Ok(SynthesisOutcome::Canceled {
                reason: "CancelledByUser".to_string(),
                detail: "stopped".to_string(),
            });
        }
        Ok(SynthesisOutcome::Completed)
    }

    async fn stop_speaking(&self) -> Result<()> {
        self.journal.record("stop_speaking");
        if self.behaviour.fail_stop.load(Ordering::SeqCst) {
            anyhow::bail!("mock stop failed");
        }
        self.stopped.notify_one();
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
