//! Session Controller
//!
//! The single entry point presentation layers drive. Composes the recognition
//! session, the answer resolver and the synthesis worker, and owns response
//! mode, interrupt policy and language/voice reconfiguration.
//!
//! Interrupt policy: strictly sequential. When a new utterance arrives while
//! the session is speaking (and interrupting is enabled), the controller waits
//! for the engine to confirm the stop before resolving and speaking the next
//! answer, so two answers never play over each other.

use crate::answer::{AnswerBackend, AnswerResolver, ResponseMode};
use crate::asr::session::route_event;
use crate::asr::{
    recognition_channel, ListeningFlag, RecognitionEvent, RecognitionEvents, RecognitionOutcome,
    RecognitionSender, RecognitionSession,
};
use crate::config::{Config, DEFAULT_LANGUAGE, DEFAULT_VOICE};
use crate::engine::SpeechEngine;
use crate::tts::{build_markup, SynthesisSettings, SynthesisWorker};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

const EVENT_CAPACITY: usize = 64;

/// Where an utterance came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UtteranceOrigin {
    Recognized,
    Typed,
}

impl fmt::Display for UtteranceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UtteranceOrigin::Recognized => f.write_str("recognized"),
            UtteranceOrigin::Typed => f.write_str("typed"),
        }
    }
}

/// Read-only snapshot for rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub is_listening: bool,
    pub is_speaking: bool,
    pub response_mode: ResponseMode,
    pub interrupt_enabled: bool,
}

/// Things presentation layers may want to show
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ListeningChanged(bool),
    Heard {
        text: String,
        origin: UtteranceOrigin,
    },
    Answer(String),
    NoAnswer,
    Interrupted,
    NoMatch,
    RecognitionCanceled {
        reason: String,
        detail: String,
    },
    LanguageChanged(String),
    VoiceChanged(String),
    ResponseModeChanged(ResponseMode),
    InterruptPolicyChanged(bool),
    SettingsChanged(SynthesisSettings),
    ReconfigurationFailed(String),
}

/// Initial session parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub language: String,
    pub voice: String,
    pub response_mode: ResponseMode,
    pub interrupt_enabled: bool,
    pub settings: SynthesisSettings,
    /// Recreate the synthesizer handle after every interrupt
    pub reset_synthesizer_on_interrupt: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            response_mode: ResponseMode::Endpoint,
            interrupt_enabled: true,
            settings: SynthesisSettings::default(),
            reset_synthesizer_on_interrupt: true,
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            language: config.language.clone(),
            voice: config.voice.clone(),
            response_mode: config.response_mode,
            interrupt_enabled: config.interrupt_enabled,
            settings: config.synthesis,
            reset_synthesizer_on_interrupt: config.reset_synthesizer_on_interrupt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct VoiceSelection {
    language: String,
    voice: String,
}

pub struct SessionController {
    engine: Arc<dyn SpeechEngine>,
    // Held across start/stop and handle swaps so reconfigurations never interleave
    recognition: AsyncMutex<RecognitionSession>,
    listening: ListeningFlag,
    synthesis: SynthesisWorker,
    resolver: AnswerResolver,
    selection: Mutex<VoiceSelection>,
    settings: RwLock<SynthesisSettings>,
    response_mode: RwLock<ResponseMode>,
    interrupt_enabled: AtomicBool,
    reset_on_interrupt: bool,
    recognition_tx: RecognitionSender,
    events: broadcast::Sender<SessionEvent>,
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("engine", &self.engine.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Build a controller and the recognition event stream it must be fed from.
    ///
    /// Most callers want [`SessionController::launch`], which also spawns the pump.
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        backend: Arc<dyn AnswerBackend>,
        options: SessionOptions,
    ) -> Result<(Arc<Self>, RecognitionEvents)> {
        let (recognition_tx, recognition_rx) = recognition_channel();
        let recognizer = engine.create_recognizer(&options.language, recognition_tx.clone())?;
        let synthesizer = engine.create_synthesizer(&options.language, &options.voice)?;
        let listening = ListeningFlag::default();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        info!(
            "🧩 Session ready: engine={}, language={}, voice={}, mode={}",
            engine.name(),
            options.language,
            options.voice,
            options.response_mode
        );

        let controller = Arc::new(Self {
            recognition: AsyncMutex::new(RecognitionSession::new(recognizer, listening.clone())),
            synthesis: SynthesisWorker::new(synthesizer, listening.clone()),
            listening,
            resolver: AnswerResolver::new(backend),
            selection: Mutex::new(VoiceSelection {
                language: options.language,
                voice: options.voice,
            }),
            settings: RwLock::new(options.settings),
            response_mode: RwLock::new(options.response_mode),
            interrupt_enabled: AtomicBool::new(options.interrupt_enabled),
            reset_on_interrupt: options.reset_synthesizer_on_interrupt,
            recognition_tx,
            events,
            engine,
        });
        Ok((controller, recognition_rx))
    }

    /// Build a controller and start pumping its recognition events
    pub fn launch(
        engine: Arc<dyn SpeechEngine>,
        backend: Arc<dyn AnswerBackend>,
        options: SessionOptions,
    ) -> Result<Arc<Self>> {
        let (controller, events) = Self::new(engine, backend, options)?;
        controller.spawn_event_pump(events);
        Ok(controller)
    }

    /// Deliver recognizer events to this controller until it is dropped
    pub fn spawn_event_pump(self: &Arc<Self>, mut events: RecognitionEvents) -> JoinHandle<()> {
        let controller = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                controller.on_recognition_event(event).await;
            }
            debug!("Recognition event pump finished");
        })
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            is_listening: self.listening.is_listening(),
            is_speaking: self.synthesis.is_speaking(),
            response_mode: self.response_mode(),
            interrupt_enabled: self.interrupt_enabled(),
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.is_listening()
    }

    pub fn is_speaking(&self) -> bool {
        self.synthesis.is_speaking()
    }

    pub fn response_mode(&self) -> ResponseMode {
        *self.response_mode.read().unwrap_or_else(|p| p.into_inner())
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.interrupt_enabled.load(Ordering::SeqCst)
    }

    pub fn settings(&self) -> SynthesisSettings {
        *self.settings.read().unwrap_or_else(|p| p.into_inner())
    }

    fn selection(&self) -> VoiceSelection {
        self.selection
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn language(&self) -> String {
        self.selection().language
    }

    pub fn voice(&self) -> String {
        self.selection().voice
    }

    /// Flip the listening state; returns the new state
    pub async fn toggle_microphone(&self) -> bool {
        let recognition = self.recognition.lock().await;
        let listening = if recognition.is_listening() {
            recognition.stop().await;
            false
        } else {
            recognition.start();
            true
        };
        self.publish(SessionEvent::ListeningChanged(listening));
        listening
    }

    /// Returns `true` if listening was started by this call
    pub async fn start_listening(&self) -> bool {
        let recognition = self.recognition.lock().await;
        let started = recognition.start();
        if started {
            self.publish(SessionEvent::ListeningChanged(true));
        }
        started
    }

    /// Returns `true` if listening was stopped by this call
    pub async fn stop_listening(&self) -> bool {
        let recognition = self.recognition.lock().await;
        let stopped = recognition.stop().await;
        if stopped {
            self.publish(SessionEvent::ListeningChanged(false));
        }
        stopped
    }

    /// Handle one recognizer event
    pub async fn on_recognition_event(&self, event: RecognitionEvent) {
        match route_event(self.listening.is_listening(), event) {
            RecognitionOutcome::Utterance(text) => {
                self.handle_utterance(&text, UtteranceOrigin::Recognized)
                    .await
            }
            RecognitionOutcome::NoMatch => self.publish(SessionEvent::NoMatch),
            RecognitionOutcome::Canceled { reason, detail } => {
                self.publish(SessionEvent::RecognitionCanceled { reason, detail })
            }
            RecognitionOutcome::Ignored => {}
        }
    }

    /// Typed input; same path as recognized speech
    pub async fn submit_text(&self, text: &str) {
        self.handle_utterance(text, UtteranceOrigin::Typed).await
    }

    /// Interrupt (if enabled and speaking), resolve, then speak the answer.
    ///
    /// The interrupt completes before resolution starts.
    pub async fn handle_utterance(&self, text: &str, origin: UtteranceOrigin) {
        let text = text.trim();
        if text.is_empty() {
            debug!("Ignoring empty {} utterance", origin);
            return;
        }

        info!("📥 Input ({}): {}", origin, text);
        self.publish(SessionEvent::Heard {
            text: text.to_string(),
            origin,
        });

        if self.interrupt_enabled() && self.synthesis.is_speaking() {
            self.interrupt().await;
        }

        let mode = self.response_mode();
        match self.resolver.resolve(text, mode).await {
            Some(answer) => {
                if mode == ResponseMode::Endpoint {
                    self.publish(SessionEvent::Answer(answer.clone()));
                }
                self.speak_text(&answer);
            }
            None => {
                error!("❌ No answer for this turn");
                self.publish(SessionEvent::NoAnswer);
            }
        }
    }

    /// Speak `text` with the current settings and voice.
    ///
    /// Uses the gated path while listening and the direct path otherwise.
    /// Returns the synthesis task, or `None` if the gate closed.
    pub fn speak_text(&self, text: &str) -> Option<JoinHandle<()>> {
        let settings = self.settings();
        let selection = self.selection();
        let markup = build_markup(text, &settings, &selection.language, &selection.voice);

        if self.listening.is_listening() {
            self.synthesis.speak_gated(markup)
        } else {
            Some(self.synthesis.speak(markup))
        }
    }

    /// Stop current speech and wait for the engine. Never fails.
    pub async fn interrupt(&self) {
        self.synthesis.interrupt().await;

        if self.reset_on_interrupt {
            let selection = self.selection.lock().unwrap_or_else(|p| p.into_inner());
            match self
                .engine
                .create_synthesizer(&selection.language, &selection.voice)
            {
                Ok(synthesizer) => self.synthesis.replace_synthesizer(synthesizer),
                Err(e) => error!("❌ Failed to reset synthesizer after interrupt: {}", e),
            }
        }

        self.publish(SessionEvent::Interrupted);
    }

    /// Replace all prosody settings; applies from the next synthesis
    pub fn set_synthesis_params(&self, settings: SynthesisSettings) {
        *self.settings.write().unwrap_or_else(|p| p.into_inner()) = settings;
        info!("🎚️ Set synthesis params: {}", settings);
        self.publish(SessionEvent::SettingsChanged(settings));
    }

    pub fn set_response_mode(&self, mode: ResponseMode) {
        *self.response_mode.write().unwrap_or_else(|p| p.into_inner()) = mode;
        info!("🔀 Response mode: {}", mode);
        self.publish(SessionEvent::ResponseModeChanged(mode));
    }

    pub fn set_interrupt_enabled(&self, enabled: bool) {
        self.interrupt_enabled.store(enabled, Ordering::SeqCst);
        info!("✋ Interrupting allowed: {}", enabled);
        self.publish(SessionEvent::InterruptPolicyChanged(enabled));
    }

    /// Change the recognition language. Recreates both engine handles and
    /// restores the previous listening state.
    pub async fn set_language(&self, language: &str) {
        let mut recognition = self.recognition.lock().await;
        let current = self.selection();
        if current.language == language {
            info!("Language already set to {}. No change made.", language);
            return;
        }

        let was_listening = recognition.is_listening();
        if was_listening {
            recognition.stop().await;
        }

        let next = VoiceSelection {
            language: language.to_string(),
            voice: current.voice,
        };
        match self.rebuild_handles(&mut recognition, next, true) {
            Ok(()) => {
                info!("🌐 Language changed to {}", language);
                self.publish(SessionEvent::LanguageChanged(language.to_string()));
            }
            Err(e) => {
                error!("❌ Failed to change language to {}: {}", language, e);
                self.publish(SessionEvent::ReconfigurationFailed(e.to_string()));
            }
        }

        if was_listening {
            recognition.start();
        }
    }

    /// Change the synthesis voice. Recreates the synthesizer handle and
    /// restores the previous listening state.
    pub async fn set_voice(&self, voice: &str) {
        let mut recognition = self.recognition.lock().await;
        let current = self.selection();
        if current.voice == voice {
            info!("Voice already set to {}. No change made.", voice);
            return;
        }

        let was_listening = recognition.is_listening();
        if was_listening {
            recognition.stop().await;
        }

        let next = VoiceSelection {
            language: current.language,
            voice: voice.to_string(),
        };
        match self.rebuild_handles(&mut recognition, next, false) {
            Ok(()) => {
                info!("🗣️ Voice changed to {}", voice);
                self.publish(SessionEvent::VoiceChanged(voice.to_string()));
            }
            Err(e) => {
                error!("❌ Failed to change voice to {}: {}", voice, e);
                self.publish(SessionEvent::ReconfigurationFailed(e.to_string()));
            }
        }

        if was_listening {
            recognition.start();
        }
    }

    /// Create every new handle first, then install them and the new selection.
    /// On failure nothing changes.
    fn rebuild_handles(
        &self,
        recognition: &mut RecognitionSession,
        next: VoiceSelection,
        recreate_recognizer: bool,
    ) -> Result<()> {
        let mut selection = self.selection.lock().unwrap_or_else(|p| p.into_inner());

        let synthesizer = self
            .engine
            .create_synthesizer(&next.language, &next.voice)?;
        let recognizer = if recreate_recognizer {
            Some(
                self.engine
                    .create_recognizer(&next.language, self.recognition_tx.clone())?,
            )
        } else {
            None
        };

        if let Some(recognizer) = recognizer {
            recognition.replace_recognizer(recognizer)?;
        }
        self.synthesis.replace_synthesizer(synthesizer);
        *selection = next;
        Ok(())
    }
}
