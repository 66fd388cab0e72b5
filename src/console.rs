//! Terminal console
//!
//! Line-oriented presentation layer over a [`SessionController`]. Slash
//! commands change session settings; any other line is spoken to the session
//! as typed input.

use crate::answer::ResponseMode;
use crate::error::{SpeechError, SpeechResult};
use crate::session::{SessionController, SessionEvent, SessionState};
use crate::tts::markup::signed_percent;
use crate::tts::{EmphasisLevel, SynthesisSettings, Volume};
use anyhow::Result;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub const RATE_RANGE: RangeInclusive<i32> = -50..=50;
pub const PITCH_RANGE: RangeInclusive<i32> = -20..=20;

const HELP: &str = "\
Commands:
  /mic                      toggle the microphone
  /lang <id>                change recognition language (e.g. ru-RU, kk-KZ)
  /voice <id>               change synthesis voice
  /voices                   list voices for the current language
  /rate <-50..50>           speaking rate offset in percent
  /pitch <-20..20>          pitch offset in percent
  /volume <soft|medium|loud>
  /emphasis <none|reduced|moderate|strong>
  /accent <none|reduced|moderate|strong>
  /mode <endpoint|repeat>   where answers come from
  /interrupt <on|off>       allow interrupting the bot
  /stop                     stop speaking now
  /status                   show session state
  /help                     show this help
  /quit                     exit
Anything else is sent as a typed question.";

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    ToggleMicrophone,
    Language(String),
    Voice(String),
    Voices,
    Rate(i32),
    Pitch(i32),
    Volume(Volume),
    Emphasis(EmphasisLevel),
    Accent(EmphasisLevel),
    Mode(ResponseMode),
    Interrupt(bool),
    Stop,
    Status,
    Help,
    Quit,
    Say(String),
    Empty,
}

fn required<'a>(command: &str, arg: Option<&'a str>) -> SpeechResult<&'a str> {
    arg.ok_or_else(|| SpeechError::Parse(format!("{command} needs an argument")))
}

fn percent_in(command: &str, arg: Option<&str>, range: RangeInclusive<i32>) -> SpeechResult<i32> {
    let raw = required(command, arg)?;
    let value: i32 = raw
        .trim_end_matches('%')
        .parse()
        .map_err(|_| SpeechError::Parse(format!("{command}: '{raw}' is not a number")))?;
    if !range.contains(&value) {
        return Err(SpeechError::Parse(format!(
            "{command}: {value} is outside {}..{}",
            range.start(),
            range.end()
        )));
    }
    Ok(value)
}

fn on_off(command: &str, arg: Option<&str>) -> SpeechResult<bool> {
    match required(command, arg)?.to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(SpeechError::Parse(format!(
            "{command}: expected on or off, got '{other}'"
        ))),
    }
}

/// Parse one input line
pub fn parse_line(line: &str) -> SpeechResult<ConsoleCommand> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleCommand::Empty);
    }
    if !line.starts_with('/') {
        return Ok(ConsoleCommand::Say(line.to_string()));
    }

    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let arg = parts.next();

    let parsed = match command {
        "/mic" => ConsoleCommand::ToggleMicrophone,
        "/lang" => ConsoleCommand::Language(required(command, arg)?.to_string()),
        "/voice" => ConsoleCommand::Voice(required(command, arg)?.to_string()),
        "/voices" => ConsoleCommand::Voices,
        "/rate" => ConsoleCommand::Rate(percent_in(command, arg, RATE_RANGE)?),
        "/pitch" => ConsoleCommand::Pitch(percent_in(command, arg, PITCH_RANGE)?),
        "/volume" => ConsoleCommand::Volume(required(command, arg)?.parse()?),
        "/emphasis" => ConsoleCommand::Emphasis(required(command, arg)?.parse()?),
        "/accent" => ConsoleCommand::Accent(required(command, arg)?.parse()?),
        "/mode" => ConsoleCommand::Mode(required(command, arg)?.parse()?),
        "/interrupt" => ConsoleCommand::Interrupt(on_off(command, arg)?),
        "/stop" => ConsoleCommand::Stop,
        "/status" => ConsoleCommand::Status,
        "/help" | "/?" => ConsoleCommand::Help,
        "/quit" | "/exit" => ConsoleCommand::Quit,
        other => {
            return Err(SpeechError::Parse(format!(
                "unknown command {other} (try /help)"
            )))
        }
    };
    Ok(parsed)
}

/// Human-readable line for a session event
pub fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::ListeningChanged(true) => "🎙️ Microphone on".to_string(),
        SessionEvent::ListeningChanged(false) => "🔇 Microphone off".to_string(),
        SessionEvent::Heard { text, origin } => format!("👤 You ({origin}): {text}"),
        SessionEvent::Answer(text) => format!("🤖 Bot: {text}"),
        SessionEvent::NoAnswer => "❌ No answer this time".to_string(),
        SessionEvent::Interrupted => "🛑 Interrupted".to_string(),
        SessionEvent::NoMatch => "❓ Speech not recognized".to_string(),
        SessionEvent::RecognitionCanceled { reason, detail } => {
            format!("❌ Recognition canceled: {reason} {detail}")
        }
        SessionEvent::LanguageChanged(language) => format!("🌐 Language: {language}"),
        SessionEvent::VoiceChanged(voice) => format!("🗣️ Voice: {voice}"),
        SessionEvent::ResponseModeChanged(mode) => format!("🔀 Mode: {mode}"),
        SessionEvent::InterruptPolicyChanged(enabled) => {
            format!("✋ Interrupting: {}", if *enabled { "on" } else { "off" })
        }
        SessionEvent::SettingsChanged(settings) => format!("🎚️ {settings}"),
        SessionEvent::ReconfigurationFailed(reason) => {
            format!("⚠️ Change failed, keeping previous setup: {reason}")
        }
    }
}

fn describe_state(state: &SessionState, language: &str, voice: &str, settings: &SynthesisSettings) -> String {
    format!(
        "mic={} speaking={} mode={} interrupt={} language={} voice={} rate={} pitch={} volume={} emphasis={} accent={}",
        if state.is_listening { "on" } else { "off" },
        state.is_speaking,
        state.response_mode,
        if state.interrupt_enabled { "on" } else { "off" },
        language,
        voice,
        signed_percent(settings.rate),
        signed_percent(settings.pitch),
        settings.volume,
        settings.emphasis,
        settings.accent
    )
}

fn print_line(line: &str) {
    println!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), line);
}

/// Interactive console bound to one session
pub struct Console {
    controller: Arc<SessionController>,
    voices: BTreeMap<String, Vec<String>>,
}

impl Console {
    pub fn new(controller: Arc<SessionController>, voices: BTreeMap<String, Vec<String>>) -> Self {
        Self { controller, voices }
    }

    /// Apply one change on top of the controller's current settings and push
    /// the whole set
    fn push_settings(&self, update: impl FnOnce(&mut SynthesisSettings)) {
        let mut settings = self.controller.settings();
        update(&mut settings);
        self.controller.set_synthesis_params(settings);
    }

    /// Run one command; returns text to show directly (events are shown by the printer)
    pub async fn execute(&self, command: ConsoleCommand) -> Option<String> {
        match command {
            ConsoleCommand::Empty | ConsoleCommand::Quit => None,
            ConsoleCommand::Say(text) => {
                self.controller.submit_text(&text).await;
                None
            }
            ConsoleCommand::ToggleMicrophone => {
                self.controller.toggle_microphone().await;
                None
            }
            ConsoleCommand::Language(language) => {
                let previous = self.controller.language();
                self.controller.set_language(&language).await;
                if previous != language && self.controller.language() == language {
                    if let Some(voice) = self.voices.get(&language).and_then(|v| v.first()) {
                        self.controller.set_voice(voice).await;
                    }
                }
                None
            }
            ConsoleCommand::Voice(voice) => {
                self.controller.set_voice(&voice).await;
                None
            }
            ConsoleCommand::Voices => {
                let language = self.controller.language();
                let current = self.controller.voice();
                let voices = self.voices.get(&language).cloned().unwrap_or_default();
                if voices.is_empty() {
                    return Some(format!("No voices configured for {language}"));
                }
                let listing = voices
                    .iter()
                    .map(|v| {
                        let marker = if *v == current { "*" } else { " " };
                        format!("{marker} {v}")
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                Some(format!("Voices for {language}:\n{listing}"))
            }
            ConsoleCommand::Rate(rate) => {
                self.push_settings(|s| s.rate = rate);
                None
            }
            ConsoleCommand::Pitch(pitch) => {
                self.push_settings(|s| s.pitch = pitch);
                None
            }
            ConsoleCommand::Volume(volume) => {
                self.push_settings(|s| s.volume = volume);
                None
            }
            ConsoleCommand::Emphasis(level) => {
                self.push_settings(|s| s.emphasis = level);
                None
            }
            ConsoleCommand::Accent(level) => {
                self.push_settings(|s| s.accent = level);
                None
            }
            ConsoleCommand::Mode(mode) => {
                self.controller.set_response_mode(mode);
                None
            }
            ConsoleCommand::Interrupt(enabled) => {
                self.controller.set_interrupt_enabled(enabled);
                None
            }
            ConsoleCommand::Stop => {
                self.controller.interrupt().await;
                None
            }
            ConsoleCommand::Status => Some(describe_state(
                &self.controller.state(),
                &self.controller.language(),
                &self.controller.voice(),
                &self.controller.settings(),
            )),
            ConsoleCommand::Help => Some(HELP.to_string()),
        }
    }

    /// Print session events until the controller goes away
    pub fn spawn_event_printer(&self) -> JoinHandle<()> {
        let mut events = self.controller.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => print_line(&describe(&event)),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!("Console missed {} session events", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Read commands from stdin until `/quit` or end of input
    pub async fn run(self) -> Result<()> {
        let printer = self.spawn_event_printer();
        println!("{HELP}");
        info!("⌨️ Console ready");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let command = match parse_line(&line) {
                Ok(command) => command,
                Err(e) => {
                    print_line(&format!("⚠️ {e}"));
                    continue;
                }
            };
            if command == ConsoleCommand::Quit {
                break;
            }
            if let Some(reply) = self.execute(command).await {
                println!("{reply}");
            }
        }

        printer.abort();
        info!("👋 Console closed");
        Ok(())
    }
}
