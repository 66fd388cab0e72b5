use crate::answer::{default_seed, ChatTurn, ResponseMode};
use crate::audio::SegmenterConfig;
use crate::error::{SpeechError, SpeechResult};
use crate::tts::SynthesisSettings;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_LANGUAGE: &str = "ru-RU";
pub const DEFAULT_VOICE: &str = "ru-RU-DmitryNeural";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Speech
    pub language: String,
    pub voice: String,
    /// Voices offered per recognition language
    pub voices: BTreeMap<String, Vec<String>>,
    pub synthesis: SynthesisSettings,
    pub response_mode: ResponseMode,
    pub interrupt_enabled: bool,
    pub reset_synthesizer_on_interrupt: bool,

    // Azure
    pub azure_key: String,
    pub azure_region: String,
    pub azure_timeout_secs: u64,

    // Answer endpoint
    pub answer_url: String,
    pub answer_token: String,
    pub answer_timeout_secs: u64,
    pub answer_seed: Vec<ChatTurn>,

    // Capture
    pub input_device: Option<usize>,
    pub segmenter: SegmenterConfig,

    // Meta
    pub log_level: String,
    pub ipc_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            voices: BTreeMap::from([
                (
                    "ru-RU".to_string(),
                    vec![
                        "ru-RU-DmitryNeural".to_string(),
                        "ru-RU-SvetlanaNeural".to_string(),
                        "ru-RU-DariyaNeural".to_string(),
                    ],
                ),
                (
                    "kk-KZ".to_string(),
                    vec![
                        "kk-KZ-AigulNeural".to_string(),
                        "kk-KZ-DauletNeural".to_string(),
                    ],
                ),
            ]),
            synthesis: SynthesisSettings::default(),
            response_mode: ResponseMode::Endpoint,
            interrupt_enabled: true,
            reset_synthesizer_on_interrupt: true,
            azure_key: String::new(),
            azure_region: String::new(),
            azure_timeout_secs: 30,
            answer_url: String::new(),
            answer_token: String::new(),
            answer_timeout_secs: 30,
            answer_seed: default_seed(),
            input_device: None,
            segmenter: SegmenterConfig::default(),
            log_level: "INFO".to_string(),
            ipc_enabled: true,
        }
    }
}

impl Config {
    /// Load config from the default location, apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&config_path())?;
        config.apply_env();
        Ok(config)
    }

    /// Load config from `path`, falling back to defaults if it is missing or corrupt
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                // Graceful degradation: log warning and use defaults
                tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                // Backup corrupt file for debugging
                let backup_path = path.with_extension("json.corrupt");
                let _ = std::fs::rename(path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Secrets and endpoints may come from the environment instead of the file
    pub fn apply_env(&mut self) {
        let overrides: [(&str, &mut String); 4] = [
            ("AZURE_SPEECH_KEY", &mut self.azure_key),
            ("AZURE_SPEECH_REGION", &mut self.azure_region),
            ("SPEECHLOOP_ANSWER_URL", &mut self.answer_url),
            ("SPEECHLOOP_ANSWER_TOKEN", &mut self.answer_token),
        ];
        for (var, field) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    tracing::debug!("Using {} from environment", var);
                    *field = value;
                }
            }
        }
    }

    /// Voices offered for `language` (empty if the catalog has none)
    pub fn voices_for(&self, language: &str) -> &[String] {
        self.voices
            .get(language)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn validate(&self) -> SpeechResult<()> {
        if self.language.trim().is_empty() {
            return Err(SpeechError::Config("language must not be empty".to_string()));
        }
        if self.voice.trim().is_empty() {
            return Err(SpeechError::Config("voice must not be empty".to_string()));
        }
        if self.answer_timeout_secs == 0 || self.azure_timeout_secs == 0 {
            return Err(SpeechError::Config("timeouts must be at least one second".to_string()));
        }
        Ok(())
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("speechloop")
        .join("config.json")
}
