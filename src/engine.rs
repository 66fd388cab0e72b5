//! Speech engine factory
//!
//! The session recreates recognizer and synthesizer handles whenever the
//! language or voice changes, so engines are exposed as factories.

use crate::asr::{AzureRecognizer, RecognitionSender, Recognizer};
use crate::audio::{SegmenterConfig, SoundEngine};
use crate::config::Config;
use crate::error::SpeechError;
use crate::tts::azure::AzureSynthesizer;
use crate::tts::Synthesizer;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Creates engine handles for a language/voice pair
pub trait SpeechEngine: Send + Sync {
    /// Create a recognizer for `language` that reports into `events`
    fn create_recognizer(
        &self,
        language: &str,
        events: RecognitionSender,
    ) -> Result<Arc<dyn Recognizer>>;

    /// Create a synthesizer for `language` speaking with `voice`
    fn create_synthesizer(&self, language: &str, voice: &str) -> Result<Arc<dyn Synthesizer>>;

    /// Get the engine name
    fn name(&self) -> &str;
}

/// Subscription key and region of an Azure Speech resource
#[derive(Clone)]
pub struct AzureCredentials {
    pub key: String,
    pub region: String,
}

impl std::fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl AzureCredentials {
    pub fn synthesis_url(&self) -> String {
        format!(
            "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
            self.region
        )
    }

    pub fn recognition_url(&self) -> String {
        format!(
            "https://{}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1",
            self.region
        )
    }
}

/// Azure Speech over its REST endpoints
pub struct AzureSpeechEngine {
    credentials: AzureCredentials,
    client: reqwest::Client,
    sound: Arc<SoundEngine>,
    input_device: Option<usize>,
    segmenter: SegmenterConfig,
}

impl AzureSpeechEngine {
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.azure_key.is_empty() || config.azure_region.is_empty() {
            return Err(SpeechError::Config(
                "Azure key and region are required (set AZURE_SPEECH_KEY and AZURE_SPEECH_REGION)"
                    .to_string(),
            )
            .into());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.azure_timeout_secs))
            .user_agent(concat!("speechloop/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let sound = Arc::new(SoundEngine::new()?);
        info!("☁️ Azure Speech engine ready (region {})", config.azure_region);

        Ok(Self {
            credentials: AzureCredentials {
                key: config.azure_key.clone(),
                region: config.azure_region.clone(),
            },
            client,
            sound,
            input_device: config.input_device,
            segmenter: config.segmenter.clone(),
        })
    }
}

impl SpeechEngine for AzureSpeechEngine {
    fn create_recognizer(
        &self,
        language: &str,
        events: RecognitionSender,
    ) -> Result<Arc<dyn Recognizer>> {
        Ok(Arc::new(AzureRecognizer::new(
            self.client.clone(),
            self.credentials.clone(),
            language,
            self.input_device,
            self.segmenter.clone(),
            events,
        )))
    }

    fn create_synthesizer(&self, _language: &str, voice: &str) -> Result<Arc<dyn Synthesizer>> {
        // Language and voice travel inside the SSML document
        Ok(Arc::new(AzureSynthesizer::new(
            self.client.clone(),
            self.credentials.clone(),
            self.sound.clone(),
            voice,
        )))
    }

    fn name(&self) -> &str {
        "azure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let creds = AzureCredentials {
            key: "secret".to_string(),
            region: "westeurope".to_string(),
        };
        assert_eq!(
            creds.synthesis_url(),
            "https://westeurope.tts.speech.microsoft.com/cognitiveservices/v1"
        );
        assert!(creds
            .recognition_url()
            .starts_with("https://westeurope.stt.speech.microsoft.com/"));
        assert!(!format!("{creds:?}").contains("secret"));
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let result = AzureSpeechEngine::from_config(&Config::default());
        assert!(result.is_err());
    }
}
