//! Azure Speech TTS backend over REST

use super::{SynthesisOutcome, Synthesizer};
use crate::audio::SoundEngine;
use crate::engine::AzureCredentials;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

const OUTPUT_FORMAT: &str = "riff-24khz-16bit-mono-pcm";

#[derive(Debug)]
pub struct AzureSynthesizer {
    client: reqwest::Client,
    credentials: AzureCredentials,
    sound: Arc<SoundEngine>,
    voice: String,
    // Bumped by stop_speaking; requests started under an older epoch are stale
    epoch: AtomicU64,
}

impl AzureSynthesizer {
    pub fn new(
        client: reqwest::Client,
        credentials: AzureCredentials,
        sound: Arc<SoundEngine>,
        voice: &str,
    ) -> Self {
        Self {
            client,
            credentials,
            sound,
            voice: voice.to_string(),
            epoch: AtomicU64::new(0),
        }
    }

    fn stopped_since(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) != epoch
    }
}

fn canceled_by_user(detail: &str) -> SynthesisOutcome {
    SynthesisOutcome::Canceled {
        reason: "CancelledByUser".to_string(),
        detail: detail.to_string(),
    }
}

#[async_trait]
impl Synthesizer for AzureSynthesizer {
    async fn speak_markup(&self, markup: &str) -> Result<SynthesisOutcome> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        debug!("📢 Azure synthesizing with {}", self.voice);

        let response = match self
            .client
            .post(self.credentials.synthesis_url())
            .header("Ocp-Apim-Subscription-Key", &self.credentials.key)
            .header(CONTENT_TYPE, "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .body(markup.to_string())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return Ok(SynthesisOutcome::Canceled {
                    reason: "Error".to_string(),
                    detail: e.to_string(),
                })
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(SynthesisOutcome::Canceled {
                reason: format!("HTTP {}", status),
                detail: body,
            });
        }

        let audio = response.bytes().await?.to_vec();
        debug!("🔊 Playing {} bytes of synthesized audio", audio.len());
        // Checked under the sink lock: a racing stop either refuses or stops the sink
        let played = self
            .sound
            .play_until_end(audio, || self.stopped_since(epoch))
            .await?;
        if !played {
            return Ok(canceled_by_user("stopped before playback"));
        }

        if self.stopped_since(epoch) {
            return Ok(canceled_by_user("stopped during playback"));
        }
        Ok(SynthesisOutcome::Completed)
    }

    async fn stop_speaking(&self) -> Result<()> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.sound.stop();
        info!("🛑 Azure synthesis stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "azure"
    }
}
