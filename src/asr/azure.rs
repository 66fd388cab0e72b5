//! Azure Speech continuous recognition
//!
//! Captures the microphone, cuts the stream into utterances on trailing
//! silence, and posts each one to the short-audio REST endpoint. Results are
//! published as [`RecognitionEvent`]s.

use super::{RecognitionEvent, RecognitionSender, Recognizer};
use crate::audio::{encode_wav, start_capture, SegmenterConfig, UtteranceSegmenter, SAMPLE_RATE};
use crate::engine::AzureCredentials;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Short-audio recognition response (`format=simple`)
#[derive(Debug, Deserialize)]
struct ShortAudioResponse {
    #[serde(rename = "RecognitionStatus")]
    status: String,
    #[serde(rename = "DisplayText", default)]
    display_text: String,
}

/// Map a short-audio response onto a recognition event
fn interpret_response(response: ShortAudioResponse) -> RecognitionEvent {
    match response.status.as_str() {
        "Success" => RecognitionEvent::recognized(response.display_text),
        "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => RecognitionEvent::no_match(),
        other => RecognitionEvent::canceled(other, "recognition service reported a failure"),
    }
}

#[derive(Debug)]
struct RecognizerInner {
    client: reqwest::Client,
    credentials: AzureCredentials,
    language: String,
    input_device: Option<usize>,
    segmenter: SegmenterConfig,
    events: RecognitionSender,
}

#[derive(Debug)]
struct RunningCapture {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

#[derive(Debug)]
pub struct AzureRecognizer {
    inner: Arc<RecognizerInner>,
    running: Mutex<Option<RunningCapture>>,
}

impl AzureRecognizer {
    pub fn new(
        client: reqwest::Client,
        credentials: AzureCredentials,
        language: &str,
        input_device: Option<usize>,
        segmenter: SegmenterConfig,
        events: RecognitionSender,
    ) -> Self {
        Self {
            inner: Arc::new(RecognizerInner {
                client,
                credentials,
                language: language.to_string(),
                input_device,
                segmenter,
                events,
            }),
            running: Mutex::new(None),
        }
    }
}

impl RecognizerInner {
    fn emit(&self, event: RecognitionEvent) {
        if self.events.send(event).is_err() {
            debug!("Recognition event dropped: no subscriber");
        }
    }

    async fn run(self: Arc<Self>, mut stop: oneshot::Receiver<()>) {
        let device = self.input_device;
        let (capture, mut chunks) = match tokio::task::spawn_blocking(move || start_capture(device)).await {
            Ok(Ok(opened)) => opened,
            Ok(Err(e)) => {
                self.emit(RecognitionEvent::canceled("AudioInputError", e.to_string()));
                return;
            }
            Err(e) => {
                self.emit(RecognitionEvent::canceled("AudioInputError", e.to_string()));
                return;
            }
        };

        info!("👂 Listening for {} on {}", self.language, capture.device_name());
        let mut segmenter = UtteranceSegmenter::new(self.segmenter.clone(), SAMPLE_RATE);

        loop {
            tokio::select! {
                _ = &mut stop => break,
                chunk = chunks.recv() => match chunk {
                    Some(samples) => {
                        if let Some(utterance) = segmenter.push(&samples) {
                            let event = self.transcribe(&utterance).await;
                            self.emit(event);
                        }
                    }
                    None => {
                        if let Some(utterance) = segmenter.flush() {
                            let event = self.transcribe(&utterance).await;
                            self.emit(event);
                        }
                        self.emit(RecognitionEvent::canceled("AudioInputError", "capture stream closed"));
                        break;
                    }
                }
            }
        }

        if tokio::task::spawn_blocking(move || capture.stop()).await.is_err() {
            warn!("Audio capture shutdown task failed");
        }
    }

    async fn transcribe(&self, samples: &[i16]) -> RecognitionEvent {
        let wav = match encode_wav(samples, SAMPLE_RATE) {
            Ok(wav) => wav,
            Err(e) => return RecognitionEvent::canceled("Error", e.to_string()),
        };
        debug!("☁️ Sending {} bytes for recognition", wav.len());

        let response = match self
            .client
            .post(self.credentials.recognition_url())
            .query(&[("language", self.language.as_str()), ("format", "simple")])
            .header("Ocp-Apim-Subscription-Key", &self.credentials.key)
            .header(
                CONTENT_TYPE,
                format!("audio/wav; codecs=audio/pcm; samplerate={}", SAMPLE_RATE),
            )
            .header(ACCEPT, "application/json")
            .body(wav)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return RecognitionEvent::canceled("Error", e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return RecognitionEvent::canceled(format!("HTTP {}", status), body);
        }

        match response.json::<ShortAudioResponse>().await {
            Ok(parsed) => interpret_response(parsed),
            Err(e) => RecognitionEvent::canceled("Error", e.to_string()),
        }
    }
}

#[async_trait]
impl Recognizer for AzureRecognizer {
    fn start_continuous(&self) {
        let mut running = self.running.lock().unwrap_or_else(|p| p.into_inner());
        if running.is_some() {
            debug!("Azure recognizer already running");
            return;
        }
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(self.inner.clone().run(stop_rx));
        *running = Some(RunningCapture { stop, task });
    }

    async fn stop_continuous(&self) -> Result<()> {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(RunningCapture { stop, task }) = running {
            let _ = stop.send(());
            task.await
                .map_err(|e| anyhow::anyhow!("Recognition task failed: {}", e))?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "azure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::RecognitionReason;

    fn response(json: &str) -> RecognitionEvent {
        interpret_response(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_success_maps_to_recognized() {
        let event = response(
            r#"{"RecognitionStatus":"Success","DisplayText":"Привет.","Offset":100,"Duration":900}"#,
        );
        assert_eq!(event, RecognitionEvent::recognized("Привет."));
    }

    #[test]
    fn test_silence_statuses_map_to_no_match() {
        for status in ["NoMatch", "InitialSilenceTimeout", "BabbleTimeout"] {
            let event = response(&format!(r#"{{"RecognitionStatus":"{status}"}}"#));
            assert!(matches!(
                event,
                RecognitionEvent::Recognized {
                    reason: RecognitionReason::NoMatch,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_errors_map_to_canceled() {
        let event = response(r#"{"RecognitionStatus":"Error"}"#);
        assert!(matches!(event, RecognitionEvent::Canceled { reason, .. } if reason == "Error"));
    }
}
