//! Answer Resolver
//!
//! Turns an utterance into the text that should be spoken back: either the
//! utterance itself (repeat mode) or the answer of a remote scoring endpoint.

use crate::config::Config;
use crate::error::{SpeechError, SpeechResult};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Where answers come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Ask the remote answer endpoint
    #[default]
    Endpoint,
    /// Speak the utterance back unchanged
    Repeat,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Endpoint => "endpoint",
            ResponseMode::Repeat => "repeat",
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseMode {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "endpoint" => Ok(ResponseMode::Endpoint),
            "repeat" | "echo" => Ok(ResponseMode::Repeat),
            other => Err(SpeechError::Parse(format!(
                "unknown response mode '{other}' (expected endpoint or repeat)"
            ))),
        }
    }
}

/// One seeded exchange of the conversation sent with every question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub inputs: TurnInputs,
    pub outputs: TurnOutputs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnInputs {
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutputs {
    pub answer: String,
}

impl ChatTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            inputs: TurnInputs {
                question: question.into(),
            },
            outputs: TurnOutputs {
                answer: answer.into(),
            },
        }
    }
}

/// Greeting exchange used when the config does not provide one
pub fn default_seed() -> Vec<ChatTurn> {
    vec![ChatTurn::new(
        "привет",
        "Здравствуйте! Чем могу помочь?",
    )]
}

/// Request body of the scoring endpoint
#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    chat_history: &'a [ChatTurn],
    question: &'a str,
    source: Option<&'a str>,
    mode: Option<&'a str>,
}

/// Scoring endpoint response (extra fields ignored)
#[derive(Debug, Deserialize)]
struct ScoreResponse {
    #[serde(default)]
    answer: Option<String>,
}

/// Trait for answer backends
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    /// Answer a single question
    async fn ask(&self, question: &str) -> SpeechResult<String>;

    /// Get the backend name
    fn name(&self) -> &str;
}

/// HTTP client for the remote scoring endpoint
#[derive(Debug, Clone)]
pub struct EndpointClient {
    client: reqwest::Client,
    url: String,
    token: String,
    seed: Vec<ChatTurn>,
}

impl EndpointClient {
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        seed: Vec<ChatTurn>,
        timeout: Duration,
    ) -> SpeechResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            token: token.into(),
            seed,
        })
    }

    /// Create a client from config
    pub fn from_config(config: &Config) -> SpeechResult<Self> {
        if config.answer_url.trim().is_empty() {
            warn!("⚠️ No answer endpoint configured; endpoint mode will stay silent");
        }
        Self::new(
            config.answer_url.clone(),
            config.answer_token.clone(),
            config.answer_seed.clone(),
            Duration::from_secs(config.answer_timeout_secs),
        )
    }

    fn request_body<'a>(&'a self, question: &'a str) -> ScoreRequest<'a> {
        ScoreRequest {
            chat_history: &self.seed,
            question,
            source: None,
            mode: None,
        }
    }
}

#[async_trait]
impl AnswerBackend for EndpointClient {
    async fn ask(&self, question: &str) -> SpeechResult<String> {
        if self.url.trim().is_empty() {
            return Err(SpeechError::Config(
                "answer endpoint URL is not configured".to_string(),
            ));
        }

        let mut request = self.client.post(&self.url).json(&self.request_body(question));
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body_text = response.text().await?;

        if status != StatusCode::OK {
            return Err(SpeechError::Backend {
                status: status.as_u16(),
                body: body_text,
            });
        }

        debug!("🧠 Endpoint raw body: {}", body_text);

        let parsed: ScoreResponse = serde_json::from_str(&body_text)?;
        match parsed.answer {
            Some(answer) if !answer.trim().is_empty() => Ok(answer),
            _ => Err(SpeechError::EmptyAnswer),
        }
    }

    fn name(&self) -> &str {
        "endpoint"
    }
}

/// Dispatches utterances according to the response mode
#[derive(Clone)]
pub struct AnswerResolver {
    backend: Arc<dyn AnswerBackend>,
}

impl fmt::Debug for AnswerResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnswerResolver")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl AnswerResolver {
    pub fn new(backend: Arc<dyn AnswerBackend>) -> Self {
        Self { backend }
    }

    /// Text to speak for `text`, or `None` when the turn should stay silent.
    ///
    /// Backend failures are logged, never returned. No retries.
    pub async fn resolve(&self, text: &str, mode: ResponseMode) -> Option<String> {
        match mode {
            ResponseMode::Repeat => Some(text.to_string()),
            ResponseMode::Endpoint => match self.backend.ask(text).await {
                Ok(answer) => {
                    info!("💬 Answer received: {}", answer);
                    Some(answer)
                }
                Err(e) if e.is_backend_failure() => {
                    error!("❌ Answer endpoint rejected the question: {}", e);
                    None
                }
                Err(e) => {
                    warn!("⚠️ Answer endpoint unreachable: {}", e);
                    None
                }
            },
        }
    }
}
