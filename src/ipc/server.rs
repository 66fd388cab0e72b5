//! IPC Server
//!
//! Unix socket server exposing the session controller to local clients.

use super::{IpcRequest, IpcResponse};
use crate::console::{PITCH_RANGE, RATE_RANGE};
use crate::error::SpeechError;
use crate::session::SessionController;
use anyhow::Result;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Max bytes accepted per request line
const MAX_REQUEST_BYTES: u64 = 4096;
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Rejects requests arriving closer together than `min_interval`
#[derive(Debug)]
struct RateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    fn allow(&self) -> bool {
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();
        if let Some(previous) = *last {
            if now.duration_since(previous) < self.min_interval {
                return false;
            }
        }
        *last = Some(now);
        true
    }
}

/// IPC Server for a running session
#[derive(Debug)]
pub struct IpcServer {
    path: PathBuf,
    min_interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl IpcServer {
    /// Create new IPC server bound (once started) at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            min_interval: DEFAULT_MIN_INTERVAL,
            task: None,
        }
    }

    /// Minimum time between two accepted requests
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bind the socket and serve requests against `controller`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, controller: Arc<SessionController>) -> Result<()> {
        // Clean up stale socket
        if self.path.exists() {
            let _ = fs::remove_file(&self.path);
        }

        let listener = UnixListener::bind(&self.path)?;

        // User only: rw-------
        let mut perms = fs::metadata(&self.path)?.permissions();
        perms.set_mode(0o600);
        if let Err(e) = fs::set_permissions(&self.path, perms) {
            warn!("⚠️ Failed to set strict IPC socket permissions: {}", e);
        } else {
            debug!("🔒 IPC socket permissions set to 0600");
        }

        let limiter = Arc::new(RateLimiter {
            min_interval: self.min_interval,
            last: Mutex::new(None),
        });

        info!("🔌 IPC server listening on {:?}", self.path);

        self.task = Some(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        let controller = controller.clone();
                        let limiter = limiter.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_client(stream, controller, limiter).await {
                                warn!("IPC client error: {}", e);
                            }
                        });
                    }
                    Err(e) => warn!("IPC accept error: {}", e),
                }
            }
        }));
        Ok(())
    }

    /// Stop the server and remove the socket file
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = fs::remove_file(&self.path);
            info!("🔌 IPC server stopped");
        }
    }

    /// Check if server is running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Handle a single client connection
async fn handle_client(
    stream: UnixStream,
    controller: Arc<SessionController>,
    limiter: Arc<RateLimiter>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half).take(MAX_REQUEST_BYTES);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    if line.trim().is_empty() {
        return Ok(());
    }

    let request: IpcRequest = serde_json::from_str(line.trim())
        .map_err(|e| SpeechError::Ipc(format!("malformed request: {e}")))?;
    debug!("📨 IPC request: {:?}", request);

    let response = if limiter.allow() {
        dispatch(&controller, request).await
    } else {
        warn!("⚠️ IPC Rate Limit triggered - rejecting request");
        IpcResponse::nack(request.seq_id(), "rate limited")
    };

    let response_json = serde_json::to_string(&response)? + "\n";
    write_half.write_all(response_json.as_bytes()).await?;
    Ok(())
}

/// Apply one request to the controller
pub async fn dispatch(controller: &SessionController, request: IpcRequest) -> IpcResponse {
    match request {
        IpcRequest::StatusRequest { seq_id } => {
            let state = controller.state();
            IpcResponse::StatusResponse {
                seq_id,
                listening: state.is_listening,
                speaking: state.is_speaking,
                response_mode: state.response_mode,
                interrupt_enabled: state.interrupt_enabled,
                language: controller.language(),
                voice: controller.voice(),
                settings: controller.settings(),
            }
        }
        IpcRequest::ToggleMicrophone { seq_id } => {
            let listening = controller.toggle_microphone().await;
            IpcResponse::ack(
                seq_id,
                if listening { "microphone on" } else { "microphone off" },
            )
        }
        IpcRequest::SubmitText { seq_id, text } => {
            if text.trim().is_empty() {
                return IpcResponse::nack(seq_id, "text is empty");
            }
            controller.submit_text(&text).await;
            IpcResponse::ack(seq_id, "submitted")
        }
        IpcRequest::SetSynthesisParams { seq_id, settings } => {
            if !RATE_RANGE.contains(&settings.rate) || !PITCH_RANGE.contains(&settings.pitch) {
                return IpcResponse::nack(seq_id, "rate or pitch out of range");
            }
            controller.set_synthesis_params(settings);
            IpcResponse::ack(seq_id, settings.to_string())
        }
        IpcRequest::SetLanguage { seq_id, language } => {
            controller.set_language(&language).await;
            if controller.language() == language {
                IpcResponse::ack(seq_id, format!("language {language}"))
            } else {
                IpcResponse::nack(seq_id, format!("could not switch to {language}"))
            }
        }
        IpcRequest::SetVoice { seq_id, voice } => {
            controller.set_voice(&voice).await;
            if controller.voice() == voice {
                IpcResponse::ack(seq_id, format!("voice {voice}"))
            } else {
                IpcResponse::nack(seq_id, format!("could not switch to {voice}"))
            }
        }
        IpcRequest::SetResponseMode { seq_id, mode } => {
            controller.set_response_mode(mode);
            IpcResponse::ack(seq_id, format!("mode {mode}"))
        }
        IpcRequest::SetInterruptEnabled { seq_id, enabled } => {
            controller.set_interrupt_enabled(enabled);
            IpcResponse::ack(seq_id, format!("interrupt {enabled}"))
        }
        IpcRequest::Interrupt { seq_id } => {
            controller.interrupt().await;
            IpcResponse::ack(seq_id, "interrupted")
        }
    }
}
