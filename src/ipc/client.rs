//! IPC Client
//!
//! Blocking Unix socket client used by `speechloop-ctl`.

use super::{socket_path, IpcRequest, IpcResponse};
use crate::error::SpeechError;
use anyhow::Result;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

static NEXT_SEQ_ID: AtomicU64 = AtomicU64::new(1);

fn next_seq_id() -> u64 {
    NEXT_SEQ_ID.fetch_add(1, Ordering::SeqCst)
}

/// IPC Client for a running session
#[derive(Debug, Clone)]
pub struct IpcClient {
    path: PathBuf,
    timeout: Duration,
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new(socket_path())
    }
}

impl IpcClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            // Language changes wait for the engine, so allow some slack
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if a session is listening on the socket
    pub fn is_session_running(&self) -> bool {
        self.path.exists() && UnixStream::connect(&self.path).is_ok()
    }

    /// Send one request built around a fresh sequence id and wait for its response
    pub fn send(&self, build: impl FnOnce(u64) -> IpcRequest) -> Result<IpcResponse> {
        let seq_id = next_seq_id();
        let request = build(seq_id);

        let mut stream = UnixStream::connect(&self.path)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(Duration::from_secs(5)))?;

        let request_json = serde_json::to_string(&request)? + "\n";
        stream.write_all(request_json.as_bytes())?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line)?;

        let response: IpcResponse = serde_json::from_str(line.trim())?;
        debug!("📨 IPC response: {:?}", response);

        if response.seq_id() != request.seq_id() {
            return Err(SpeechError::Ipc(format!(
                "sequence ID mismatch: expected {}, got {}",
                request.seq_id(),
                response.seq_id()
            ))
            .into());
        }
        Ok(response)
    }

    /// Request session status
    pub fn status(&self) -> Result<IpcResponse> {
        self.send(|seq_id| IpcRequest::StatusRequest { seq_id })
    }
}
