//! IPC Message Types
//!
//! JSON-serializable messages for session ↔ ctl communication.

use crate::answer::ResponseMode;
use crate::tts::SynthesisSettings;
use serde::{Deserialize, Serialize};

/// Request types sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcRequest {
    /// Request status of the session
    StatusRequest { seq_id: u64 },

    ToggleMicrophone { seq_id: u64 },

    /// Typed input, handled like recognized speech
    SubmitText { seq_id: u64, text: String },

    SetSynthesisParams {
        seq_id: u64,
        settings: SynthesisSettings,
    },

    SetLanguage { seq_id: u64, language: String },

    SetVoice { seq_id: u64, voice: String },

    SetResponseMode { seq_id: u64, mode: ResponseMode },

    SetInterruptEnabled { seq_id: u64, enabled: bool },

    /// Stop speaking now
    Interrupt { seq_id: u64 },
}

impl IpcRequest {
    pub fn seq_id(&self) -> u64 {
        match self {
            IpcRequest::StatusRequest { seq_id }
            | IpcRequest::ToggleMicrophone { seq_id }
            | IpcRequest::SubmitText { seq_id, .. }
            | IpcRequest::SetSynthesisParams { seq_id, .. }
            | IpcRequest::SetLanguage { seq_id, .. }
            | IpcRequest::SetVoice { seq_id, .. }
            | IpcRequest::SetResponseMode { seq_id, .. }
            | IpcRequest::SetInterruptEnabled { seq_id, .. }
            | IpcRequest::Interrupt { seq_id } => *seq_id,
        }
    }
}

/// Response types sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcResponse {
    /// Status response
    StatusResponse {
        seq_id: u64,
        listening: bool,
        speaking: bool,
        response_mode: ResponseMode,
        interrupt_enabled: bool,
        language: String,
        voice: String,
        settings: SynthesisSettings,
    },

    /// Acknowledgment
    Ack {
        seq_id: u64,
        success: bool,
        message: Option<String>,
    },
}

impl IpcResponse {
    pub fn seq_id(&self) -> u64 {
        match self {
            IpcResponse::StatusResponse { seq_id, .. } | IpcResponse::Ack { seq_id, .. } => {
                *seq_id
            }
        }
    }

    pub fn ack(seq_id: u64, message: impl Into<String>) -> Self {
        IpcResponse::Ack {
            seq_id,
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn nack(seq_id: u64, message: impl Into<String>) -> Self {
        IpcResponse::Ack {
            seq_id,
            success: false,
            message: Some(message.into()),
        }
    }
}
