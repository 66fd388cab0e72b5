//! speechloop-ctl - control a running speechloop session
//!
//! Run with: cargo run --bin speechloop-ctl -- status

use anyhow::Result;
use clap::{Parser, Subcommand};
use speechloop::answer::ResponseMode;
use speechloop::ipc::{socket_path, IpcClient, IpcRequest, IpcResponse};
use speechloop::tts::{EmphasisLevel, SynthesisSettings, Volume};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Socket of the running session
    #[arg(long)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show session state
    Status,
    /// Toggle the microphone
    Mic,
    /// Ask a question as typed input
    Say { text: Vec<String> },
    /// Change recognition language
    Lang { language: String },
    /// Change synthesis voice
    Voice { voice: String },
    /// Response mode: endpoint or repeat
    Mode { mode: ResponseMode },
    /// Allow or forbid interrupting the bot
    Interrupt {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Stop speaking now
    Stop,
    /// Replace all prosody settings
    Prosody {
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        rate: i32,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        pitch: i32,
        #[arg(long, default_value = "medium")]
        volume: Volume,
        #[arg(long, default_value = "moderate")]
        emphasis: EmphasisLevel,
        #[arg(long, default_value = "none")]
        accent: EmphasisLevel,
    },
}

fn build_request(command: Command, seq_id: u64) -> IpcRequest {
    match command {
        Command::Status => IpcRequest::StatusRequest { seq_id },
        Command::Mic => IpcRequest::ToggleMicrophone { seq_id },
        Command::Say { text } => IpcRequest::SubmitText {
            seq_id,
            text: text.join(" "),
        },
        Command::Lang { language } => IpcRequest::SetLanguage { seq_id, language },
        Command::Voice { voice } => IpcRequest::SetVoice { seq_id, voice },
        Command::Mode { mode } => IpcRequest::SetResponseMode { seq_id, mode },
        Command::Interrupt { enabled } => IpcRequest::SetInterruptEnabled { seq_id, enabled },
        Command::Stop => IpcRequest::Interrupt { seq_id },
        Command::Prosody {
            rate,
            pitch,
            volume,
            emphasis,
            accent,
        } => IpcRequest::SetSynthesisParams {
            seq_id,
            settings: SynthesisSettings {
                rate,
                pitch,
                volume,
                emphasis,
                accent,
            },
        },
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let args = Args::parse();
    let client = IpcClient::new(args.socket.unwrap_or_else(socket_path));
    if !client.is_session_running() {
        anyhow::bail!("no speechloop session is running");
    }

    let command = args.command;
    match client.send(|seq_id| build_request(command, seq_id))? {
        IpcResponse::StatusResponse {
            listening,
            speaking,
            response_mode,
            interrupt_enabled,
            language,
            voice,
            settings,
            ..
        } => {
            println!("microphone: {}", if listening { "on" } else { "off" });
            println!("speaking:   {}", speaking);
            println!("mode:       {}", response_mode);
            println!("interrupt:  {}", if interrupt_enabled { "on" } else { "off" });
            println!("language:   {}", language);
            println!("voice:      {}", voice);
            println!("prosody:    {}", settings);
        }
        IpcResponse::Ack {
            success, message, ..
        } => {
            let message = message.unwrap_or_default();
            if !success {
                anyhow::bail!("request rejected: {message}");
            }
            println!("✅ {message}");
        }
    }
    Ok(())
}
