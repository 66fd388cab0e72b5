//! speechloop - voice conversation loop
//!
//! Listens on the microphone, answers through a remote endpoint (or echoes)
//! and speaks the answer back with Azure Speech.

use anyhow::Result;
use clap::Parser;
use speechloop::answer::{EndpointClient, ResponseMode};
use speechloop::config::Config;
use speechloop::console::Console;
use speechloop::engine::AzureSpeechEngine;
use speechloop::ipc::{socket_path, IpcServer};
use speechloop::session::{SessionController, SessionOptions};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Recognition language (e.g. ru-RU, kk-KZ)
    #[arg(short, long)]
    language: Option<String>,

    /// Synthesis voice (e.g. ru-RU-SvetlanaNeural)
    #[arg(long)]
    voice: Option<String>,

    /// Response mode: endpoint or repeat
    #[arg(short, long)]
    mode: Option<ResponseMode>,

    /// Audio input device index
    #[arg(short, long)]
    device: Option<usize>,

    /// Do not open the control socket
    #[arg(long)]
    no_ipc: bool,

    /// Start with the microphone on
    #[arg(long)]
    listen: bool,
}

fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase()))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load()?;
    init_logging(&config, args.verbose)?;

    if let Some(language) = args.language {
        config.language = language;
    }
    if let Some(voice) = args.voice {
        config.voice = voice;
    }
    if let Some(mode) = args.mode {
        config.response_mode = mode;
    }
    if args.device.is_some() {
        config.input_device = args.device;
    }
    config.validate()?;

    info!("🔊 speechloop v{} starting...", env!("CARGO_PKG_VERSION"));

    let engine = Arc::new(AzureSpeechEngine::from_config(&config)?);
    let backend = Arc::new(EndpointClient::from_config(&config)?);
    let controller = SessionController::launch(engine, backend, SessionOptions::from(&config))?;

    let mut ipc = if config.ipc_enabled && !args.no_ipc {
        let mut server = IpcServer::new(socket_path());
        match server.start(controller.clone()) {
            Ok(()) => Some(server),
            Err(e) => {
                warn!("⚠️ Control socket unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    if args.listen {
        controller.start_listening().await;
    }

    info!("✅ speechloop ready - type /mic to start listening");
    Console::new(controller.clone(), config.voices.clone())
        .run()
        .await?;

    controller.stop_listening().await;
    controller.interrupt().await;
    if let Some(server) = ipc.as_mut() {
        server.stop();
    }
    Ok(())
}
