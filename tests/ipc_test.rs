//! Control socket against an in-process session

mod common;

use common::{wait_for, Harness, MockBackend};
use speechloop::answer::ResponseMode;
use speechloop::config::Config;
use speechloop::console::{Console, ConsoleCommand};
use speechloop::ipc::{IpcClient, IpcRequest, IpcResponse, IpcServer};
use speechloop::session::SessionOptions;
use speechloop::tts::{SynthesisSettings, Volume};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixStream;
use std::time::Duration;
use tempfile::TempDir;

struct Served {
    harness: Harness,
    server: IpcServer,
    client: IpcClient,
    _dir: TempDir,
}

fn serve(min_interval: Duration) -> Served {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ctl.sock");
    let harness = Harness::new(SessionOptions::default(), MockBackend::answering("ответ"));
    let mut server = IpcServer::new(&path).with_min_interval(min_interval);
    server.start(harness.controller.clone()).unwrap();
    Served {
        harness,
        server,
        client: IpcClient::new(&path).with_timeout(Duration::from_secs(5)),
        _dir: dir,
    }
}

/// Run a blocking client call off the runtime threads
async fn call(
    client: &IpcClient,
    build: impl FnOnce(u64) -> IpcRequest + Send + 'static,
) -> IpcResponse {
    let client = client.clone();
    tokio::task::spawn_blocking(move || client.send(build))
        .await
        .unwrap()
        .unwrap()
}

fn assert_ack(response: &IpcResponse, expected: bool) {
    match response {
        IpcResponse::Ack { success, .. } => assert_eq!(*success, expected, "{response:?}"),
        other => panic!("expected ack, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_socket_permissions() {
    let served = serve(Duration::ZERO);

    let mode = fs::metadata(served.server.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    assert!(served.server.is_running());
    assert!(served.client.is_session_running());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_round_trip() {
    let served = serve(Duration::ZERO);

    match call(&served.client, |seq_id| IpcRequest::StatusRequest { seq_id }).await {
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
            assert!(!listening);
            assert!(!speaking);
            assert_eq!(response_mode, ResponseMode::Endpoint);
            assert!(interrupt_enabled);
            assert_eq!(language, "ru-RU");
            assert_eq!(voice, "ru-RU-DmitryNeural");
            assert_eq!(settings, SynthesisSettings::default());
        }
        other => panic!("expected status, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_commands_reach_the_controller() {
    let served = serve(Duration::ZERO);
    let controller = served.harness.controller.clone();

    let response = call(&served.client, |seq_id| IpcRequest::ToggleMicrophone { seq_id }).await;
    assert_ack(&response, true);
    assert!(controller.is_listening());

    let response = call(&served.client, |seq_id| IpcRequest::SetResponseMode {
        seq_id,
        mode: ResponseMode::Repeat,
    })
    .await;
    assert_ack(&response, true);
    assert_eq!(controller.response_mode(), ResponseMode::Repeat);

    let response = call(&served.client, |seq_id| IpcRequest::SetLanguage {
        seq_id,
        language: "kk-KZ".to_string(),
    })
    .await;
    assert_ack(&response, true);
    assert_eq!(controller.language(), "kk-KZ");
    assert!(controller.is_listening());

    let response = call(&served.client, |seq_id| IpcRequest::SubmitText {
        seq_id,
        text: "сәлем".to_string(),
    })
    .await;
    assert_ack(&response, true);
    assert!(wait_for(|| served.harness.journal.spoken().len() == 1).await);
    assert!(served.harness.journal.spoken()[0].contains("сәлем"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_settings_rejected() {
    let served = serve(Duration::ZERO);

    let response = call(&served.client, |seq_id| IpcRequest::SetSynthesisParams {
        seq_id,
        settings: SynthesisSettings {
            rate: 90,
            ..SynthesisSettings::default()
        },
    })
    .await;

    assert_ack(&response, false);
    assert_eq!(served.harness.controller.settings().rate, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rate_limit_rejects_bursts() {
    let served = serve(Duration::from_secs(60));

    let first = call(&served.client, |seq_id| IpcRequest::Interrupt { seq_id }).await;
    assert_ack(&first, true);

    let second = call(&served.client, |seq_id| IpcRequest::Interrupt { seq_id }).await;
    match second {
        IpcResponse::Ack { success, message, .. } => {
            assert!(!success);
            assert_eq!(message.as_deref(), Some("rate limited"));
        }
        other => panic!("expected ack, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_request_closes_connection() {
    let served = serve(Duration::ZERO);
    let path = served.server.path().to_path_buf();

    tokio::task::spawn_blocking(move || {
        let mut stream = UnixStream::connect(&path).unwrap();
        stream.write_all(b"{\"type\":\"dance\"}\n").unwrap();
    })
    .await
    .unwrap();

    // Server keeps serving after a bad client
    let response = call(&served.client, |seq_id| IpcRequest::StatusRequest { seq_id }).await;
    assert!(matches!(response, IpcResponse::StatusResponse { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_console_edit_keeps_socket_settings() {
    let served = serve(Duration::ZERO);
    let console = Console::new(served.harness.controller.clone(), Config::default().voices);

    let response = call(&served.client, |seq_id| IpcRequest::SetSynthesisParams {
        seq_id,
        settings: SynthesisSettings {
            volume: Volume::Loud,
            ..SynthesisSettings::default()
        },
    })
    .await;
    assert_ack(&response, true);

    assert!(console.execute(ConsoleCommand::Rate(10)).await.is_none());

    let settings = served.harness.controller.settings();
    assert_eq!(settings.volume, Volume::Loud);
    assert_eq!(settings.rate, 10);

    let status = console.execute(ConsoleCommand::Status).await.unwrap();
    assert!(status.contains("volume=loud"), "{status}");
    assert!(status.contains("rate=+10%"), "{status}");
}
