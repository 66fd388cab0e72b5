//! Audio capture module using cpal

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc as std_mpsc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Capture sample rate expected by the short-audio recognizer
pub const SAMPLE_RATE: u32 = 16000;

/// Running microphone capture.
///
/// The cpal stream is not `Send`, so it lives on a dedicated thread that
/// waits for the stop signal and then drops the stream.
pub struct Capture {
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
    device_name: String,
}

impl std::fmt::Debug for Capture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capture")
            .field("device", &self.device_name)
            .finish()
    }
}

impl Capture {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Stop the stream and wait for the capture thread to exit (blocking)
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Audio capture thread panicked");
            }
            debug!("🎙️ Audio capture stopped");
        }
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Start audio capture and return a receiver for 16 kHz mono chunks.
///
/// Blocks until the device is open; call from a blocking context.
pub fn start_capture(device_index: Option<usize>) -> Result<(Capture, mpsc::UnboundedReceiver<Vec<i16>>)> {
    let (chunk_tx, chunk_rx) = mpsc::unbounded_channel::<Vec<i16>>();
    let (ready_tx, ready_rx) = std_mpsc::channel::<Result<String>>();
    let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

    let thread = thread::Builder::new()
        .name("speechloop-capture".to_string())
        .spawn(move || {
            let stream = match open_stream(device_index, chunk_tx) {
                Ok((stream, name)) => {
                    let _ = ready_tx.send(Ok(name));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            // Park until asked to stop (or the handle is dropped)
            let _ = stop_rx.recv();
            drop(stream);
        })
        .context("Failed to spawn audio capture thread")?;

    let device_name = ready_rx
        .recv()
        .context("Audio capture thread exited before opening the device")??;
    info!("🎙️ Audio capture started on {}", device_name);

    Ok((
        Capture {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            device_name,
        },
        chunk_rx,
    ))
}

fn open_stream(
    device_index: Option<usize>,
    tx: mpsc::UnboundedSender<Vec<i16>>,
) -> Result<(cpal::Stream, String)> {
    let host = cpal::default_host();

    // List available devices
    debug!("Available audio input devices:");
    for (i, device) in host.input_devices()?.enumerate() {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let marker = if device_index == Some(i) { "*" } else { " " };
        debug!("  {} [{}] {}", marker, i, name);
    }

    // Select device
    let device = if let Some(idx) = device_index {
        host.input_devices()?
            .nth(idx)
            .context("Device index out of range")?
    } else {
        host.default_input_device()
            .context("No default input device")?
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device.build_input_stream(
        &config,
        move |data: &[i16], _: &cpal::InputCallbackInfo| {
            if tx.send(data.to_vec()).is_err() {
                debug!("Audio receiver dropped");
            }
        },
        |err| {
            warn!("Audio stream error: {}", err);
        },
        None,
    )?;

    stream.play()?;
    Ok((stream, device_name))
}
