//! Sound Engine for synthesized speech
//!
//! rodio's `OutputStream` is not `Send`, so a dedicated audio thread owns it and
//! hands back a `Send` stream handle. Each utterance gets its own sink so it can
//! be stopped without disturbing the output stream.

use crate::error::SpeechError;
use anyhow::{Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::io::Cursor;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use tracing::{debug, info, warn};

/// Thread-safe handle to the sound engine
pub struct SoundEngine {
    handle: OutputStreamHandle,
    sinks: SinkList<Sink>,
    // Dropping the sender ends the audio thread
    _shutdown: mpsc::Sender<()>,
}

impl std::fmt::Debug for SoundEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundEngine").finish()
    }
}

impl SoundEngine {
    pub fn new() -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<OutputStreamHandle, String>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("speechloop-audio".to_string())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(handle));
                info!("🔊 Audio thread started");

                // Keep stream alive until the engine is dropped
                let _ = shutdown_rx.recv();
                drop(stream);
                info!("🔇 Audio thread stopped");
            })
            .context("Failed to spawn audio thread")?;

        let handle = ready_rx
            .recv()
            .context("Audio thread exited during start-up")?
            .map_err(|e| SpeechError::Audio(format!("failed to initialize audio output: {e}")))?;

        Ok(Self {
            handle,
            sinks: SinkList::default(),
            _shutdown: shutdown_tx,
        })
    }

    /// Queue a WAV (or any rodio-decodable) buffer on a fresh sink.
    ///
    /// `cancelled` is checked under the sink lock right before the sink is
    /// registered; if it holds, nothing plays and `None` is returned. A
    /// [`SoundEngine::stop`] issued after `cancelled` turns true therefore
    /// always sees the sink.
    pub fn play_unless(
        &self,
        audio: Vec<u8>,
        cancelled: impl Fn() -> bool,
    ) -> Result<Option<Arc<Sink>>> {
        let source = Decoder::new(Cursor::new(audio)).context("Failed to decode audio")?;
        self.sinks.register_unless(cancelled, || {
            let sink = Sink::try_new(&self.handle).context("Failed to create audio sink")?;
            sink.append(source);
            Ok(Arc::new(sink))
        })
    }

    /// Play a buffer and wait until it ends or is stopped.
    ///
    /// Returns `false` if `cancelled` held before playback could start.
    pub async fn play_until_end(
        &self,
        audio: Vec<u8>,
        cancelled: impl Fn() -> bool,
    ) -> Result<bool> {
        let Some(sink) = self.play_unless(audio, cancelled)? else {
            return Ok(false);
        };
        tokio::task::spawn_blocking(move || sink.sleep_until_end())
            .await
            .map_err(|e| anyhow::anyhow!("Playback task join error: {}", e))?;
        Ok(true)
    }

    /// Stop all current playback
    pub fn stop(&self) {
        let stopped = self.sinks.stop_all();
        if stopped > 0 {
            info!("🛑 Stopped {} sink(s)", stopped);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.sinks.any_playing()
    }
}

impl Drop for SoundEngine {
    fn drop(&mut self) {
        if self.is_playing() {
            warn!("Sound engine dropped during playback");
        }
        self.stop();
    }
}

/// What the sink list needs from a playback sink
pub trait Playback {
    fn stop(&self);
    fn empty(&self) -> bool;
}

impl Playback for Sink {
    fn stop(&self) {
        Sink::stop(self)
    }

    fn empty(&self) -> bool {
        Sink::empty(self)
    }
}

/// Active sinks. Registration and stop share one lock, so a sink is either
/// refused or visible to the next stop.
#[derive(Debug)]
pub struct SinkList<S> {
    sinks: Mutex<Vec<Arc<S>>>,
}

impl<S> Default for SinkList<S> {
    fn default() -> Self {
        Self {
            sinks: Mutex::new(Vec::new()),
        }
    }
}

impl<S: Playback> SinkList<S> {
    /// Create and register a sink unless `cancelled` holds under the lock
    pub fn register_unless(
        &self,
        cancelled: impl Fn() -> bool,
        make: impl FnOnce() -> Result<Arc<S>>,
    ) -> Result<Option<Arc<S>>> {
        let mut sinks = self.sinks.lock().unwrap_or_else(|p| p.into_inner());
        if cancelled() {
            debug!("Playback canceled before it started");
            return Ok(None);
        }
        let sink = make()?;
        sinks.retain(|s| !s.empty());
        sinks.push(sink.clone());
        debug!("🔊 Queued utterance ({} active sinks)", sinks.len());
        Ok(Some(sink))
    }

    /// Stop and forget every sink, returning how many there were
    pub fn stop_all(&self) -> usize {
        let mut sinks = self.sinks.lock().unwrap_or_else(|p| p.into_inner());
        let count = sinks.len();
        for sink in sinks.drain(..) {
            sink.stop();
        }
        count
    }

    pub fn any_playing(&self) -> bool {
        let sinks = self.sinks.lock().unwrap_or_else(|p| p.into_inner());
        sinks.iter().any(|s| !s.empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    #[derive(Debug, Default)]
    struct FakeSink {
        stopped: AtomicBool,
    }

    impl Playback for FakeSink {
        fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }

        fn empty(&self) -> bool {
            self.stopped.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_cancelled_playback_never_registers() {
        let list = SinkList::<FakeSink>::default();
        let mut made = false;
        let sink = list
            .register_unless(
                || true,
                || {
                    made = true;
                    Ok(Arc::new(FakeSink::default()))
                },
            )
            .unwrap();
        assert!(sink.is_none());
        assert!(!made);
        assert!(!list.any_playing());
    }

    #[test]
    fn test_stop_after_cancel_flag_reaches_registered_sink() {
        // Mirrors stop_speaking: bump the epoch, then stop the sinks
        let list = Arc::new(SinkList::<FakeSink>::default());
        let epoch = Arc::new(AtomicU64::new(0));

        for _ in 0..200 {
            let started = epoch.load(Ordering::SeqCst);
            let player = {
                let list = list.clone();
                let epoch = epoch.clone();
                std::thread::spawn(move || {
                    list.register_unless(
                        || epoch.load(Ordering::SeqCst) != started,
                        || Ok(Arc::new(FakeSink::default())),
                    )
                    .unwrap()
                })
            };
            epoch.fetch_add(1, Ordering::SeqCst);
            list.stop_all();

            if let Some(sink) = player.join().unwrap() {
                assert!(sink.stopped.load(Ordering::SeqCst), "sink escaped stop");
            }
            assert!(!list.any_playing());
        }
    }

    #[test]
    fn test_stop_all_counts_and_clears() {
        let list = SinkList::<FakeSink>::default();
        let sink = list
            .register_unless(|| false, || Ok(Arc::new(FakeSink::default())))
            .unwrap()
            .unwrap();
        assert!(list.any_playing());
        assert_eq!(list.stop_all(), 1);
        assert!(sink.stopped.load(Ordering::SeqCst));
        assert_eq!(list.stop_all(), 0);
    }
}
