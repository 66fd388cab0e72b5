//! Shared test support: mock engines, mock answer backends and a call journal
//! both of them write into, so tests can assert on ordering across the seams.

#![allow(dead_code)]

pub mod mock_backend;
pub mod mock_engine;

pub use mock_backend::MockBackend;
pub use mock_engine::MockEngine;

use speechloop::session::{SessionController, SessionEvent, SessionOptions};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Ordered record of every call made into the mocks
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// Entries starting with `prefix`
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.matching(prefix).len()
    }

    /// Index of the first entry starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }

    /// Markup of every speak request, in order
    pub fn spoken(&self) -> Vec<String> {
        self.matching("speak ")
            .into_iter()
            .map(|e| e["speak ".len()..].to_string())
            .collect()
    }
}

/// A controller wired to mocks
pub struct Harness {
    pub controller: Arc<SessionController>,
    pub engine: Arc<MockEngine>,
    pub journal: Journal,
}

impl Harness {
    pub fn new(options: SessionOptions, backend: MockBackend) -> Self {
        let journal = backend.journal();
        let engine = Arc::new(MockEngine::new(journal.clone()));
        let controller =
            SessionController::launch(engine.clone(), Arc::new(backend), options).unwrap();
        Self {
            controller,
            engine,
            journal,
        }
    }
}

/// Poll `check` until it holds or two seconds pass
pub async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Await `future` with a timeout so a hung test fails instead of stalling
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("operation timed out")
}

/// Everything already published on `events`
pub fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
