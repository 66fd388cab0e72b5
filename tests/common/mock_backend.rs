//! Mock answer backend
//!
//! Answers with a fixed text or fails with a fixed status, recording every
//! question into the shared journal.

use super::Journal;
use async_trait::async_trait;
use speechloop::answer::AnswerBackend;
use speechloop::error::{SpeechError, SpeechResult};

#[derive(Debug)]
enum Reply {
    Answer(String),
    Status(u16),
}

#[derive(Debug)]
pub struct MockBackend {
    reply: Reply,
    journal: Journal,
}

impl MockBackend {
    pub fn answering(answer: &str) -> Self {
        Self {
            reply: Reply::Answer(answer.to_string()),
            journal: Journal::default(),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            reply: Reply::Status(status),
            journal: Journal::default(),
        }
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

#[async_trait]
impl AnswerBackend for MockBackend {
    async fn ask(&self, question: &str) -> SpeechResult<String> {
        self.journal.record(format!("ask {question}"));
        match &self.reply {
            Reply::Answer(answer) => Ok(answer.clone()),
            Reply::Status(status) => Err(SpeechError::Backend {
                status: *status,
                body: "mock failure".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
