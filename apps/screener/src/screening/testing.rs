//! In-memory `ModelEndpoint` / `FileStore` doubles shared by the screening tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::llm_client::{ContentPart, FileStore, LlmError, ModelEndpoint};

pub enum FakeReply {
    Text(String),
    /// Reply with no content, as the client reports a blank completion.
    Empty,
    ApiError(u16),
}

/// Replays queued replies in order; repeats `fallback` once the queue is empty.
pub struct FakeEndpoint {
    replies: Mutex<VecDeque<FakeReply>>,
    fallback: String,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<ContentPart>>>,
}

impl FakeEndpoint {
    pub fn new(replies: Vec<FakeReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: valid_reply(60),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: String) -> Self {
        let mut endpoint = Self::new(Vec::new());
        endpoint.fallback = reply;
        endpoint
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<ContentPart>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelEndpoint for FakeEndpoint {
    async fn complete(&self, _system: &str, parts: &[ContentPart]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(parts.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(FakeReply::Text(text)) => Ok(text),
            Some(FakeReply::Empty) => Err(LlmError::EmptyContent),
            Some(FakeReply::ApiError(status)) => Err(LlmError::Api {
                status,
                message: "upstream unavailable".to_string(),
            }),
            None => Ok(self.fallback.clone()),
        }
    }
}

#[derive(Default)]
pub struct FakeStore {
    uploads: AtomicUsize,
    fail_uploads: bool,
    fail_deletes: HashSet<String>,
    deleted: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn failing_uploads() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    pub fn failing_deletes(ids: &[&str]) -> Self {
        Self {
            fail_deletes: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileStore for FakeStore {
    async fn upload(&self, _filename: &str, _bytes: Vec<u8>) -> Result<String, LlmError> {
        if self.fail_uploads {
            return Err(LlmError::Api {
                status: 400,
                message: "invalid file".to_string(),
            });
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("file-{n}"))
    }

    async fn delete(&self, file_id: &str) -> Result<(), LlmError> {
        if self.fail_deletes.contains(file_id) {
            return Err(LlmError::Api {
                status: 404,
                message: format!("No such File object: {file_id}"),
            });
        }
        self.deleted.lock().unwrap().push(file_id.to_string());
        Ok(())
    }
}

pub fn summary_of_len(len: usize) -> String {
    "Strong Rust background with distributed systems delivery. "
        .chars()
        .cycle()
        .take(len)
        .collect()
}

pub fn reply_with(score: serde_json::Value, summary: &str, tags: serde_json::Value) -> String {
    json!({ "score": score, "summary": summary, "tags": tags }).to_string()
}

pub fn valid_reply(score: u8) -> String {
    reply_with(
        json!(score),
        &summary_of_len(450),
        json!(["Rust expert", "Senior level", "Computer Science degree"]),
    )
}
