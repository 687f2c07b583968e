//! Error taxonomy (spec.md §7).
//!
//! Validation failures never propagate as `Result` errors — they become
//! data (`Verdict.error`, `FieldResult`). These enums exist for the
//! collaborator boundaries that *can* legitimately fail an orchestration
//! step: probing transport, store I/O, and queue I/O.

use thiserror::Error;

/// Transport-level failure from the HTTP prober. Never surfaced as a
/// verdict directly — the validator folds it into `Verdict::invalid`.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ProbeError {
    pub message: String,
}

impl ProbeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    #[error("failed to read from store: {0}")]
    Read(String),
    #[error("failed to write to store: {0}")]
    Write(String),
    #[error("URL does not match expected value")]
    Conflict,
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("failed to receive messages: {0}")]
    Receive(String),
    #[error("failed to acknowledge message {id}: {reason}")]
    Ack { id: String, reason: String },
    #[error("failed to send message: {0}")]
    Send(String),
}

#[derive(Error, Debug)]
pub enum GuardianError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("report not found: {0}")]
    ReportNotFound(String),
}
