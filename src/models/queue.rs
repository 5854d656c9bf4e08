use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::models::book::BookSummary;

/// Status of one scan entry in the queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

/// Overall state of the drain loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueueStatus {
    Idle,
    Processing,
}

/// User-facing outcome vocabulary, stable across the system.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScanAction {
    Added,
    Incremented,
    Pending,
    Error,
}

/// Outcome attached to an entry once it leaves `Pending`/`Processing`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanOutcome {
    pub action: ScanAction,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<BookSummary>,
}

impl ScanOutcome {
    /// Outcome for a reconciliation that failed outright.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            action: ScanAction::Error,
            message: message.into(),
            book: None,
        }
    }
}

/// One unit of work produced by the ingestion gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEntry {
    pub code: String,
    pub enqueued_at: DateTime<Utc>,
    pub status: ScanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ScanOutcome>,
}

impl ScanEntry {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            enqueued_at: Utc::now(),
            status: ScanStatus::Pending,
            outcome: None,
        }
    }
}

/// The persisted projection of the queue. Live `Processing` status and the
/// drain-loop state are in-memory only; `normalize` rolls them back so a
/// restart never resumes in a falsely busy state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub entries: Vec<ScanEntry>,
    pub scanned_count: u64,
    pub success_count: u64,
    pub failed_count: u64,
}

impl QueueSnapshot {
    /// Roll any `Processing` entry back to `Pending`.
    pub fn normalize(mut self) -> Self {
        for entry in &mut self.entries {
            if entry.status == ScanStatus::Processing {
                entry.status = ScanStatus::Pending;
            }
        }
        self
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == ScanStatus::Pending)
            .count()
    }
}

/// Read model returned by `GET /api/v1/queue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueView {
    pub status: QueueStatus,
    pub entries: Vec<ScanEntry>,
    pub scanned_count: u64,
    pub processing_count: u64,
    pub success_count: u64,
    pub failed_count: u64,
}
