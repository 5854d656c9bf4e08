//! Scan ingestion gate: normalization, shape check, and debounce between the
//! barcode source and the queue.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use strum::Display;
use tokio::time::Instant;
use tracing::debug;

use crate::services::queue::ScanQueue;

/// Repeated identical scans inside this window are ignored.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(2);

/// Why a raw detection was not admitted. A rejection is a normal filtering
/// outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ScanRejection {
    NotIsbnShaped,
    DebouncedDuplicate,
    AlreadyQueued,
}

/// Host-device feedback requested on admission. Best-effort; the trait is
/// infallible and the server default does nothing.
pub trait FeedbackSink: Send + Sync {
    fn pulse(&self);
}

pub struct NoopFeedback;

impl FeedbackSink for NoopFeedback {
    fn pulse(&self) {}
}

/// Strip everything outside the ISBN alphabet (digits and the X checksum
/// character) and uppercase.
pub fn normalize_isbn(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Single-slot debounce state: only the most recent admission is remembered,
/// so alternating scans of two different codes are not debounced against
/// each other.
struct LastAdmission {
    code: String,
    at: Instant,
}

pub struct ScanGate {
    queue: Arc<ScanQueue>,
    feedback: Box<dyn FeedbackSink>,
    last_admission: Mutex<Option<LastAdmission>>,
    window: Duration,
}

impl ScanGate {
    pub fn new(queue: Arc<ScanQueue>, feedback: Box<dyn FeedbackSink>) -> Self {
        Self::with_window(queue, feedback, DEBOUNCE_WINDOW)
    }

    pub fn with_window(
        queue: Arc<ScanQueue>,
        feedback: Box<dyn FeedbackSink>,
        window: Duration,
    ) -> Self {
        Self {
            queue,
            feedback,
            last_admission: Mutex::new(None),
            window,
        }
    }

    /// Admit one raw detection from the barcode source. Returns the
    /// normalized code on admission, or the rejection reason.
    pub async fn admit(&self, raw: &str) -> Result<String, ScanRejection> {
        let code = normalize_isbn(raw);
        if code.len() != 10 && code.len() != 13 {
            debug!(raw, code, "detection is not ISBN-shaped");
            metrics::counter!("scans_rejected_total", "reason" => ScanRejection::NotIsbnShaped.to_string())
                .increment(1);
            return Err(ScanRejection::NotIsbnShaped);
        }

        {
            let last = self.last_admission.lock().expect("debounce lock poisoned");
            if let Some(last) = last.as_ref() {
                if last.code == code && last.at.elapsed() < self.window {
                    debug!(code, "debounced duplicate scan");
                    metrics::counter!("scans_rejected_total", "reason" => ScanRejection::DebouncedDuplicate.to_string())
                        .increment(1);
                    return Err(ScanRejection::DebouncedDuplicate);
                }
            }
        }

        if !self.queue.enqueue(&code).await {
            metrics::counter!("scans_rejected_total", "reason" => ScanRejection::AlreadyQueued.to_string())
                .increment(1);
            return Err(ScanRejection::AlreadyQueued);
        }

        *self.last_admission.lock().expect("debounce lock poisoned") = Some(LastAdmission {
            code: code.clone(),
            at: Instant::now(),
        });

        metrics::counter!("scans_admitted_total").increment(1);
        self.feedback.pulse();
        Ok(code)
    }
}
