//! Session resume controller.
//!
//! When the restored snapshot still holds `Pending` entries the operator is
//! asked once whether to resume or discard them; the drain loop stays
//! stopped until either answer arrives or a fresh scan is admitted.

use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot decision latch. Only the first answer takes effect; the prompt
/// is never re-raised within a session, even if queue state changes later.
pub struct SessionGate {
    needs_decision: AtomicBool,
}

impl SessionGate {
    pub fn new(has_pending: bool) -> Self {
        Self {
            needs_decision: AtomicBool::new(has_pending),
        }
    }

    pub fn needs_decision(&self) -> bool {
        self.needs_decision.load(Ordering::Acquire)
    }

    /// Consume the prompt. Returns false when no decision was outstanding.
    pub fn decide(&self) -> bool {
        self.needs_decision
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
