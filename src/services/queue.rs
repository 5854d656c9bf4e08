//! The scan queue store and its serial drain loop.
//!
//! All mutations go through this store's methods; the drain loop is the only
//! writer of entry status transitions, which is what upholds the at-most-one
//! `Processing` entry invariant without per-entry locking. Every mutation is
//! persisted through the snapshot store so `Pending` and `Failed` entries
//! survive a restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::models::queue::{
    QueueSnapshot, QueueStatus, QueueView, ScanEntry, ScanOutcome, ScanStatus,
};
use crate::services::reconcile::Reconciler;
use crate::services::snapshot::SnapshotStore;

/// Drain-loop timing. The pacing delay is a politeness mechanism toward the
/// metadata providers, not an implementation artifact.
#[derive(Debug, Clone, Copy)]
pub struct QueueTiming {
    /// Fixed delay between queue entries.
    pub pace: Duration,
    /// How long a `Success` entry stays visible before removal.
    pub removal_grace: Duration,
}

impl Default for QueueTiming {
    fn default() -> Self {
        Self {
            pace: Duration::from_millis(1500),
            removal_grace: Duration::from_secs(1),
        }
    }
}

struct QueueState {
    entries: Vec<ScanEntry>,
    scanned_count: u64,
    success_count: u64,
    failed_count: u64,
    status: QueueStatus,
    /// True while a drain loop task is alive, including one that is still
    /// finishing an in-flight entry after `stop_processing`.
    drain_running: bool,
    /// Scheduled success removals by code; aborted on clear.
    removal_tasks: HashMap<String, JoinHandle<()>>,
}

impl QueueState {
    fn from_snapshot(snapshot: QueueSnapshot) -> Self {
        Self {
            entries: snapshot.entries,
            scanned_count: snapshot.scanned_count,
            success_count: snapshot.success_count,
            failed_count: snapshot.failed_count,
            status: QueueStatus::Idle,
            drain_running: false,
            removal_tasks: HashMap::new(),
        }
    }

    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            entries: self.entries.clone(),
            scanned_count: self.scanned_count,
            success_count: self.success_count,
            failed_count: self.failed_count,
        }
        .normalize()
    }

    fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == ScanStatus::Pending)
            .count()
    }
}

struct QueueCore {
    state: Mutex<QueueState>,
    store: Arc<dyn SnapshotStore>,
    reconciler: Arc<Reconciler>,
    timing: QueueTiming,
}

impl QueueCore {
    async fn persist(&self, snapshot: QueueSnapshot) {
        metrics::gauge!("scan_queue_depth").set(snapshot.pending_count() as f64);
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(error = %e, "failed to persist queue snapshot, continuing in memory");
        }
    }
}

/// The persisted scan queue. Cheap to share via `Arc`; constructed once per
/// process.
pub struct ScanQueue {
    core: Arc<QueueCore>,
}

impl ScanQueue {
    /// Construct the queue, restoring persisted state. An unreadable
    /// snapshot is logged and treated as an empty queue.
    pub async fn restore(
        store: Arc<dyn SnapshotStore>,
        reconciler: Arc<Reconciler>,
        timing: QueueTiming,
    ) -> Self {
        let snapshot = match store.load().await {
            Ok(Some(snapshot)) => snapshot.normalize(),
            Ok(None) => QueueSnapshot::default(),
            Err(e) => {
                warn!(error = %e, "failed to load queue snapshot, starting empty");
                QueueSnapshot::default()
            }
        };

        if !snapshot.entries.is_empty() {
            info!(
                entries = snapshot.entries.len(),
                pending = snapshot.pending_count(),
                "restored queue snapshot"
            );
        }

        Self {
            core: Arc::new(QueueCore {
                state: Mutex::new(QueueState::from_snapshot(snapshot)),
                store,
                reconciler,
                timing,
            }),
        }
    }

    /// Append a new `Pending` entry. Returns false when the code is already
    /// pending (the check and the append are one atomic operation). Starts
    /// the drain loop if the queue was idle.
    pub async fn enqueue(&self, code: &str) -> bool {
        let (snapshot, was_idle) = {
            let mut st = self.core.state.lock().await;
            let already_pending = st
                .entries
                .iter()
                .any(|e| e.code == code && e.status == ScanStatus::Pending);
            if already_pending {
                debug!(code, "code already pending in queue");
                return false;
            }
            st.entries.push(ScanEntry::new(code));
            st.scanned_count += 1;
            (st.snapshot(), st.status == QueueStatus::Idle)
        };

        self.core.persist(snapshot).await;

        if was_idle {
            self.start_processing().await;
        }
        true
    }

    /// Start the drain loop. A no-op when it is already running or there is
    /// nothing pending.
    pub async fn start_processing(&self) {
        {
            let mut st = self.core.state.lock().await;
            if st.pending_count() == 0 {
                return;
            }
            if st.drain_running {
                // A loop is still alive (possibly finishing an in-flight
                // entry after a stop); flipping the status keeps it going.
                st.status = QueueStatus::Processing;
                return;
            }
            st.status = QueueStatus::Processing;
            st.drain_running = true;
        }

        info!("queue processing started");
        let core = Arc::clone(&self.core);
        tokio::spawn(drain_loop(core));
    }

    /// Request the drain loop to stop. Cooperative: the in-flight entry runs
    /// to completion and the loop halts at its next decision point.
    pub async fn stop_processing(&self) {
        let mut st = self.core.state.lock().await;
        if st.status == QueueStatus::Processing {
            info!("queue processing stop requested");
        }
        st.status = QueueStatus::Idle;
    }

    /// Drop all entries and reset counters. Outstanding removal timers are
    /// cancelled so a cleared entry cannot be resurrected by a stale timer.
    pub async fn clear(&self) {
        let snapshot = {
            let mut st = self.core.state.lock().await;
            for (_, task) in st.removal_tasks.drain() {
                task.abort();
            }
            st.entries.clear();
            st.scanned_count = 0;
            st.success_count = 0;
            st.failed_count = 0;
            st.status = QueueStatus::Idle;
            st.snapshot()
        };
        info!("queue cleared");
        self.core.persist(snapshot).await;
    }

    /// Remove every entry for a code, cancelling its removal timer.
    pub async fn remove(&self, code: &str) {
        let snapshot = {
            let mut st = self.core.state.lock().await;
            if let Some(task) = st.removal_tasks.remove(code) {
                task.abort();
            }
            let before = st.entries.len();
            st.entries.retain(|e| e.code != code);
            if st.entries.len() == before {
                return;
            }
            st.snapshot()
        };
        self.core.persist(snapshot).await;
    }

    /// Reset counters without touching entries.
    pub async fn reset_stats(&self) {
        let snapshot = {
            let mut st = self.core.state.lock().await;
            st.scanned_count = 0;
            st.success_count = 0;
            st.failed_count = 0;
            st.snapshot()
        };
        self.core.persist(snapshot).await;
    }

    pub async fn view(&self) -> QueueView {
        let st = self.core.state.lock().await;
        QueueView {
            status: st.status,
            entries: st.entries.clone(),
            scanned_count: st.scanned_count,
            processing_count: st
                .entries
                .iter()
                .filter(|e| e.status == ScanStatus::Processing)
                .count() as u64,
            success_count: st.success_count,
            failed_count: st.failed_count,
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.core.state.lock().await.pending_count()
    }

    pub async fn has_pending(&self) -> bool {
        self.pending_count().await > 0
    }
}

/// The serial drain loop: one global loop, one entry at a time.
///
/// State is re-read fresh each iteration rather than trusted from a stale
/// snapshot, so entries cleared or removed mid-cycle are tolerated. The lock
/// is never held across an await.
async fn drain_loop(core: Arc<QueueCore>) {
    loop {
        // Select the oldest pending entry (insertion order) and claim it.
        let code = {
            let mut st = core.state.lock().await;
            if st.status != QueueStatus::Processing {
                st.drain_running = false;
                break;
            }
            let Some(entry) = st
                .entries
                .iter_mut()
                .find(|e| e.status == ScanStatus::Pending)
            else {
                st.status = QueueStatus::Idle;
                st.drain_running = false;
                break;
            };
            entry.status = ScanStatus::Processing;
            entry.code.clone()
        };

        debug!(code, "processing scan entry");
        let started = tokio::time::Instant::now();
        let result = core.reconciler.reconcile(&code).await;
        metrics::histogram!("scan_processing_seconds").record(started.elapsed().as_secs_f64());

        let snapshot = {
            let mut guard = core.state.lock().await;
            let st = &mut *guard;
            let claimed = st
                .entries
                .iter_mut()
                .find(|e| e.code == code && e.status == ScanStatus::Processing);
            match claimed {
                Some(entry) => match result {
                    Ok(outcome) => {
                        metrics::counter!(
                            "scan_entries_processed_total",
                            "action" => outcome.action.to_string()
                        )
                        .increment(1);
                        entry.status = ScanStatus::Success;
                        entry.outcome = Some(outcome);
                        st.success_count += 1;
                        schedule_removal(&core, st, &code);
                    }
                    Err(e) => {
                        error!(code, error = %e, "scan entry failed");
                        metrics::counter!("scan_entries_processed_total", "action" => "error")
                            .increment(1);
                        entry.status = ScanStatus::Failed;
                        entry.outcome = Some(ScanOutcome::error(e.to_string()));
                        st.failed_count += 1;
                    }
                },
                None => debug!(code, "entry removed mid-flight, dropping result"),
            }
            st.snapshot()
        };
        core.persist(snapshot).await;

        // Fixed inter-entry delay; paces calls to the metadata providers.
        sleep(core.timing.pace).await;
    }
    debug!("drain loop exited");
}

/// Schedule removal of a completed entry after the grace period. One timer
/// per code; scheduling again replaces (and aborts) the previous timer.
fn schedule_removal(core: &Arc<QueueCore>, st: &mut QueueState, code: &str) {
    if let Some(previous) = st.removal_tasks.remove(code) {
        previous.abort();
    }

    let core = Arc::clone(core);
    let owned_code = code.to_string();
    let grace = core.timing.removal_grace;
    let handle = tokio::spawn(async move {
        sleep(grace).await;
        prune_success(core, owned_code).await;
    });
    st.removal_tasks.insert(code.to_string(), handle);
}

/// Drop entries for a code that are still `Success`. A re-enqueued lifecycle
/// of the same code is `Pending` or `Processing` and is left untouched.
async fn prune_success(core: Arc<QueueCore>, code: String) {
    let snapshot = {
        let mut st = core.state.lock().await;
        st.removal_tasks.remove(&code);
        let before = st.entries.len();
        st.entries
            .retain(|e| !(e.code == code && e.status == ScanStatus::Success));
        if st.entries.len() == before {
            return;
        }
        st.snapshot()
    };
    core.persist(snapshot).await;
}
