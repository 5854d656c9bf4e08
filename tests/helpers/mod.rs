//! Shared test builders: in-memory database, scripted metadata providers,
//! and queues wired with fast timings.
#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use shelfscan::models::metadata::BookMetadata;
use shelfscan::models::queue::QueueStatus;
use shelfscan::services::metadata::{MetadataProvider, MetadataResolver, ProviderError};
use shelfscan::services::queue::{QueueTiming, ScanQueue};
use shelfscan::services::reconcile::Reconciler;
use shelfscan::services::snapshot::{MemorySnapshotStore, SnapshotStore};

/// Drain-loop timing for tests; all timing tests run under tokio's paused
/// clock, so these are virtual milliseconds.
pub const FAST: QueueTiming = QueueTiming {
    pace: Duration::from_millis(10),
    removal_grace: Duration::from_millis(1000),
};

/// In-memory SQLite with migrations applied. A single connection so every
/// query sees the same database.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    shelfscan::db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

pub fn metadata(title: &str) -> BookMetadata {
    BookMetadata {
        title: title.to_string(),
        author: None,
        publisher: None,
        cover_url: None,
        summary: None,
    }
}

#[derive(Clone)]
pub enum Script {
    Found(&'static str),
    NotFound,
    Fail,
}

/// A provider that answers from a script, records the ISBNs it saw (in
/// order), and optionally takes virtual time per lookup.
pub struct ScriptedProvider {
    name: &'static str,
    script: Script,
    delay: Duration,
    pub seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    pub fn new(name: &'static str, script: Script) -> Self {
        Self {
            name,
            script,
            delay: Duration::ZERO,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl MetadataProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn lookup(&self, isbn: &str) -> Result<Option<BookMetadata>, ProviderError> {
        self.seen.lock().unwrap().push(isbn.to_string());
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        match &self.script {
            Script::Found(title) => Ok(Some(metadata(title))),
            Script::NotFound => Ok(None),
            Script::Fail => Err(ProviderError::Status(
                reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            )),
        }
    }
}

pub fn resolver(providers: Vec<ScriptedProvider>) -> MetadataResolver {
    MetadataResolver::new(
        providers
            .into_iter()
            .map(|p| Box::new(p) as Box<dyn MetadataProvider>)
            .collect(),
    )
}

pub fn reconciler(pool: &SqlitePool, providers: Vec<ScriptedProvider>) -> Arc<Reconciler> {
    Arc::new(Reconciler::new(pool.clone(), resolver(providers)))
}

/// Queue over an in-memory snapshot store with fast timings.
pub async fn fast_queue(
    pool: &SqlitePool,
    providers: Vec<ScriptedProvider>,
) -> (Arc<ScanQueue>, Arc<MemorySnapshotStore>) {
    let store = Arc::new(MemorySnapshotStore::default());
    let queue = ScanQueue::restore(
        store.clone() as Arc<dyn SnapshotStore>,
        reconciler(pool, providers),
        FAST,
    )
    .await;
    (Arc::new(queue), store)
}

/// Poll until the drain loop reports idle.
pub async fn wait_for_idle(queue: &ScanQueue) {
    for _ in 0..500 {
        if queue.view().await.status == QueueStatus::Idle {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("queue did not go idle in time");
}

/// Poll until `predicate` holds against the queue view.
pub async fn wait_until<F>(queue: &ScanQueue, predicate: F)
where
    F: Fn(&shelfscan::models::queue::QueueView) -> bool,
{
    for _ in 0..500 {
        if predicate(&queue.view().await) {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("queue never reached the expected state");
}
