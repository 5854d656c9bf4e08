use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::{ingest::ScanGate, queue::ScanQueue, session::SessionGate};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub queue: Arc<ScanQueue>,
    pub gate: Arc<ScanGate>,
    pub session: Arc<SessionGate>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        queue: Arc<ScanQueue>,
        gate: ScanGate,
        session: SessionGate,
    ) -> Self {
        Self {
            db,
            queue,
            gate: Arc::new(gate),
            session: Arc::new(session),
        }
    }
}
