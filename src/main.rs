mod app_state;
mod config;
mod db;
mod models;
mod routes;
mod services;

use axum::{routing::delete, routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use services::{
    ingest::{NoopFeedback, ScanGate},
    metadata::{build_http_client, GoogleBooksProvider, MetadataResolver, OpenLibraryProvider},
    queue::{QueueTiming, ScanQueue},
    reconcile::Reconciler,
    session::SessionGate,
    snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    info!("Initializing shelfscan server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    // Register application metrics
    metrics::describe_counter!("scans_admitted_total", "Scans admitted to the queue");
    metrics::describe_counter!(
        "scans_rejected_total",
        "Scans rejected by the ingestion gate, by reason"
    );
    metrics::describe_counter!(
        "scan_entries_processed_total",
        "Queue entries processed, by outcome action"
    );
    metrics::describe_histogram!(
        "scan_processing_seconds",
        "Time to reconcile one scanned ISBN"
    );
    metrics::describe_gauge!("scan_queue_depth", "Unfinished entries in the scan queue");

    // Initialize the inventory database
    info!("Opening inventory database");
    let db_pool = db::init_pool(&config.database_path)
        .await
        .expect("Failed to open inventory database");

    info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Metadata providers, queried in fixed priority order
    let http = build_http_client(std::time::Duration::from_secs(config.http_timeout_secs))
        .expect("Failed to build HTTP client");
    let resolver = MetadataResolver::new(vec![
        Box::new(GoogleBooksProvider::new(
            http.clone(),
            config.google_books_api_key.clone(),
        )),
        Box::new(OpenLibraryProvider::new(http)),
    ]);
    let reconciler = Arc::new(Reconciler::new(db_pool.clone(), resolver));

    // Queue snapshot persistence, degrading to memory-only when the
    // configured location is unusable
    let snapshot_store: Arc<dyn SnapshotStore> =
        match FileSnapshotStore::new(config.snapshot_path.clone()) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(
                    path = %config.snapshot_path.display(),
                    error = %e,
                    "snapshot location unusable, queue state will not survive restarts"
                );
                Arc::new(MemorySnapshotStore::default())
            }
        };

    // Restore the queue; unfinished work waits for the operator's
    // resume-or-discard decision before the drain loop starts
    let queue = Arc::new(
        ScanQueue::restore(snapshot_store, reconciler, QueueTiming::default()).await,
    );
    let pending = queue.pending_count().await;
    let session = SessionGate::new(pending > 0);
    if pending > 0 {
        info!(
            pending,
            "unfinished scans from a previous session, awaiting resume or discard"
        );
    }

    let gate = ScanGate::new(Arc::clone(&queue), Box::new(NoopFeedback));

    let state = AppState::new(db_pool, Arc::clone(&queue), gate, session);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/scan", post(routes::scan::submit_scan))
        .route("/api/v1/queue", get(routes::scan::queue_view))
        .route("/api/v1/queue/start", post(routes::scan::start_queue))
        .route("/api/v1/queue/stop", post(routes::scan::stop_queue))
        .route("/api/v1/queue/clear", post(routes::scan::clear_queue))
        .route("/api/v1/queue/{code}", delete(routes::scan::remove_entry))
        .route("/api/v1/stats/reset", post(routes::scan::reset_stats))
        .route("/api/v1/session", get(routes::session::session_view))
        .route("/api/v1/session/resume", post(routes::session::resume_session))
        .route("/api/v1/session/discard", post(routes::session::discard_session))
        .route("/api/v1/books", get(routes::books::list_books))
        .route("/api/v1/books/{isbn}", get(routes::books::get_book))
        .with_state(state)
        .route(
            "/metrics",
            get(move || async move { prometheus_handle.render() }),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024)); // scan payloads are tiny

    info!("Starting shelfscan on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Session-close interception: unfinished work is durable, tell the
    // operator it will be back next start.
    queue.stop_processing().await;
    let pending = queue.pending_count().await;
    if pending > 0 {
        warn!(
            pending,
            "shutting down with unfinished scans; they are persisted and will prompt for resume next start"
        );
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("shutdown signal received");
}
