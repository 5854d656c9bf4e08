//! Inventory reconciliation: find-or-create-or-increment by ISBN.
//!
//! The lookup → increment → resolve → insert order defines the system's
//! dedup-and-accumulate semantics and must not be reordered. The
//! read-then-write is not transactional against other writers of the same
//! ISBN; this deployment is single-writer (see DESIGN.md).

use sqlx::SqlitePool;
use tracing::info;

use crate::db::queries;
use crate::models::book::{BookSource, BookSummary, NewBook};
use crate::models::queue::{ScanAction, ScanOutcome};
use crate::services::metadata::MetadataResolver;

/// Diagnostic recorded on shadow records.
const PENDING_ERROR_REASON: &str = "no metadata from any provider";

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("inventory store error: {0}")]
    Persistence(#[from] sqlx::Error),
}

/// Serially invoked by the drain loop, one ISBN at a time.
pub struct Reconciler {
    db: SqlitePool,
    resolver: MetadataResolver,
}

impl Reconciler {
    pub fn new(db: SqlitePool, resolver: MetadataResolver) -> Self {
        Self { db, resolver }
    }

    /// Reconcile one scanned ISBN against the inventory.
    ///
    /// - Already present: quantity + 1 → `incremented`
    /// - Absent, metadata found: full record with quantity 1 → `added`
    /// - Absent, no metadata: shadow record flagged `is_pending` → `pending`
    ///
    /// Store failures surface as `ReconcileError::Persistence`; the caller
    /// marks the entry failed and reports the cause.
    pub async fn reconcile(&self, isbn: &str) -> Result<ScanOutcome, ReconcileError> {
        if let Some(existing) = queries::find_book_by_isbn(&self.db, isbn).await? {
            let updated = queries::increment_quantity(&self.db, isbn).await?;
            info!(isbn, title = %updated.title, quantity = updated.quantity, "book incremented");
            return Ok(ScanOutcome {
                action: ScanAction::Incremented,
                message: format!(
                    "\"{}\" already in inventory, quantity now {}",
                    existing.title, updated.quantity
                ),
                book: Some(BookSummary::from(&updated)),
            });
        }

        info!(isbn, "new book, resolving metadata");
        match self.resolver.resolve(isbn).await {
            Some(metadata) => {
                let book = queries::insert_book(
                    &self.db,
                    &NewBook {
                        isbn: isbn.to_string(),
                        title: metadata.title,
                        author: metadata.author,
                        publisher: metadata.publisher,
                        cover_url: metadata.cover_url,
                        summary: metadata.summary,
                        source: BookSource::Api,
                        is_pending: false,
                        error_reason: None,
                    },
                )
                .await?;
                info!(isbn, title = %book.title, "book added");
                Ok(ScanOutcome {
                    action: ScanAction::Added,
                    message: format!("\"{}\" added to inventory", book.title),
                    book: Some(BookSummary::from(&book)),
                })
            }
            None => {
                let book = queries::insert_book(
                    &self.db,
                    &NewBook {
                        isbn: isbn.to_string(),
                        title: format!("Unidentified book (ISBN: {isbn})"),
                        author: None,
                        publisher: None,
                        cover_url: None,
                        summary: None,
                        source: BookSource::Api,
                        is_pending: true,
                        error_reason: Some(PENDING_ERROR_REASON.to_string()),
                    },
                )
                .await?;
                info!(isbn, "no metadata found, created pending record");
                Ok(ScanOutcome {
                    action: ScanAction::Pending,
                    message: format!(
                        "ISBN {isbn} could not be identified; created a pending record"
                    ),
                    book: Some(BookSummary::from(&book)),
                })
            }
        }
    }
}
