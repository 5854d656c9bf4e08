use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// How a record entered the inventory. `Manual` is reserved for the
/// out-of-band curation flow that enriches pending records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookSource {
    Api,
    Manual,
}

/// One inventory row, addressed by normalized ISBN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub isbn: String,
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub cover_url: Option<String>,
    pub summary: Option<String>,
    pub quantity: i64,
    pub source: BookSource,
    /// True for shadow records created when no provider returned metadata.
    pub is_pending: bool,
    pub error_reason: Option<String>,
    pub scanned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a new inventory row.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub isbn: String,
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub cover_url: Option<String>,
    pub summary: Option<String>,
    pub source: BookSource,
    pub is_pending: bool,
    pub error_reason: Option<String>,
}

/// The slice of a record carried on scan outcomes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookSummary {
    pub id: Uuid,
    pub isbn: String,
    pub title: String,
    pub quantity: i64,
    pub is_pending: bool,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            isbn: book.isbn.clone(),
            title: book.title.clone(),
            quantity: book.quantity,
            is_pending: book.is_pending,
        }
    }
}
