use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::book::{Book, BookSource, NewBook};

const BOOK_COLUMNS: &str = "id, isbn, title, author, publisher, cover_url, summary, \
                            quantity, source, is_pending, error_reason, scanned_at, updated_at";

fn book_from_row(row: &SqliteRow) -> Result<Book, sqlx::Error> {
    let id_text: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|e| sqlx::Error::ColumnDecode {
        index: "id".into(),
        source: Box::new(e),
    })?;

    let source_text: String = row.try_get("source")?;
    let source = BookSource::from_str(&source_text).map_err(|e| sqlx::Error::ColumnDecode {
        index: "source".into(),
        source: Box::new(e),
    })?;

    Ok(Book {
        id,
        isbn: row.try_get("isbn")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        publisher: row.try_get("publisher")?,
        cover_url: row.try_get("cover_url")?,
        summary: row.try_get("summary")?,
        quantity: row.try_get("quantity")?,
        source,
        is_pending: row.try_get("is_pending")?,
        error_reason: row.try_get("error_reason")?,
        scanned_at: row.try_get("scanned_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Look up a book by normalized ISBN. `Ok(None)` is the distinguishable
/// "not found" outcome; `Err` is a store failure.
pub async fn find_book_by_isbn(
    pool: &SqlitePool,
    isbn: &str,
) -> Result<Option<Book>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {BOOK_COLUMNS} FROM books WHERE isbn = ?"
    ))
    .bind(isbn)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(book_from_row).transpose()
}

/// Insert a new inventory row with `quantity = 1`.
pub async fn insert_book(pool: &SqlitePool, new: &NewBook) -> Result<Book, sqlx::Error> {
    let now = Utc::now();
    let row = sqlx::query(&format!(
        "INSERT INTO books (id, isbn, title, author, publisher, cover_url, summary, \
                            quantity, source, is_pending, error_reason, scanned_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?, ?) \
         RETURNING {BOOK_COLUMNS}"
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(&new.isbn)
    .bind(&new.title)
    .bind(&new.author)
    .bind(&new.publisher)
    .bind(&new.cover_url)
    .bind(&new.summary)
    .bind(new.source.to_string())
    .bind(new.is_pending)
    .bind(&new.error_reason)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    book_from_row(&row)
}

/// Increment a book's quantity by one and refresh `updated_at`.
pub async fn increment_quantity(pool: &SqlitePool, isbn: &str) -> Result<Book, sqlx::Error> {
    let row = sqlx::query(&format!(
        "UPDATE books SET quantity = quantity + 1, updated_at = ? WHERE isbn = ? \
         RETURNING {BOOK_COLUMNS}"
    ))
    .bind(Utc::now())
    .bind(isbn)
    .fetch_one(pool)
    .await?;

    book_from_row(&row)
}

/// List inventory rows, most recently updated first. `pending_only` narrows
/// to shadow records awaiting curation.
pub async fn list_books(
    pool: &SqlitePool,
    pending_only: bool,
) -> Result<Vec<Book>, sqlx::Error> {
    let sql = if pending_only {
        format!("SELECT {BOOK_COLUMNS} FROM books WHERE is_pending = 1 ORDER BY updated_at DESC")
    } else {
        format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY updated_at DESC")
    };

    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(book_from_row).collect()
}
