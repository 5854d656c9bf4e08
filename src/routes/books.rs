use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::error;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::book::Book;

#[derive(Debug, Deserialize)]
pub struct BooksQuery {
    /// Narrow the listing to shadow records awaiting manual curation.
    #[serde(default)]
    pub pending: bool,
}

/// GET /api/v1/books — inventory listing, most recently updated first.
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BooksQuery>,
) -> Result<Json<Vec<Book>>, StatusCode> {
    queries::list_books(&state.db, query.pending)
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, "failed to list books");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// GET /api/v1/books/{isbn} — one record by normalized ISBN.
pub async fn get_book(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
) -> Result<Json<Book>, StatusCode> {
    match queries::find_book_by_isbn(&state.db, &isbn).await {
        Ok(Some(book)) => Ok(Json(book)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!(isbn, error = %e, "failed to fetch book");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
