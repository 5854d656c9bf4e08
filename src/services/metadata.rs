//! Metadata resolution with multi-provider fallback.
//!
//! Providers are queried strictly in order; the first response carrying a
//! non-empty title wins. A provider error and a provider no-answer both
//! advance the chain — resolution only fails once every provider has been
//! exhausted. Field mapping is provider-specific and each optional field has
//! its own fixed alias fallback order.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::metadata::BookMetadata;

/// Resolved metadata is reused for this long per ISBN.
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Error type for a single provider call. Distinguishable in diagnostics,
/// but treated the same as "no answer" by the resolver's control flow.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

/// A single metadata source queried by ISBN.
///
/// `Ok(None)` means the provider has no answer for this ISBN (expected,
/// not an error); `Err` means the call itself failed.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn lookup(&self, isbn: &str) -> Result<Option<BookMetadata>, ProviderError>;
}

/// Build the shared HTTP client used by all providers.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("shelfscan/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

// ── Google Books (primary) ───────────────────────────────────────────

#[derive(Deserialize)]
struct VolumesResponse {
    items: Option<Vec<Volume>>,
}

#[derive(Deserialize)]
struct Volume {
    #[serde(rename = "volumeInfo")]
    volume_info: VolumeInfo,
}

#[derive(Deserialize, Default)]
struct VolumeInfo {
    title: Option<String>,
    authors: Option<Vec<String>>,
    publisher: Option<String>,
    description: Option<String>,
    #[serde(rename = "imageLinks")]
    image_links: Option<ImageLinks>,
}

#[derive(Deserialize, Default)]
struct ImageLinks {
    thumbnail: Option<String>,
    #[serde(rename = "smallThumbnail")]
    small_thumbnail: Option<String>,
}

pub struct GoogleBooksProvider {
    http: Client,
    api_key: Option<String>,
}

impl GoogleBooksProvider {
    pub fn new(http: Client, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl MetadataProvider for GoogleBooksProvider {
    fn name(&self) -> &'static str {
        "google-books"
    }

    async fn lookup(&self, isbn: &str) -> Result<Option<BookMetadata>, ProviderError> {
        let mut url = format!("https://www.googleapis.com/books/v1/volumes?q=isbn:{isbn}");
        if let Some(key) = &self.api_key {
            url.push_str("&key=");
            url.push_str(key);
        }

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status()));
        }

        let volumes: VolumesResponse = response.json().await?;
        let Some(volume) = volumes.items.and_then(|mut items| {
            if items.is_empty() {
                None
            } else {
                Some(items.swap_remove(0))
            }
        }) else {
            return Ok(None);
        };

        Ok(map_google_volume(volume.volume_info))
    }
}

/// Map a Google Books volume to metadata. A missing title means no answer.
fn map_google_volume(info: VolumeInfo) -> Option<BookMetadata> {
    let title = info.title.filter(|t| !t.trim().is_empty())?;

    let cover_url = info
        .image_links
        .and_then(|links| links.thumbnail.or(links.small_thumbnail))
        .map(|url| url.replacen("http:", "https:", 1));

    Some(BookMetadata {
        title,
        author: info.authors.map(|a| a.join(", ")),
        publisher: info.publisher,
        cover_url,
        summary: info.description,
    })
}

// ── Open Library (secondary) ─────────────────────────────────────────

#[derive(Deserialize, Default)]
struct OpenLibraryVolume {
    title: Option<String>,
    authors: Option<Vec<NamedEntity>>,
    publishers: Option<Vec<NamedEntity>>,
    cover: Option<OpenLibraryCover>,
    excerpts: Option<Vec<Excerpt>>,
    notes: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct NamedEntity {
    name: String,
}

#[derive(Deserialize, Default)]
struct OpenLibraryCover {
    large: Option<String>,
    medium: Option<String>,
    small: Option<String>,
}

#[derive(Deserialize)]
struct Excerpt {
    text: Option<String>,
}

pub struct OpenLibraryProvider {
    http: Client,
}

impl OpenLibraryProvider {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl MetadataProvider for OpenLibraryProvider {
    fn name(&self) -> &'static str {
        "open-library"
    }

    async fn lookup(&self, isbn: &str) -> Result<Option<BookMetadata>, ProviderError> {
        let url = format!(
            "https://openlibrary.org/api/books?bibkeys=ISBN:{isbn}&format=json&jscmd=data"
        );

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status()));
        }

        // Response is keyed by the requested bibkey: { "ISBN:…": { … } }
        let mut payload: HashMap<String, OpenLibraryVolume> = response.json().await?;
        let Some(volume) = payload.remove(&format!("ISBN:{isbn}")) else {
            return Ok(None);
        };

        Ok(map_open_library_volume(volume))
    }
}

/// Map an Open Library `jscmd=data` volume to metadata.
fn map_open_library_volume(volume: OpenLibraryVolume) -> Option<BookMetadata> {
    let title = volume.title.filter(|t| !t.trim().is_empty())?;

    let author = volume.authors.and_then(|authors| {
        let names: Vec<String> = authors.into_iter().map(|a| a.name).collect();
        if names.is_empty() {
            None
        } else {
            Some(names.join(", "))
        }
    });

    let publisher = volume
        .publishers
        .and_then(|mut p| if p.is_empty() { None } else { Some(p.swap_remove(0).name) });

    let cover_url = volume
        .cover
        .and_then(|c| c.large.or(c.medium).or(c.small));

    let summary = volume
        .excerpts
        .and_then(|mut e| if e.is_empty() { None } else { e.swap_remove(0).text })
        .or_else(|| match volume.notes {
            Some(serde_json::Value::String(notes)) => Some(notes),
            _ => None,
        });

    Some(BookMetadata {
        title,
        author,
        publisher,
        cover_url,
        summary,
    })
}

// ── Resolver ─────────────────────────────────────────────────────────

struct CacheEntry {
    resolved_at: Instant,
    metadata: BookMetadata,
}

/// Queries providers in a fixed priority order and caches successful
/// resolutions for 24 hours per ISBN.
pub struct MetadataResolver {
    providers: Vec<Box<dyn MetadataProvider>>,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl MetadataResolver {
    pub fn new(providers: Vec<Box<dyn MetadataProvider>>) -> Self {
        Self {
            providers,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve metadata for an ISBN, or `None` once every provider has been
    /// exhausted without a usable answer.
    pub async fn resolve(&self, isbn: &str) -> Option<BookMetadata> {
        if let Some(hit) = self.cached(isbn) {
            debug!(isbn, "metadata cache hit");
            return Some(hit);
        }

        for provider in &self.providers {
            match provider.lookup(isbn).await {
                Ok(Some(metadata)) => {
                    info!(provider = provider.name(), isbn, title = %metadata.title, "metadata resolved");
                    self.store(isbn, metadata.clone());
                    return Some(metadata);
                }
                Ok(None) => {
                    debug!(provider = provider.name(), isbn, "provider has no answer");
                }
                Err(e) => {
                    warn!(provider = provider.name(), isbn, error = %e, "provider lookup failed");
                }
            }
        }

        debug!(isbn, "no provider returned metadata");
        None
    }

    fn cached(&self, isbn: &str) -> Option<BookMetadata> {
        let cache = self.cache.lock().expect("metadata cache poisoned");
        cache
            .get(isbn)
            .filter(|entry| entry.resolved_at.elapsed() < CACHE_TTL)
            .map(|entry| entry.metadata.clone())
    }

    fn store(&self, isbn: &str, metadata: BookMetadata) {
        let mut cache = self.cache.lock().expect("metadata cache poisoned");
        cache.insert(
            isbn.to_string(),
            CacheEntry {
                resolved_at: Instant::now(),
                metadata,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn google_info(json: &str) -> VolumeInfo {
        serde_json::from_str(json).unwrap()
    }

    fn open_library_volume(json: &str) -> OpenLibraryVolume {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_google_mapping_joins_authors_and_rewrites_cover_scheme() {
        let info = google_info(
            r#"{
                "title": "Design Patterns",
                "authors": ["Gamma", "Helm", "Johnson", "Vlissides"],
                "publisher": "Addison-Wesley",
                "description": "Elements of reusable object-oriented software.",
                "imageLinks": {"thumbnail": "http://books.google.com/dp.jpg"}
            }"#,
        );
        let metadata = map_google_volume(info).unwrap();
        assert_eq!(metadata.author.as_deref(), Some("Gamma, Helm, Johnson, Vlissides"));
        assert_eq!(
            metadata.cover_url.as_deref(),
            Some("https://books.google.com/dp.jpg")
        );
    }

    #[test]
    fn test_google_mapping_falls_back_to_small_thumbnail() {
        let info = google_info(
            r#"{"title": "X", "imageLinks": {"smallThumbnail": "http://g.co/s.jpg"}}"#,
        );
        let metadata = map_google_volume(info).unwrap();
        assert_eq!(metadata.cover_url.as_deref(), Some("https://g.co/s.jpg"));
    }

    #[test]
    fn test_google_mapping_requires_title() {
        assert!(map_google_volume(google_info(r#"{"authors": ["A"]}"#)).is_none());
        assert!(map_google_volume(google_info(r#"{"title": "  "}"#)).is_none());
    }

    #[test]
    fn test_open_library_mapping_alias_chains() {
        let volume = open_library_volume(
            r#"{
                "title": "The C Programming Language",
                "authors": [{"name": "Kernighan"}, {"name": "Ritchie"}],
                "publishers": [{"name": "Prentice Hall"}],
                "cover": {"medium": "https://covers.openlibrary.org/m.jpg"},
                "notes": "Second edition."
            }"#,
        );
        let metadata = map_open_library_volume(volume).unwrap();
        assert_eq!(metadata.author.as_deref(), Some("Kernighan, Ritchie"));
        assert_eq!(metadata.publisher.as_deref(), Some("Prentice Hall"));
        // No `large` cover, so `medium` wins; no excerpts, so notes become the summary.
        assert_eq!(
            metadata.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/m.jpg")
        );
        assert_eq!(metadata.summary.as_deref(), Some("Second edition."));
    }

    #[test]
    fn test_open_library_mapping_prefers_excerpt_over_notes() {
        let volume = open_library_volume(
            r#"{
                "title": "X",
                "excerpts": [{"text": "Opening line."}],
                "notes": {"type": "/type/text", "value": "structured"}
            }"#,
        );
        let metadata = map_open_library_volume(volume).unwrap();
        assert_eq!(metadata.summary.as_deref(), Some("Opening line."));
    }

    #[test]
    fn test_open_library_mapping_requires_title() {
        assert!(map_open_library_volume(open_library_volume(r#"{}"#)).is_none());
    }

    // ── Resolver control flow ────────────────────────────────────────

    enum Script {
        Found(&'static str),
        NoAnswer,
        Fail,
    }

    struct ScriptedProvider {
        name: &'static str,
        script: Script,
        calls: std::sync::Arc<AtomicUsize>,
    }

    impl ScriptedProvider {
        fn new(name: &'static str, script: Script) -> Self {
            Self {
                name,
                script,
                calls: std::sync::Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl MetadataProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn lookup(&self, _isbn: &str) -> Result<Option<BookMetadata>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Found(title) => Ok(Some(BookMetadata {
                    title: (*title).to_string(),
                    author: None,
                    publisher: None,
                    cover_url: None,
                    summary: None,
                })),
                Script::NoAnswer => Ok(None),
                Script::Fail => Err(ProviderError::Status(
                    reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                )),
            }
        }
    }

    #[tokio::test]
    async fn test_primary_answer_short_circuits_secondary() {
        let secondary = ScriptedProvider::new("secondary", Script::Found("From Secondary"));
        let secondary_calls = secondary.calls.clone();
        let resolver = MetadataResolver::new(vec![
            Box::new(ScriptedProvider::new("primary", Script::Found("From Primary"))),
            Box::new(secondary),
        ]);

        let metadata = resolver.resolve("9780131103627").await.unwrap();
        assert_eq!(metadata.title, "From Primary");
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_error_advances_chain() {
        let resolver = MetadataResolver::new(vec![
            Box::new(ScriptedProvider::new("primary", Script::Fail)),
            Box::new(ScriptedProvider::new("secondary", Script::Found("Design Patterns"))),
        ]);

        let metadata = resolver.resolve("9780201633610").await.unwrap();
        assert_eq!(metadata.title, "Design Patterns");
    }

    #[tokio::test]
    async fn test_all_providers_exhausted_is_not_found() {
        let resolver = MetadataResolver::new(vec![
            Box::new(ScriptedProvider::new("primary", Script::NoAnswer)),
            Box::new(ScriptedProvider::new("secondary", Script::Fail)),
        ]);

        assert!(resolver.resolve("9780131103627").await.is_none());
    }

    #[tokio::test]
    async fn test_successful_resolution_is_cached() {
        let primary = ScriptedProvider::new("primary", Script::Found("Cached"));
        let calls = primary.calls.clone();
        let resolver = MetadataResolver::new(vec![Box::new(primary)]);

        assert!(resolver.resolve("9780131103627").await.is_some());
        assert!(resolver.resolve("9780131103627").await.is_some());
        // The provider only saw the first call; the second was served from cache.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
