use serde::{Deserialize, Serialize};

/// Book metadata as resolved from an external provider.
/// Only the title is guaranteed; everything else is best-effort.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookMetadata {
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub cover_url: Option<String>,
    pub summary: Option<String>,
}
