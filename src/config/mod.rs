use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// SQLite database file for the inventory.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// JSON file holding the persisted queue snapshot.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Optional Google Books API key; the provider works unauthenticated at
    /// a lower quota.
    pub google_books_api_key: Option<String>,

    /// Timeout for metadata provider requests, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/shelfscan.db")
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("data/scan-queue.json")
}

fn default_http_timeout_secs() -> u64 {
    10
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
