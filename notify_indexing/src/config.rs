use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_ENDPOINT: &str = "https://indexing.googleapis.com/v3/urlNotifications:publish";
pub const CREDENTIALS_ENV: &str = "GOOGLE_INDEXING_JSON";
pub const LOG_ENV: &str = "RUST_LOG";

#[derive(Parser, Debug, Clone)]
#[command(name = "notify_indexing")]
#[command(about = "Notify the search engine indexing API that URLs have changed")]
pub struct Config {
    /// File with one URL per line; lines not starting with "http" are ignored
    #[arg(long, env = "INDEXING_URLS_FILE", default_value = "urls.txt")]
    pub urls_file: String,

    /// Service account key JSON used to mint access tokens
    #[arg(long, env = CREDENTIALS_ENV, hide_env_values = true)]
    pub credentials_json: Option<String>,

    /// Publish endpoint of the indexing API
    #[arg(long, env = "INDEXING_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Kind of notification sent for every URL
    #[arg(long, value_enum, default_value_t = NotificationType::UrlUpdated)]
    pub notification_type: NotificationType,

    /// Per-request timeout in seconds (HTTP client default when unset)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Exit non-zero when any submission fails or credentials are missing
    #[arg(long)]
    pub strict: bool,
}

impl Config {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Loads `.env` (or the given file) into the process environment.
///
/// Must run before logging is set up so `RUST_LOG` can come from the file.
/// A missing file is not an error; variables already set win.
pub fn load_dotenv(path: Option<&Path>) {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(|_| ()),
    };
    loaded.ok();
}

/// Log filter read from `env_var`, `info` when unset or unparsable.
pub fn log_filter(env_var: &str) -> EnvFilter {
    EnvFilter::try_from_env(env_var).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Notification kinds accepted by the publish endpoint.
#[derive(ValueEnum, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    UrlUpdated,
    UrlDeleted,
}
