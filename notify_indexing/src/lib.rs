//! Notify Indexing - URL update notifier
//!
//! Reads a list of URLs and tells the search engine indexing API that each
//! one changed, authenticating with a service account key.
//!
//! Key behaviors:
//! - Only trimmed lines starting with "http" are submitted, in file order
//! - Credentials are loaded once; the access token is reused while valid
//! - Every URL gets exactly one request, no retries
//! - Failures are logged and counted, never abort the loop

pub mod config;
pub mod credentials;
pub mod error;
pub mod notifier;
pub mod urls;

use reqwest::Client;
use std::sync::Arc;
use tracing::{info, warn};

pub use config::{Config, NotificationType};
pub use credentials::{load_credentials, Credentials, ServiceAccountTokenSource, TokenSource};
pub use error::{IndexingError, Result};
pub use notifier::{FailureReason, NotificationResult, Notifier};

/// Exit code when at least one submission failed (strict mode only).
pub const EXIT_SUBMISSION_FAILED: i32 = 1;
/// Exit code when URLs were pending but nothing could be sent (strict mode only).
pub const EXIT_NOT_SENT: i32 = 2;

/// Exit code when `run` itself failed, e.g. an unreadable URL file.
pub fn aborted_exit_code(strict: bool) -> i32 {
    if strict {
        EXIT_NOT_SENT
    } else {
        0
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub urls_found: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// URLs were pending but credentials were unavailable.
    pub skipped: bool,
}

impl RunSummary {
    fn record(&mut self, result: &NotificationResult) {
        if result.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Best-effort runs always exit 0; strict runs surface failures.
    pub fn exit_code(&self, strict: bool) -> i32 {
        if !strict {
            0
        } else if self.skipped {
            EXIT_NOT_SENT
        } else if self.failed > 0 {
            EXIT_SUBMISSION_FAILED
        } else {
            0
        }
    }
}

pub fn build_client(config: &Config) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = config.timeout() {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Reads the URL list, loads credentials and submits every URL in order.
pub async fn run(config: &Config) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    let urls = match urls::read_url_file(&config.urls_file).await? {
        Some(urls) => urls,
        None => {
            warn!("{} not found. Nothing to index.", config.urls_file);
            return Ok(summary);
        }
    };

    if urls.is_empty() {
        warn!("No valid URLs found in {}.", config.urls_file);
        return Ok(summary);
    }

    summary.urls_found = urls.len();
    info!("Found {} URLs to process...", urls.len());

    let Some(credentials) = load_credentials(config.credentials_json.as_deref()) else {
        summary.skipped = true;
        return Ok(summary);
    };

    let client = build_client(config)?;
    let tokens = Arc::new(ServiceAccountTokenSource::new(credentials, client.clone()));
    let notifier = Notifier::new(client, &config.endpoint, config.notification_type, tokens);

    for url in &urls {
        let result = notifier.submit(url).await;
        summary.record(&result);
    }

    info!(
        "All indexing requests processed: {} succeeded, {} failed",
        summary.succeeded, summary.failed
    );
    Ok(summary)
}
