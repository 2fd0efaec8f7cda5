//! Notify Indexing
//!
//! Tells the indexing API that the URLs listed in a file were updated.
//!
//! Exit codes:
//! - 0: Run finished (always, unless --strict is given)
//! - 1: Some submissions failed (--strict)
//! - 2: Nothing could be sent: missing credentials or unreadable input (--strict)

use clap::Parser;
use notify_indexing::config::{load_dotenv, log_filter, LOG_ENV};
use notify_indexing::{aborted_exit_code, run, Config};
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    load_dotenv(None);

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(LOG_ENV))
        .with_writer(std::io::stdout)
        .init();

    let config = Config::parse();

    let exit_code = match run(&config).await {
        Ok(summary) => summary.exit_code(config.strict),
        Err(e) => {
            error!("Indexing aborted: {}", e);
            aborted_exit_code(config.strict)
        }
    };

    std::process::exit(exit_code);
}
