use std::path::Path;
use tokio::fs;

use crate::error::{IndexingError, Result};

/// Reads the URL list file.
///
/// Returns `Ok(None)` when the file does not exist, so callers can treat a
/// missing list as "nothing to do" rather than an error.
pub async fn read_url_file(path: &str) -> Result<Option<Vec<String>>> {
    let file_path = Path::new(path);

    if !file_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(file_path)
        .await
        .map_err(|source| IndexingError::Io {
            path: path.to_string(),
            source,
        })?;

    Ok(Some(parse_urls(&content)))
}

/// Keeps the trimmed lines that start with "http", in file order.
pub fn parse_urls(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("http"))
        .map(str::to_string)
        .collect()
}
