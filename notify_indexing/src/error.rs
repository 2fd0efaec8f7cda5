use thiserror::Error;

/// Errors raised while loading credentials, minting tokens or reading input.
///
/// None of these abort a run on their own: the orchestrator converts them
/// into log lines and per-URL outcomes.
#[derive(Error, Debug)]
pub enum IndexingError {
    #[error("service account JSON is malformed: {0}")]
    CredentialParse(#[from] serde_json::Error),

    #[error("failed to parse private key: {0}")]
    KeyParse(String),

    #[error("failed to encode JWT: {0}")]
    JwtEncode(String),

    #[error("token request failed: {0}")]
    TokenRequest(String),

    #[error("token request failed with status {status}: {body}")]
    TokenRejected { status: u16, body: String },

    #[error("failed to parse token response: {0}")]
    TokenParse(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, IndexingError>;

/// Renders an error followed by each of its causes, `outer: inner: root`.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
