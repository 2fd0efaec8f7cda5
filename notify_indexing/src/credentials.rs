//! Service account credentials and OAuth2 access tokens.
//!
//! A service account key is exchanged for a bearer token through the
//! JWT-bearer grant: sign a short-lived assertion with the account's private
//! key, post it to the key's `token_uri`, and keep the returned token until
//! shortly before it expires.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::config::CREDENTIALS_ENV;
use crate::error::{error_chain, IndexingError, Result};

pub const INDEXING_SCOPE: &str = "https://www.googleapis.com/auth/indexing";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens closer than this to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Service account key as downloaded from the cloud console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// A service account key with its signing key decoded and a scope attached.
#[derive(Clone)]
pub struct Credentials {
    pub key: ServiceAccountKey,
    pub scope: String,
    encoding_key: EncodingKey,
}

impl Credentials {
    pub fn new(key: ServiceAccountKey, scope: &str) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| IndexingError::KeyParse(e.to_string()))?;

        Ok(Credentials {
            key,
            scope: scope.to_string(),
            encoding_key,
        })
    }

    pub fn from_json(raw: &str, scope: &str) -> Result<Self> {
        Self::new(ServiceAccountKey::from_json(raw)?, scope)
    }

    /// Signs the JWT-bearer assertion exchanged for an access token.
    pub fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let iat = now.timestamp();
        let claims = JwtClaims {
            iss: self.key.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| IndexingError::JwtEncode(e.to_string()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_email", &self.key.client_email)
            .field("token_uri", &self.key.token_uri)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Builds indexing-scoped credentials from the raw key JSON.
///
/// Never fails: a missing or unusable key is logged and yields `None`, which
/// callers treat as "skip the remaining work".
pub fn load_credentials(raw: Option<&str>) -> Option<Credentials> {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        warn!("Indexing skipped: {} not found", CREDENTIALS_ENV);
        return None;
    };

    match Credentials::from_json(raw, INDEXING_SCOPE) {
        Ok(credentials) => {
            debug!(client_email = %credentials.key.client_email, "Loaded service account");
            Some(credentials)
        }
        Err(e) => {
            error!("Indexing auth error: {}", e);
            None
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

/// Bearer token with the instant it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now > Duration::seconds(EXPIRY_MARGIN_SECS)
    }
}

/// Anything able to hand out a bearer token for the publish endpoint.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<AccessToken>;
}

/// Mints tokens from service account credentials and caches them for the run.
pub struct ServiceAccountTokenSource {
    credentials: Credentials,
    client: Client,
    cache: Mutex<Option<AccessToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(credentials: Credentials, client: Client) -> Self {
        ServiceAccountTokenSource {
            credentials,
            client,
            cache: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<AccessToken> {
        let assertion = self.credentials.sign_assertion(Utc::now())?;
        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

        let response = self
            .client
            .post(&self.credentials.key.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| IndexingError::TokenRequest(error_chain(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexingError::TokenRejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| IndexingError::TokenParse(e.to_string()))?;

        // Negative lifetimes count as already expired.
        let expires_at = Duration::try_seconds(token.expires_in.max(0))
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                IndexingError::TokenParse(format!("expires_in out of range: {}", token.expires_in))
            })?;

        Ok(AccessToken {
            value: token.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<AccessToken> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.is_usable_at(Utc::now()) {
                return Ok(cached.clone());
            }
        }

        debug!(token_uri = %self.credentials.key.token_uri, "Requesting access token");
        let token = self.fetch().await?;
        *cache = Some(token.clone());
        Ok(token)
    }
}
