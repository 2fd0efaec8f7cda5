use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::NotificationType;
use crate::credentials::TokenSource;
use crate::error::error_chain;

#[derive(Serialize, Debug)]
pub struct UrlNotification<'a> {
    pub url: &'a str,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
}

/// Why a single URL could not be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// No access token was available; the endpoint was not contacted.
    Token(String),
    /// The endpoint answered with something other than 200.
    Status { status: u16, body: String },
    /// The request never got a response.
    Transport(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Token(msg) => write!(f, "no access token: {}", msg),
            FailureReason::Status { status, body } => write!(f, "HTTP {}: {}", status, body),
            FailureReason::Transport(msg) => write!(f, "{}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationResult {
    Success,
    Failed(FailureReason),
}

impl NotificationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, NotificationResult::Success)
    }
}

/// Publishes URL notifications one request at a time.
pub struct Notifier {
    client: Client,
    endpoint: String,
    notification_type: NotificationType,
    tokens: Arc<dyn TokenSource>,
}

impl Notifier {
    pub fn new(
        client: Client,
        endpoint: &str,
        notification_type: NotificationType,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Notifier {
            client,
            endpoint: endpoint.to_string(),
            notification_type,
            tokens,
        }
    }

    /// Sends one notification for `url` and reports what happened.
    ///
    /// Failures are logged and returned, never raised.
    pub async fn submit(&self, url: &str) -> NotificationResult {
        info!("Pinging indexing API for: {}", url);

        let token = match self.tokens.access_token().await {
            Ok(token) => token,
            Err(e) => {
                error!("Indexing error for {}: {}", url, e);
                return NotificationResult::Failed(FailureReason::Token(e.to_string()));
            }
        };

        let body = UrlNotification {
            url,
            notification_type: self.notification_type,
        };

        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(&token.value)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let reason = error_chain(&e);
                error!("Indexing error for {}: {}", url, reason);
                return NotificationResult::Failed(FailureReason::Transport(reason));
            }
        };

        match response.status() {
            StatusCode::OK => {
                info!("Indexing API: success for {}", url);
                NotificationResult::Success
            }
            status => {
                let body = match response.text().await {
                    Ok(text) => text,
                    Err(e) => format!("<unreadable response body: {}>", e),
                };
                warn!("Indexing API failed for {}: {}", url, body);
                NotificationResult::Failed(FailureReason::Status {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::AccessToken;
    use crate::error::{IndexingError, Result};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticToken;

    #[async_trait]
    impl TokenSource for StaticToken {
        async fn access_token(&self) -> Result<AccessToken> {
            Ok(AccessToken {
                value: "static-token".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
            })
        }
    }

    struct NoToken;

    #[async_trait]
    impl TokenSource for NoToken {
        async fn access_token(&self) -> Result<AccessToken> {
            Err(IndexingError::TokenRequest("connection refused".to_string()))
        }
    }

    fn notifier(endpoint: &str, tokens: Arc<dyn TokenSource>) -> Notifier {
        Notifier::new(Client::new(), endpoint, NotificationType::UrlUpdated, tokens)
    }

    #[test]
    fn test_request_body_shape() {
        let body = UrlNotification {
            url: "https://example.com/a",
            notification_type: NotificationType::UrlUpdated,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"url": "https://example.com/a", "type": "URL_UPDATED"})
        );
    }

    #[tokio::test]
    async fn test_submit_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/publish"))
            .and(header("authorization", "Bearer static-token"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "url": "https://example.com/a",
                "type": "URL_UPDATED",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = format!("{}/publish", server.uri());
        let result = notifier(&endpoint, Arc::new(StaticToken))
            .submit("https://example.com/a")
            .await;
        assert_eq!(result, NotificationResult::Success);
    }

    #[tokio::test]
    async fn test_submit_non_200_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Permission denied"))
            .mount(&server)
            .await;

        let result = notifier(&server.uri(), Arc::new(StaticToken))
            .submit("https://example.com/a")
            .await;
        assert_eq!(
            result,
            NotificationResult::Failed(FailureReason::Status {
                status: 403,
                body: "Permission denied".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_submit_other_2xx_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let result = notifier(&server.uri(), Arc::new(StaticToken))
            .submit("https://example.com/a")
            .await;
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_submit_transport_error() {
        // Nothing listens on port 9 of the loopback interface.
        let result = notifier("http://127.0.0.1:9/publish", Arc::new(StaticToken))
            .submit("https://example.com/a")
            .await;
        match result {
            NotificationResult::Failed(FailureReason::Transport(msg)) => {
                // The root cause, not just reqwest's summary line.
                assert!(msg.to_lowercase().contains("refused"), "{}", msg);
            }
            other => panic!("expected transport failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_without_token_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = notifier(&server.uri(), Arc::new(NoToken))
            .submit("https://example.com/a")
            .await;
        assert!(matches!(
            result,
            NotificationResult::Failed(FailureReason::Token(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_deleted_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "url": "https://example.com/gone",
                "type": "URL_DELETED",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = Notifier::new(
            Client::new(),
            &server.uri(),
            NotificationType::UrlDeleted,
            Arc::new(StaticToken),
        );
        assert!(notifier.submit("https://example.com/gone").await.is_success());
    }
}
