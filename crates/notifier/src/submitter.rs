//! Batch submission transport.
//!
//! The queue only cares whether a whole batch went through; there is no
//! per-URL result. Any non-2xx status or transport failure fails the batch.

use async_trait::async_trait;
use thiserror::Error;

use beacon_common::config::IndexNowConfig;
use beacon_common::types::SubmissionPayload;

/// Reasons a batch submission failed.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("endpoint rejected submission with status {status}")]
    Rejected { status: u16 },
}

/// Sends one batch of normalized URLs to the discovery endpoint.
#[async_trait]
pub trait Submitter: Send + Sync + 'static {
    async fn submit(&self, urls: &[String]) -> Result<(), SubmitError>;
}

/// IndexNow submitter over HTTP (`POST` with a JSON body).
pub struct HttpSubmitter {
    client: reqwest::Client,
    endpoint: String,
    host: String,
    key: String,
    key_location: String,
}

impl HttpSubmitter {
    pub fn new(config: &IndexNowConfig) -> Result<Self, SubmitError> {
        let client = reqwest::Client::builder()
            .timeout(config.submit_timeout)
            .user_agent(concat!("beacon-notifier/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            host: config.host.clone(),
            key: config.key().unwrap_or_default().to_string(),
            key_location: config.key_location(),
        })
    }

    fn payload(&self, urls: &[String]) -> SubmissionPayload {
        SubmissionPayload {
            host: self.host.clone(),
            key: self.key.clone(),
            key_location: self.key_location.clone(),
            url_list: urls.to_vec(),
        }
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(&self, urls: &[String]) -> Result<(), SubmitError> {
        if urls.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.payload(urls))
            .send()
            .await
            .inspect_err(|e| {
                tracing::warn!(error = %e, count = urls.len(), "IndexNow submission error");
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(
                count = urls.len(),
                status = status.as_u16(),
                "IndexNow: submitted URLs"
            );
            Ok(())
        } else {
            tracing::warn!(
                count = urls.len(),
                status = status.as_u16(),
                reason = status.canonical_reason().unwrap_or("unknown"),
                "IndexNow submission rejected"
            );
            Err(SubmitError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server_uri: &str) -> IndexNowConfig {
        let mut config = IndexNowConfig::new("energie-profis.de", Some("test-key".to_string()));
        config.endpoint = format!("{server_uri}/indexnow");
        config
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    #[tokio::test]
    async fn test_success_posts_protocol_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/indexnow"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "host": "energie-profis.de",
                "key": "test-key",
                "keyLocation": "https://energie-profis.de/test-key.txt",
                "urlList": ["https://energie-profis.de/a", "https://energie-profis.de/b"]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let submitter = HttpSubmitter::new(&config_for(&server.uri())).unwrap();
        let result = submitter
            .submit(&urls(&["https://energie-profis.de/a", "https://energie-profis.de/b"]))
            .await;

        assert!(result.is_ok());
        server.verify().await;
    }

    #[tokio::test]
    async fn test_accepted_202_counts_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let submitter = HttpSubmitter::new(&config_for(&server.uri())).unwrap();
        assert!(submitter.submit(&urls(&["https://energie-profis.de/a"])).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_2xx_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422))
            .mount(&server)
            .await;

        let submitter = HttpSubmitter::new(&config_for(&server.uri())).unwrap();
        let err = submitter
            .submit(&urls(&["https://energie-profis.de/a"]))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::Rejected { status: 422 }));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let uri = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let submitter = HttpSubmitter::new(&config_for(&uri)).unwrap();
        let err = submitter
            .submit(&urls(&["https://energie-profis.de/a"]))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::Transport(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let submitter = HttpSubmitter::new(&config_for(&server.uri())).unwrap();
        assert!(submitter.submit(&[]).await.is_ok());
        server.verify().await;
    }
}
