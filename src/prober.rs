//! HTTP Prober (spec.md §4.B).
//!
//! Issues a single HEAD request under a hard timeout and a bounded
//! redirect chain; never retries and never reads the response body.
//! Modeled on `OuraApiClient::new`'s `reqwest::Client::builder().timeout(..)`
//! pattern, generalized to a redirect-limited client and a probe-only
//! surface so the validator (§4.C) can stay ignorant of `reqwest`.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::ProbeError;

#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
}

/// Abstracts the prober so the validator can be tested without a network.
#[async_trait]
pub trait HttpProber: Send + Sync {
    async fn probe(&self, url: &str) -> Result<ProbeResponse, ProbeError>;
}

pub struct ReqwestProber {
    client: reqwest::Client,
}

impl ReqwestProber {
    pub fn new(timeout: Duration, max_redirects: usize) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .build()
            .map_err(|e| ProbeError::new(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProber for ReqwestProber {
    async fn probe(&self, url: &str) -> Result<ProbeResponse, ProbeError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| ProbeError::new(e.to_string()))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        Ok(ProbeResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn probes_a_head_request_and_reads_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/boat.jpg"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/jpeg"))
            .mount(&server)
            .await;

        let prober = ReqwestProber::new(Duration::from_secs(5), 5).unwrap();
        let response = prober
            .probe(&format!("{}/boat.jpg", server.uri()))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn surfaces_non_2xx_status_untranslated() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let prober = ReqwestProber::new(Duration::from_secs(5), 5).unwrap();
        let response = prober
            .probe(&format!("{}/missing.jpg", server.uri()))
            .await
            .unwrap();

        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn transport_failure_is_a_probe_error_not_a_verdict() {
        let prober = ReqwestProber::new(Duration::from_millis(50), 5).unwrap();
        let result = prober.probe("http://127.0.0.1:1/unreachable").await;
        assert!(result.is_err());
    }
}
