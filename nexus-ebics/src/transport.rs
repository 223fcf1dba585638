//! The HTTP transport: POST an EBICS envelope, retrying only transport
//! failures (never bank-reported or framing errors).

use crate::error::{Error, Result};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_ATTEMPTS: u32 = 3;

/// Thin wrapper over a [`reqwest::Client`] applying the 60s per-request
/// timeout and a 3-attempt exponential backoff over transport failures.
#[derive(Clone)]
pub struct EbicsTransport {
    client: reqwest::Client,
}

impl EbicsTransport {
    /// Build a transport with the default timeout.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(Error::Transport)?;
        Ok(EbicsTransport { client })
    }

    /// POST `body` as `text/xml` to `url`, retrying transport failures up
    /// to [`MAX_ATTEMPTS`] times with exponential backoff. A timeout aborts
    /// the whole transaction without touching the ledger — the caller must
    /// not have made any persistent state change before this returns.
    pub async fn post(&self, url: &str, body: String) -> Result<Vec<u8>> {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_elapsed_time(Some(Duration::from_secs(30)))
            .build();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_post(url, body.clone()).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(attempt, error = %e, "EBICS transport attempt failed, retrying");
                    if let Some(delay) = backoff.next_backoff() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_post(&self, url: &str, body: String) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "text/xml; charset=UTF-8")
            .body(body)
            .send()
            .await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

impl Default for EbicsTransport {
    fn default() -> Self {
        Self::new().expect("default reqwest client configuration is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    #[tokio::test]
    async fn posts_body_as_text_xml_and_returns_the_response_bytes() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::POST)
                .path("/ebics")
                .header("Content-Type", "text/xml; charset=UTF-8")
                .body("<ebicsNoPubKeyDigestsRequest/>");
            then.status(200).body("<ebicsKeyManagementResponse/>");
        });

        let transport = EbicsTransport::new().unwrap();
        let response = transport
            .post(&server.url("/ebics"), "<ebicsNoPubKeyDigestsRequest/>".to_string())
            .await
            .unwrap();

        mock.assert();
        assert_eq!(response, b"<ebicsKeyManagementResponse/>".to_vec());
    }

    #[tokio::test]
    async fn transport_failure_is_retried_and_eventually_surfaced() {
        // Nothing listens on this loopback port, so every attempt fails at
        // the connection stage rather than returning an HTTP status.
        let transport = EbicsTransport::new().unwrap();
        let result = transport.post("http://127.0.0.1:1/ebics", "<doc/>".to_string()).await;
        assert!(result.is_err());
    }
}
