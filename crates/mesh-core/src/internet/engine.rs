//! Internet Request Engine: proxies an outbound HTTP call through
//! `reqwest`, running on tokio's own executor rather than a dedicated
//! thread pool.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;

use crate::error::CoreError;
use crate::identity::Instance;

/// One outbound (or proxied) Internet request.
#[derive(Debug, Clone)]
pub struct InternetRequest {
    pub originator: Instance,
    pub sequence: u32,
    pub url: String,
    pub data: Vec<u8>,
    pub test_id: u8,
    /// Hop count this request has already traveled through the mesh; 0
    /// for a request made directly by the local host.
    pub hop_count: u8,
}

/// The exactly-one-of-two outcome the engine reports back.
#[derive(Debug, Clone)]
pub enum InternetOutcome {
    Response { status_code: u8, body: Vec<u8> },
    Failure(String),
}

/// A worker that performs the actual HTTP call. Kept as a trait so tests
/// can substitute a fake engine without touching the network.
#[async_trait]
pub trait InternetExecutor: Send + Sync {
    async fn execute(&self, request: InternetRequest) -> InternetOutcome;
}

/// Real engine: a `reqwest` client configured with the connect/read
/// timeouts from [`crate::config::MeshConfig`].
pub struct HttpInternetEngine {
    client: Client,
}

impl HttpInternetEngine {
    pub fn new(connect_timeout_ms: u64, read_timeout_ms: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(connect_timeout_ms))
            .timeout(Duration::from_millis(read_timeout_ms))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl InternetExecutor for HttpInternetEngine {
    async fn execute(&self, request: InternetRequest) -> InternetOutcome {
        debug!("internet request seq={} url={} hops={}", request.sequence, request.url, request.hop_count);

        let result = self
            .client
            .post(&request.url)
            .header("X-Sequence", request.sequence.to_string())
            .header("X-Hops", request.hop_count.to_string())
            .header("X-Proxy", (request.hop_count > 0).to_string())
            .header("X-Originator", request.originator.to_string())
            .header("X-Test", request.test_id.to_string())
            .body(request.data)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status_code = response.status().as_u16().min(u8::MAX as u16) as u8;
                match response.bytes().await {
                    Ok(body) => InternetOutcome::Response { status_code, body: body.to_vec() },
                    Err(err) => {
                        let core_err = self.classify(&request.url, err);
                        warn!("internet request seq={} failed reading body: {core_err}", request.sequence);
                        InternetOutcome::Failure(core_err.to_string())
                    }
                }
            }
            Err(err) => {
                let core_err = self.classify(&request.url, err);
                warn!("internet request seq={} failed: {core_err}", request.sequence);
                InternetOutcome::Failure(core_err.to_string())
            }
        }
    }
}

impl HttpInternetEngine {
    /// Turns a `reqwest` failure into the `CoreError` variant that names it,
    /// so the log line (and the message handed back in `InternetOutcome`)
    /// distinguishes a timeout from any other transport failure.
    fn classify(&self, url: &str, err: reqwest::Error) -> CoreError {
        if err.is_timeout() {
            CoreError::HttpTimeout { url: url.to_string() }
        } else {
            CoreError::HttpIo(err)
        }
    }
}
