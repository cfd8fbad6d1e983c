use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::HttpMethod;
use crate::error::{Result, RustyRelayError};

/// One delivery attempt's worth of request data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub uri: String,
    /// Sent as the `Host` header when not empty
    pub host: String,
    pub params: HashMap<String, String>,
    /// Zero disables the per-call timeout
    pub timeout: Duration,
}

/// Outbound HTTP used to deliver publishes
///
/// Returns the raw response body on a 2xx reply and an error for anything
/// else, including transport failures and timeouts.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, method: HttpMethod, request: &PublishRequest) -> Result<Vec<u8>>;
}

/// `reqwest` backed client; GET sends params as a query, POST as a form body
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, method: HttpMethod, request: &PublishRequest) -> Result<Vec<u8>> {
        let builder = match method {
            HttpMethod::Get => self.client.get(&request.uri).query(&request.params),
            HttpMethod::Post => self.client.post(&request.uri).form(&request.params),
        };
        let builder = if request.host.is_empty() {
            builder
        } else {
            builder.header(reqwest::header::HOST, &request.host)
        };

        // A zero timeout means the call is unbounded
        let builder = if request.timeout.is_zero() {
            builder
        } else {
            builder.timeout(request.timeout)
        };

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        debug!("{:?} {} -> {}", method, request.uri, status);

        if !status.is_success() {
            return Err(RustyRelayError::Backend {
                status: Some(status.as_u16()),
                body,
                reason: status.to_string(),
            });
        }
        Ok(body)
    }
}
