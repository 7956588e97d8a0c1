use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;

/// Maximum response body accepted from any provider (5MB).
pub const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024;

/// Transient failures are retried this many times.
const MAX_RETRIES: u32 = 2;

/// Errors raised while fetching or interpreting one provider's payload.
///
/// Variants fall into three families: fetch failures (`Timeout`, `Network`,
/// `HttpStatus`, `ResponseTooLarge`, `InvalidUtf8`, `Upstream`), payload shape
/// failures (`Parse`) and empty results (`NotFound`, `NoData`).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The provider answered but reported an error or an empty payload
    #[error("Provider error: {0}")]
    Upstream(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No data: {0}")]
    NoData(String),
}

impl SourceError {
    /// Returns true if this error is transient and the request should be retried.
    fn is_retryable(&self) -> bool {
        match self {
            SourceError::Timeout(_) | SourceError::Network(_) => true,
            SourceError::HttpStatus(status) => *status >= 500,
            _ => false,
        }
    }
}

/// Shared HTTP settings for every provider request.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    request_timeout: Duration,
    retry_base: Duration,
}

impl HttpClient {
    pub fn new(client: reqwest::Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
            retry_base: Duration::from_millis(500),
        }
    }

    /// Build a client with the given `User-Agent`.
    pub fn with_user_agent(user_agent: &str, request_timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self::new(client, request_timeout))
    }

    /// Set the first retry delay; later retries double it.
    pub fn retry_base(mut self, delay: Duration) -> Self {
        self.retry_base = delay;
        self
    }

    /// GET `url` and return the body as text.
    ///
    /// Timeouts, network errors and 5xx responses are retried with exponential
    /// backoff; 4xx responses fail immediately.
    pub async fn get_text(&self, url: &str, accept: &str) -> Result<String, SourceError> {
        let mut retry_count = 0;
        loop {
            match self.get_once(url, accept).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && retry_count < MAX_RETRIES => {
                    let delay = self.retry_base * 2u32.pow(retry_count);
                    tracing::debug!(
                        url = %url,
                        error = %e,
                        retry = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying provider fetch after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// GET `url` and deserialize the JSON body.
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let body = self.get_text(url, "application/json").await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Parse(e.to_string()))
    }

    async fn get_once(&self, url: &str, accept: &str) -> Result<String, SourceError> {
        let request = self.client.get(url).header("Accept", accept);
        let response = tokio::time::timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| SourceError::Timeout(self.request_timeout))?
            .map_err(SourceError::Network)?;

        if !response.status().is_success() {
            return Err(SourceError::HttpStatus(response.status().as_u16()));
        }

        read_limited_text(response, MAX_RESPONSE_SIZE).await
    }
}

async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, SourceError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(SourceError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(SourceError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(SourceError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| SourceError::InvalidUtf8)
}
