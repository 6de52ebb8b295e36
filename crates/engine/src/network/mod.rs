//! Network seam used by the cache strategies.
//!
//! ### What counts as a failure
//! - Transport errors, timeouts and oversized bodies are `Err`.
//! - Any HTTP status, including 4xx/5xx, is a successful fetch.
//!
//! ### Response kinds
//! - Same-origin requests produce `basic` responses.
//! - Cross-origin `no-cors` requests produce `opaque` responses (status 0,
//!   no headers), exactly what a page would observe.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};
use shellcache_core::{Error, Request, Response, ResponseKind, WorkerConfig};
use std::time::{Duration, Instant};
use url::Url;

/// Performs network fetches on behalf of the worker.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the HTTP network client.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// User agent string (default: "shellcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: "shellcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&WorkerConfig> for NetworkConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// reqwest-backed [`Network`].
pub struct HttpNetwork {
    http: Client,
    config: NetworkConfig,
    origin: Url,
}

impl HttpNetwork {
    /// Create a network client for a worker living at `origin`.
    pub fn new(config: NetworkConfig, origin: Url) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config, origin })
    }

    fn too_large(&self, len: usize) -> Error {
        Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {}", request.method, e)))?;

        let response = self
            .http
            .request(method, request.url.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::FetchTimeout(format!("{}: {}", request.url, e))
                } else {
                    Error::Network(format!("{}: {}", request.url, e))
                }
            })?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let status = response.status();
        let final_url = response.url().to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        let body: Bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(self.too_large(body.len()));
        }

        let kind = ResponseKind::for_request(request, &self.origin);
        let response = if kind == ResponseKind::Opaque {
            Response::opaque(final_url, body)
        } else {
            Response {
                url: final_url,
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
                kind,
                headers,
                body,
            }
        };

        tracing::debug!(
            url = %request.url,
            final_url = %response.url,
            status = status.as_u16(),
            kind = kind.as_str(),
            content_type = response.header(header::CONTENT_TYPE.as_str()).unwrap_or(""),
            bytes = response.body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "network fetch complete"
        );

        Ok(response)
    }
}
