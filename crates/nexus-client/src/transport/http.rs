//! HTTP transport: POST the envelope, read the body.

use std::time::Duration;

use url::Url;

use super::{DEFAULT_TIMEOUT, Transport, TransportKind};
use crate::error::{NexusError, Result};

/// Path of the protocol endpoint, relative to the base URL.
pub const ENDPOINT_PATH: &str = "mcp";

/// Path of the health probe, relative to the base URL.
pub const HEALTH_PATH: &str = "health";

/// Configuration for HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Base URL of the runtime, e.g. `http://localhost:9000`.
    pub url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Number of retries after a failed delivery. Zero unless opted in.
    pub retries: u32,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: DEFAULT_TIMEOUT,
            retries: 0,
            headers: Vec::new(),
        }
    }
}

impl HttpTransportConfig {
    /// Create a new HTTP transport config with the given base URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of retries.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Transport that posts envelopes to `{base}/mcp`.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    config: HttpTransportConfig,
    endpoint: Url,
    health: Url,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn connect(config: HttpTransportConfig) -> Result<Self> {
        let endpoint = join_path(&config.url, ENDPOINT_PATH)?;
        let health = join_path(&config.url, HEALTH_PATH)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(5)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| NexusError::transport(format!("failed to build HTTP client: {}", e)))?;

        tracing::info!(
            endpoint = %endpoint,
            timeout_secs = config.timeout.as_secs(),
            "created HTTP transport"
        );

        Ok(Self {
            client,
            config,
            endpoint,
            health,
        })
    }

    /// The protocol endpoint requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The health probe URL.
    pub fn health_url(&self) -> &Url {
        &self.health
    }

    fn post(&self, payload: &[u8]) -> reqwest::Result<reqwest::blocking::Response> {
        let mut req = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .body(payload.to_vec());
        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }
        req.send()
    }
}

impl Transport for HttpTransport {
    fn send(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        tracing::trace!(
            url = %self.endpoint,
            json = %String::from_utf8_lossy(payload),
            "sending HTTP request"
        );

        let mut retries = self.config.retries;
        loop {
            match self.post(payload) {
                Ok(resp) => {
                    let status = resp.status();
                    if !status.is_success() {
                        let body = resp.text().unwrap_or_default();
                        return Err(NexusError::Http {
                            status: status.as_u16(),
                            body,
                        });
                    }

                    let body = resp.bytes().map_err(|e| {
                        NexusError::transport(format!("failed to read response body: {}", e))
                    })?;

                    tracing::trace!(
                        json = %String::from_utf8_lossy(&body),
                        "received HTTP response"
                    );

                    return Ok(body.to_vec());
                }
                Err(e) if e.is_timeout() => {
                    return Err(NexusError::Timeout(self.config.timeout));
                }
                Err(e) => {
                    if retries == 0 {
                        return Err(NexusError::transport(format!(
                            "HTTP request failed: {}",
                            e
                        )));
                    }
                    retries -= 1;
                    tracing::warn!(
                        error = %e,
                        retries_remaining = retries,
                        "HTTP request failed, retrying"
                    );
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn health(&mut self) -> Result<bool> {
        let mut req = self.client.get(self.health.clone());
        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }
        match req.send() {
            Ok(resp) => Ok(resp.status() == reqwest::StatusCode::OK),
            Err(e) => {
                tracing::debug!(url = %self.health, error = %e, "health probe failed");
                Ok(false)
            }
        }
    }
}

fn join_path(base: &str, path: &str) -> Result<Url> {
    Url::parse(base).map_err(|e| NexusError::transport(format!("invalid URL: {}", e)))?;
    let joined = format!("{}/{}", base.trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|e| NexusError::transport(format!("invalid URL: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_transport_config() {
        let config = HttpTransportConfig::new("http://localhost:9000")
            .with_timeout(Duration::from_secs(60))
            .with_retries(2)
            .with_header("Authorization", "Bearer token123");

        assert_eq!(config.url, "http://localhost:9000");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.retries, 2);
        assert_eq!(
            config.headers,
            vec![("Authorization".to_string(), "Bearer token123".to_string())]
        );
    }

    #[test]
    fn test_http_transport_config_default() {
        let config = HttpTransportConfig::default();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.retries, 0);
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_endpoint_paths() {
        let transport =
            HttpTransport::connect(HttpTransportConfig::new("http://localhost:9000")).unwrap();
        assert_eq!(transport.endpoint().as_str(), "http://localhost:9000/mcp");
        assert_eq!(transport.health_url().as_str(), "http://localhost:9000/health");
        assert_eq!(transport.kind(), TransportKind::Http);

        let transport =
            HttpTransport::connect(HttpTransportConfig::new("http://host:1234/nexus/")).unwrap();
        assert_eq!(transport.endpoint().as_str(), "http://host:1234/nexus/mcp");
    }

    #[test]
    fn test_http_transport_invalid_url() {
        let result = HttpTransport::connect(HttpTransportConfig::new("not a valid url"));
        match result {
            Err(NexusError::Transport(msg)) => assert!(msg.contains("invalid URL")),
            _ => panic!("Expected Transport error"),
        }
    }

    #[test]
    fn test_unreachable_server() {
        // Port 9 (discard) is not expected to serve HTTP locally.
        let config = HttpTransportConfig::new("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2));
        let mut transport = HttpTransport::connect(config).unwrap();

        let err = transport.send(b"{}").unwrap_err();
        assert!(err.is_transport());
        assert!(!transport.health().unwrap());
    }
}
