//! Reqwest-based HTTP transport for the annotations API.

use std::sync::Arc;

use reqwest::Client;
use url::Url;

use super::{Error, ReqwestConfig, TRACING_TARGET};
use crate::{Method, Transport, TransportRequest, TransportResponse};

/// Inner client that holds the HTTP client and configuration.
struct ReqwestClientInner {
    http: Client,
    base: Url,
    config: ReqwestConfig,
}

/// Reqwest-based HTTP transport.
///
/// Every request carries the bearer token and, when configured, the
/// `BoxApi` shared-link header. Response bodies that are empty or not JSON
/// are surfaced as `None`; classification is left to the gateway.
///
/// # Examples
///
/// ```rust,ignore
/// use scholia_gateway::reqwest::{ReqwestClient, ReqwestConfig};
///
/// let client = ReqwestClient::new(ReqwestConfig::default().with_token(token))?;
/// ```
#[derive(Clone)]
pub struct ReqwestClient {
    inner: Arc<ReqwestClientInner>,
}

impl std::fmt::Debug for ReqwestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestClient")
            .field("base", &self.inner.base.as_str())
            .finish_non_exhaustive()
    }
}

impl ReqwestClient {
    /// Creates a new reqwest client with the given configuration.
    pub fn new(config: ReqwestConfig) -> crate::Result<Self> {
        let timeout = config.effective_timeout();
        let user_agent = config.effective_user_agent();
        let base = Self::base_url(&config.api_host)?;

        tracing::debug!(
            target: TRACING_TARGET,
            api_host = %base,
            timeout_ms = timeout.as_millis(),
            "Creating reqwest client"
        );

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(&user_agent)
            .build()
            .map_err(Error::from)?;

        let inner = ReqwestClientInner { http, base, config };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Gets the client configuration.
    pub fn config(&self) -> &ReqwestConfig {
        &self.inner.config
    }

    /// Resolves an API path against the configured host.
    pub fn endpoint(&self, path: &str) -> super::Result<Url> {
        Ok(self.inner.base.join(path.trim_start_matches('/'))?)
    }

    /// Parses the API host, keeping any path prefix it carries.
    fn base_url(api_host: &str) -> super::Result<Url> {
        let mut base = Url::parse(api_host)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base)
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestClient {
    async fn send(&self, request: TransportRequest) -> crate::Result<TransportResponse> {
        let url = self.endpoint(&request.path)?;
        let config = self.config();

        tracing::debug!(
            target: TRACING_TARGET,
            method = %request.method,
            path = %request.path,
            "Sending request"
        );

        let mut http_request = self
            .inner
            .http
            .request(Self::method(request.method), url)
            .query(&request.query);

        if let Some(token) = config.token.as_deref() {
            http_request = http_request.bearer_auth(token);
        }

        if let Some(shared_link) = config.shared_link_header() {
            http_request = http_request.header("BoxApi", shared_link);
        }

        if let Some(body) = request.body.as_ref() {
            http_request = http_request.json(body);
        }

        let http_response = http_request.send().await.map_err(Error::from)?;
        let status = http_response.status().as_u16();
        let bytes = http_response.bytes().await.map_err(Error::from)?;

        let body = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice(&bytes).ok()
        };

        tracing::debug!(
            target: TRACING_TARGET,
            method = %request.method,
            path = %request.path,
            status,
            has_body = body.is_some(),
            "Request completed"
        );

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use scholia_core::ErrorKind;

    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ReqwestClient::new(ReqwestConfig::default()).unwrap();
        assert!(client.config().token.is_none());
    }

    #[test]
    fn test_endpoint_joins_api_paths() {
        let client = ReqwestClient::new(ReqwestConfig::default()).unwrap();
        let url = client.endpoint("/2.0/annotations/a1").unwrap();
        assert_eq!(url.as_str(), "https://api.box.com/2.0/annotations/a1");
    }

    #[test]
    fn test_endpoint_keeps_host_prefix() {
        let client = ReqwestClient::new(ReqwestConfig::new("https://proxy.local/box")).unwrap();
        let url = client.endpoint("/2.0/files/1/annotations").unwrap();
        assert_eq!(url.as_str(), "https://proxy.local/box/2.0/files/1/annotations");
    }

    #[test]
    fn test_invalid_host_is_a_configuration_error() {
        let error = ReqwestClient::new(ReqwestConfig::new("not a url")).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);
    }
}
