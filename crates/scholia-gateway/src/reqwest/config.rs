//! Reqwest transport configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

/// Default API host.
pub const DEFAULT_API_HOST: &str = "https://api.box.com";

/// Default timeout for HTTP requests: 30 seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the reqwest transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct ReqwestConfig {
    /// Base URL of the annotations API
    #[cfg_attr(
        feature = "config",
        arg(long = "api-host", env = "API_HOST", default_value = DEFAULT_API_HOST)
    )]
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Bearer token sent with every request
    #[cfg_attr(feature = "config", arg(long = "api-token", env = "API_TOKEN"))]
    #[serde(default)]
    pub token: Option<String>,

    /// Shared link granting access to the file
    #[cfg_attr(feature = "config", arg(long = "shared-link", env = "SHARED_LINK"))]
    #[serde(default)]
    pub shared_link: Option<String>,

    /// Password protecting the shared link
    #[cfg_attr(
        feature = "config",
        arg(long = "shared-link-password", env = "SHARED_LINK_PASSWORD")
    )]
    #[serde(default)]
    pub shared_link_password: Option<String>,

    /// HTTP request timeout in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "http-timeout", env = "HTTP_TIMEOUT", default_value = "30")
    )]
    #[serde(default = "default_timeout_secs")]
    pub http_timeout: u64,

    /// User-Agent header to send with requests
    #[cfg_attr(
        feature = "config",
        arg(long = "http-user-agent", env = "HTTP_USER_AGENT")
    )]
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_owned()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ReqwestConfig {
    fn default() -> Self {
        Self::new(default_api_host())
    }
}

impl ReqwestConfig {
    /// Creates a configuration for the given API host.
    pub fn new(api_host: impl Into<String>) -> Self {
        Self {
            api_host: api_host.into(),
            token: None,
            shared_link: None,
            shared_link_password: None,
            http_timeout: default_timeout_secs(),
            user_agent: None,
        }
    }

    /// Returns the timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    /// Returns the effective timeout, using default if zero.
    pub fn effective_timeout(&self) -> Duration {
        if self.http_timeout == 0 {
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        } else {
            self.timeout()
        }
    }

    /// Returns the effective user agent, using default if not set.
    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("scholia/{}", env!("CARGO_PKG_VERSION")))
    }

    /// Returns the `BoxApi` header value carrying the shared link, if any.
    pub fn shared_link_header(&self) -> Option<String> {
        let link = self.shared_link.as_deref().filter(|link| !link.is_empty())?;

        Some(match self.shared_link_password.as_deref() {
            Some(password) if !password.is_empty() => {
                format!("shared_link={link}&shared_link_password={password}")
            }
            _ => format!("shared_link={link}"),
        })
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the shared link.
    #[must_use]
    pub fn with_shared_link(mut self, shared_link: impl Into<String>) -> Self {
        self.shared_link = Some(shared_link.into());
        self
    }

    /// Set the shared link password.
    #[must_use]
    pub fn with_shared_link_password(mut self, password: impl Into<String>) -> Self {
        self.shared_link_password = Some(password.into());
        self
    }

    /// Set the timeout in seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.http_timeout = timeout_secs;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}
