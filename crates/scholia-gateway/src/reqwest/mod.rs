//! Reqwest-based transport for the annotations API.
//!
//! This module provides a reqwest-based implementation of the [`Transport`]
//! trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use scholia_gateway::reqwest::{ReqwestClient, ReqwestConfig};
//! use scholia_gateway::{AnnotationGateway, GatewayConfig};
//!
//! let config = ReqwestConfig::default()
//!     .with_token(token)
//!     .with_shared_link("https://app.box.com/s/abc");
//!
//! let client = ReqwestClient::new(config)?;
//! let gateway = AnnotationGateway::new(client, GatewayConfig::new(file_id));
//! ```
//!
//! [`Transport`]: crate::Transport

mod client;
mod config;
mod error;

pub use client::ReqwestClient;
pub use config::{DEFAULT_API_HOST, DEFAULT_TIMEOUT_SECS, ReqwestConfig};
pub use error::{Error, Result};

/// Tracing target for reqwest transport operations.
pub const TRACING_TARGET: &str = "scholia_gateway::reqwest";
