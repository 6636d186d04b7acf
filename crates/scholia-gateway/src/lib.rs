#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for gateway operations.
///
/// Use this target for create, delete and read calls and their failures.
pub const TRACING_TARGET_GATEWAY: &str = "scholia_gateway::gateway";

/// Tracing target for session identity changes.
pub const TRACING_TARGET_SESSION: &str = "scholia_gateway::session";

mod config;
mod gateway;
mod session;
mod transport;

pub mod wire;

#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;

#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub mod reqwest;

pub use config::{DEFAULT_READ_FIELDS, GatewayConfig};
pub use gateway::{AnnotationGateway, GatewayEvent, ThreadMap};
pub use scholia_core::{Error, ErrorKind, Result};
pub use session::Session;
pub use transport::{Method, Transport, TransportRequest, TransportResponse};
