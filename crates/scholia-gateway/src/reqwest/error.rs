//! Error types for the reqwest transport.

use thiserror::Error;

/// Result type alias for reqwest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for reqwest operations.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// A request URL could not be built.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl From<Error> for crate::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Reqwest(e) => {
                if e.is_timeout() {
                    crate::Error::authorization()
                        .with_message("Request timed out")
                        .with_source(e)
                } else if e.is_connect() {
                    crate::Error::authorization()
                        .with_message("Connection failed")
                        .with_source(e)
                } else {
                    crate::Error::authorization()
                        .with_message(e.to_string())
                        .with_source(e)
                }
            }
            Error::Url(e) => crate::Error::configuration()
                .with_message(e.to_string())
                .with_source(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use scholia_core::ErrorKind;

    use super::*;

    #[test]
    fn url_errors_are_configuration_errors() {
        let error: crate::Error = Error::from(url::ParseError::EmptyHost).into();
        assert_eq!(error.kind, ErrorKind::Configuration);
        assert!(error.source.is_some());
    }
}
