//! Structured error handling for annotation operations.

use strum::{AsRefStr, Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
///
/// Used as the source error in [`Error`], wrapping transport or
/// serialization failures while keeping `Send + Sync` bounds.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with our custom Error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categories of errors that can occur in annotation operations.
///
/// The first four kinds form the taxonomy reported on the `annotationerror`
/// channel. The remaining kinds are local failures that never reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// An annotation could not be created.
    Create,
    /// Annotations could not be read for a file version.
    Read,
    /// An annotation could not be deleted.
    Delete,
    /// The transport rejected the request (network failure, expired token).
    Authorization,
    /// Input validation failed.
    InvalidInput,
    /// Configuration error.
    Configuration,
    /// Serialization/deserialization error.
    Serialization,
}

impl ErrorKind {
    /// Returns whether this kind is reported on the `annotationerror` channel.
    #[must_use]
    pub const fn is_reported(&self) -> bool {
        matches!(
            self,
            Self::Create | Self::Read | Self::Delete | Self::Authorization
        )
    }
}

/// Structured error type with classification and an optional source.
#[must_use]
#[derive(Debug, Error)]
#[error("[{kind}]{}", message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Primary error message.
    pub message: Option<String>,
    /// Underlying source error, if any.
    #[source]
    pub source: Option<BoxedError>,
}

impl Error {
    /// Creates a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Creates a new error from a source error.
    pub fn from_source(kind: ErrorKind, source: impl Into<BoxedError>) -> Self {
        Self {
            kind,
            message: None,
            source: Some(source.into()),
        }
    }

    /// Adds a message to this error.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the source of the error.
    pub fn with_source(mut self, source: impl Into<BoxedError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Creates a new create error.
    pub fn create() -> Self {
        Self::new(ErrorKind::Create)
    }

    /// Creates a new read error.
    pub fn read() -> Self {
        Self::new(ErrorKind::Read)
    }

    /// Creates a new delete error.
    pub fn delete() -> Self {
        Self::new(ErrorKind::Delete)
    }

    /// Creates a new authorization error.
    pub fn authorization() -> Self {
        Self::new(ErrorKind::Authorization)
    }

    /// Creates a new invalid input error.
    pub fn invalid_input() -> Self {
        Self::new(ErrorKind::InvalidInput)
    }

    /// Creates a new configuration error.
    pub fn configuration() -> Self {
        Self::new(ErrorKind::Configuration)
    }

    /// Creates a new serialization error.
    pub fn serialization() -> Self {
        Self::new(ErrorKind::Serialization)
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error kind as a string.
    pub fn kind_str(&self) -> &'static str {
        self.kind.into()
    }

    /// Returns the primary message, falling back to the kind name.
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_else(|| self.kind.as_ref())
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::from_source(ErrorKind::Serialization, error).with_message("Invalid JSON payload")
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_error_new() {
        let error = Error::new(ErrorKind::Read);
        assert_eq!(error.kind, ErrorKind::Read);
        assert!(error.message.is_none());
        assert!(error.source.is_none());
        assert_eq!(error.message(), "read");
    }

    #[test]
    fn test_error_builder_pattern() {
        let error = Error::delete().with_message("Could not delete annotation with ID 7");

        assert_eq!(error.kind(), ErrorKind::Delete);
        assert_eq!(error.message(), "Could not delete annotation with ID 7");
    }

    #[test]
    fn test_error_display() {
        let error = Error::create().with_message("Could not create annotation");

        let display_str = error.to_string();
        assert!(display_str.contains("create"));
        assert!(display_str.contains("Could not create annotation"));
    }

    #[test]
    fn test_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = Error::from(json_error);

        assert_eq!(error.kind, ErrorKind::Serialization);
        assert!(error.source.is_some());
    }

    #[test]
    fn test_reported_kinds() {
        assert!(ErrorKind::Create.is_reported());
        assert!(ErrorKind::Read.is_reported());
        assert!(ErrorKind::Delete.is_reported());
        assert!(ErrorKind::Authorization.is_reported());

        assert!(!ErrorKind::InvalidInput.is_reported());
        assert!(!ErrorKind::Configuration.is_reported());
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            ErrorKind::from_str("authorization").unwrap(),
            ErrorKind::Authorization
        );
        assert_eq!(ErrorKind::from_str("read").unwrap(), ErrorKind::Read);
        assert!(ErrorKind::from_str("unknown").is_err());
    }
}
