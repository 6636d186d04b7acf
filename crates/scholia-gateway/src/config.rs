//! Gateway configuration.

#[cfg(feature = "config")]
use clap::Args;
use scholia_core::{DEFAULT_ANONYMOUS_NAME, Error, Result};
use serde::{Deserialize, Serialize};

/// Fields requested for every annotation read.
pub const DEFAULT_READ_FIELDS: &str =
    "item,thread,details,message,created_by,created_at,modified_at,permissions";

/// Configuration for the annotation gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct GatewayConfig {
    /// Identifier of the file whose annotations are managed
    #[cfg_attr(
        feature = "config",
        arg(long = "annotations-file-id", env = "ANNOTATIONS_FILE_ID")
    )]
    pub file_id: String,

    /// Page size requested while reading; server default when unset
    #[cfg_attr(
        feature = "config",
        arg(long = "annotations-page-size", env = "ANNOTATIONS_PAGE_SIZE")
    )]
    #[serde(default)]
    pub page_size: Option<u32>,

    /// Display name of the anonymous placeholder user
    #[cfg_attr(
        feature = "config",
        arg(
            long = "annotations-anonymous-name",
            env = "ANNOTATIONS_ANONYMOUS_NAME",
            default_value = "Anonymous"
        )
    )]
    #[serde(default = "default_anonymous_name")]
    pub anonymous_user_name: String,
}

fn default_anonymous_name() -> String {
    DEFAULT_ANONYMOUS_NAME.to_owned()
}

impl GatewayConfig {
    /// Creates a configuration for the given file.
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            page_size: None,
            anonymous_user_name: default_anonymous_name(),
        }
    }

    /// Sets the page size used while reading.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Sets the anonymous user's display name.
    #[must_use]
    pub fn with_anonymous_user_name(mut self, name: impl Into<String>) -> Self {
        self.anonymous_user_name = name.into();
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.file_id.trim().is_empty() {
            return Err(Error::configuration().with_message("File ID cannot be empty"));
        }

        if self.page_size == Some(0) {
            return Err(Error::configuration().with_message("Page size must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use scholia_core::ErrorKind;

    use super::*;

    #[test]
    fn test_new_config() {
        let config = GatewayConfig::new("file-1");
        assert_eq!(config.file_id, "file-1");
        assert!(config.page_size.is_none());
        assert_eq!(config.anonymous_user_name, "Anonymous");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = GatewayConfig::new("file-1")
            .with_page_size(50)
            .with_anonymous_user_name("Guest");

        assert_eq!(config.page_size, Some(50));
        assert_eq!(config.anonymous_user_name, "Guest");
    }

    #[test]
    fn test_validation() {
        let error = GatewayConfig::new(" ").validate().unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);

        let error = GatewayConfig::new("f").with_page_size(0).validate();
        assert!(error.is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: GatewayConfig = serde_json::from_str(r#"{"file_id":"f"}"#).unwrap();
        assert_eq!(config.anonymous_user_name, "Anonymous");
        assert!(config.page_size.is_none());
    }
}
