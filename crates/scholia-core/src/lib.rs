#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for event hub operations.
pub const TRACING_TARGET_EVENTS: &str = "scholia_core::events";

mod error;

pub mod annotation;
pub mod dialog;
pub mod events;

pub use annotation::{
    ANONYMOUS_USER_ID, Annotation, AnnotationBuilder, AnnotationBuilderError, AnnotationType,
    DEFAULT_ANONYMOUS_NAME, Location, Permissions, User, is_blank_highlight, is_temporary,
    sort_chronologically,
};
pub use dialog::{Dialog, NoopDialog};
pub use error::{BoxedError, Error, ErrorKind, Result};
pub use events::EventHub;
