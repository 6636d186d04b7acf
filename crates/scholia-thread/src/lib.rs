#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for thread lifecycle operations.
///
/// Use this target for saves, deletes, reconciliation and destruction.
pub const TRACING_TARGET_THREAD: &str = "scholia_thread::thread";

/// Tracing target for registry updates.
pub const TRACING_TARGET_REGISTRY: &str = "scholia_thread::registry";

/// Tracing target for the annotator: loads, validation and event handling.
pub const TRACING_TARGET_ANNOTATOR: &str = "scholia_thread::annotator";

mod annotator;
mod command;
mod event;
mod registry;
mod state;
mod thread;

pub use annotator::{Annotator, AnnotatorEvent, AnnotatorOptions, DialogFactory, ViewerPermissions};
pub use command::{DialogAction, ThreadCommand};
pub use event::ThreadEvent;
pub use registry::ThreadRegistry;
pub use state::ThreadState;
pub use thread::{AnnotationThread, ThreadOptions};
