//! Events published by threads.

use scholia_core::ErrorKind;
use strum::{AsRefStr, IntoStaticStr};

/// Lifecycle event of an annotation thread.
#[derive(Debug, Clone, PartialEq)]
#[derive(AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum ThreadEvent {
    /// A temporary annotation was confirmed by the server.
    Saved {
        /// Thread identifier.
        thread_id: String,
        /// Thread ordinal after reconciliation.
        thread_number: Option<u32>,
        /// Server id of the confirmed annotation.
        annotation_id: String,
    },
    /// A save failed; the temporary annotation was discarded.
    CreateError {
        /// Thread identifier.
        thread_id: String,
        /// Text the user attempted to save, for a retry.
        text: String,
        /// Failure classification.
        reason: ErrorKind,
    },
    /// A server-side delete failed. The local removal is kept.
    DeleteError {
        /// Thread identifier.
        thread_id: String,
        /// Annotation that could not be deleted.
        annotation_id: String,
        /// Failure classification.
        reason: ErrorKind,
    },
    /// An annotation was deleted on the server.
    AnnotationDeleted {
        /// Thread identifier.
        thread_id: String,
        /// Deleted annotation.
        annotation_id: String,
    },
    /// A saved thread was destroyed.
    ThreadDeleted {
        /// Thread identifier.
        thread_id: String,
    },
    /// An unsaved thread was discarded.
    Cancel {
        /// Thread identifier.
        thread_id: String,
    },
    /// A highlight's only comment was removed; the highlight remains.
    FirstCommentCancelled {
        /// Thread identifier.
        thread_id: String,
    },
}

impl ThreadEvent {
    /// Returns the identifier of the thread that emitted this event.
    pub fn thread_id(&self) -> &str {
        match self {
            Self::Saved { thread_id, .. }
            | Self::CreateError { thread_id, .. }
            | Self::DeleteError { thread_id, .. }
            | Self::AnnotationDeleted { thread_id, .. }
            | Self::ThreadDeleted { thread_id }
            | Self::Cancel { thread_id }
            | Self::FirstCommentCancelled { thread_id } => thread_id,
        }
    }

    /// Returns whether this event reports a failed server operation.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::CreateError { .. } | Self::DeleteError { .. })
    }
}
