//! Commands routed into threads.

use scholia_core::AnnotationType;

use crate::AnnotationThread;

/// Action raised by a thread's dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogAction {
    /// The user submitted a comment (`annotationcreate`).
    Create {
        /// Type of the new annotation.
        annotation_type: AnnotationType,
        /// Comment text.
        text: String,
    },
    /// The user dismissed the composer (`annotationcancel`).
    Cancel,
    /// The user deleted a comment (`annotationdelete`).
    Delete {
        /// Annotation to delete.
        annotation_id: String,
    },
}

/// Command handled by [`Annotator::dispatch`].
///
/// [`Annotator::dispatch`]: crate::Annotator::dispatch
#[derive(Debug, Clone)]
pub enum ThreadCommand {
    /// Saves a new annotation into a registered thread.
    Save {
        /// Target thread.
        thread_id: String,
        /// Type of the new annotation.
        annotation_type: AnnotationType,
        /// Comment text.
        text: String,
    },
    /// Cancels a registered thread's unsaved annotation.
    Cancel {
        /// Target thread.
        thread_id: String,
    },
    /// Deletes an annotation of a registered thread on the server.
    Delete {
        /// Target thread.
        thread_id: String,
        /// Annotation to delete.
        annotation_id: String,
    },
    /// Registers a thread under its current page.
    RegisterThread(AnnotationThread),
    /// Removes a thread from the registry.
    UnregisterThread {
        /// Thread to remove.
        thread_id: String,
    },
}
