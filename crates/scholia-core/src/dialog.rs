//! Comment dialog collaborator.
//!
//! The dialog renders a thread's comments and the reply composer. Rendering
//! lives outside this workspace; threads only drive it through [`Dialog`].

use crate::Annotation;

/// Interface a thread uses to keep its dialog in sync.
///
/// Calls are synchronous and must not fail: the dialog is a view over the
/// thread's state, never a source of truth.
pub trait Dialog: Send + Sync {
    /// Shows a comment in the dialog.
    fn add_annotation(&mut self, annotation: &Annotation);

    /// Removes a comment from the dialog.
    fn remove_annotation(&mut self, annotation_id: &str);

    /// Enables or disables the interactive controls of one comment.
    fn set_controls_enabled(&mut self, annotation_id: &str, enabled: bool);

    /// Re-activates the reply composer.
    fn activate_reply(&mut self);

    /// Makes the dialog visible.
    fn show(&mut self);

    /// Hides the dialog.
    fn hide(&mut self);

    /// Switches a highlight dialog back to the plain (commentless) form.
    fn revert_to_plain_highlight(&mut self) {}

    /// Releases every resource held by the dialog.
    fn destroy(&mut self);
}

/// Dialog that renders nothing, for headless threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDialog;

impl Dialog for NoopDialog {
    fn add_annotation(&mut self, _annotation: &Annotation) {}

    fn remove_annotation(&mut self, _annotation_id: &str) {}

    fn set_controls_enabled(&mut self, _annotation_id: &str, _enabled: bool) {}

    fn activate_reply(&mut self) {}

    fn show(&mut self) {}

    fn hide(&mut self) {}

    fn destroy(&mut self) {}
}
