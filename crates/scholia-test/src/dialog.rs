//! Dialog double recording every call it receives.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scholia_core::{Annotation, Dialog};

/// A single call received by a [`RecordingDialog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogCall {
    /// `add_annotation` with the annotation's id.
    Add(String),
    /// `remove_annotation`.
    Remove(String),
    /// `set_controls_enabled`.
    Controls {
        /// Annotation whose controls changed.
        annotation_id: String,
        /// New state.
        enabled: bool,
    },
    /// `activate_reply`.
    ActivateReply,
    /// `show`.
    Show,
    /// `hide`.
    Hide,
    /// `revert_to_plain_highlight`.
    RevertToPlainHighlight,
    /// `destroy`.
    Destroy,
}

/// Shared log of dialog calls, readable after the dialog moved into a thread.
#[derive(Debug, Clone, Default)]
pub struct DialogLog {
    calls: Arc<Mutex<Vec<DialogCall>>>,
}

impl DialogLog {
    fn lock(&self) -> MutexGuard<'_, Vec<DialogCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: DialogCall) {
        self.lock().push(call);
    }

    /// Returns every call so far, in order.
    pub fn calls(&self) -> Vec<DialogCall> {
        self.lock().clone()
    }

    /// Returns whether `call` was received.
    pub fn contains(&self, call: &DialogCall) -> bool {
        self.lock().contains(call)
    }

    /// Returns how many times `call` was received.
    pub fn count(&self, call: &DialogCall) -> usize {
        self.lock().iter().filter(|c| *c == call).count()
    }

    /// Forgets every recorded call.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Dialog that records calls into a [`DialogLog`].
#[derive(Debug, Clone, Default)]
pub struct RecordingDialog {
    log: DialogLog,
}

impl RecordingDialog {
    /// Creates a dialog together with a handle to its log.
    pub fn new() -> (Self, DialogLog) {
        let dialog = Self::default();
        let log = dialog.log.clone();
        (dialog, log)
    }

    /// Creates a dialog writing into an existing log.
    pub fn with_log(log: DialogLog) -> Self {
        Self { log }
    }

    /// Returns a handle to this dialog's log.
    pub fn log(&self) -> DialogLog {
        self.log.clone()
    }
}

impl Dialog for RecordingDialog {
    fn add_annotation(&mut self, annotation: &Annotation) {
        self.log.record(DialogCall::Add(annotation.id.clone()));
    }

    fn remove_annotation(&mut self, annotation_id: &str) {
        self.log.record(DialogCall::Remove(annotation_id.to_owned()));
    }

    fn set_controls_enabled(&mut self, annotation_id: &str, enabled: bool) {
        self.log.record(DialogCall::Controls {
            annotation_id: annotation_id.to_owned(),
            enabled,
        });
    }

    fn activate_reply(&mut self) {
        self.log.record(DialogCall::ActivateReply);
    }

    fn show(&mut self) {
        self.log.record(DialogCall::Show);
    }

    fn hide(&mut self) {
        self.log.record(DialogCall::Hide);
    }

    fn revert_to_plain_highlight(&mut self) {
        self.log.record(DialogCall::RevertToPlainHighlight);
    }

    fn destroy(&mut self) {
        self.log.record(DialogCall::Destroy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_is_shared_with_the_dialog() {
        let (mut dialog, log) = RecordingDialog::new();
        dialog.show();
        dialog.set_controls_enabled("a1", false);
        dialog.show();

        assert_eq!(log.count(&DialogCall::Show), 2);
        assert!(log.contains(&DialogCall::Controls {
            annotation_id: "a1".into(),
            enabled: false,
        }));

        log.clear();
        assert!(log.calls().is_empty());
    }
}
