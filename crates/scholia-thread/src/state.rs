//! Interaction states of a thread.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Interaction state of an annotation thread.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ThreadState {
    /// Freshly created with no annotations, awaiting a first save or a cancel.
    #[default]
    Pending,
    /// Unsaved, and the user is composing in the dialog.
    PendingActive,
    /// Has annotations and its dialog is the one being interacted with.
    Hover,
    /// Has annotations and is resting.
    Inactive,
}

impl ThreadState {
    /// Returns whether nothing of this thread has been saved yet.
    #[must_use]
    pub const fn is_unsaved(&self) -> bool {
        matches!(self, Self::Pending | Self::PendingActive)
    }
}
