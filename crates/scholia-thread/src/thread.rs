//! Annotation thread: state machine and optimistic save/delete protocol.

use std::collections::HashMap;
use std::sync::Arc;

use jiff::Timestamp;
use scholia_core::{
    Annotation, AnnotationType, Dialog, EventHub, Location, Permissions, is_blank_highlight,
    sort_chronologically,
};
use scholia_gateway::AnnotationGateway;
use tokio::sync::RwLock;
use tokio::sync::broadcast;

use crate::registry::RegistryRef;
use crate::{DialogAction, TRACING_TARGET_THREAD, ThreadEvent, ThreadRegistry, ThreadState};

/// Options for creating an [`AnnotationThread`].
pub struct ThreadOptions {
    file_version_id: String,
    thread_id: Option<String>,
    thread_number: Option<u32>,
    annotation_type: AnnotationType,
    location: Location,
    annotations: Vec<Annotation>,
    is_mobile: bool,
    dialog: Option<Box<dyn Dialog>>,
    bus: Option<EventHub<ThreadEvent>>,
}

impl std::fmt::Debug for ThreadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadOptions")
            .field("file_version_id", &self.file_version_id)
            .field("thread_id", &self.thread_id)
            .field("annotation_type", &self.annotation_type)
            .field("annotations", &self.annotations.len())
            .field("is_mobile", &self.is_mobile)
            .finish_non_exhaustive()
    }
}

impl ThreadOptions {
    /// Creates options for a thread anchored at `location`.
    pub fn new(
        file_version_id: impl Into<String>,
        annotation_type: AnnotationType,
        location: Location,
    ) -> Self {
        Self {
            file_version_id: file_version_id.into(),
            thread_id: None,
            thread_number: None,
            annotation_type,
            location,
            annotations: Vec::new(),
            is_mobile: false,
            dialog: None,
            bus: None,
        }
    }

    /// Sets the thread identifier; a fresh one is generated otherwise.
    #[must_use]
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Sets the thread ordinal.
    #[must_use]
    pub fn with_thread_number(mut self, thread_number: u32) -> Self {
        self.thread_number = Some(thread_number);
        self
    }

    /// Sets the initial, confirmed annotations.
    #[must_use]
    pub fn with_annotations(mut self, annotations: Vec<Annotation>) -> Self {
        self.annotations = annotations;
        self
    }

    /// Marks the thread as living on a touch surface.
    #[must_use]
    pub fn with_mobile(mut self, is_mobile: bool) -> Self {
        self.is_mobile = is_mobile;
        self
    }

    /// Sets the dialog driven by the thread.
    #[must_use]
    pub fn with_dialog(mut self, dialog: impl Dialog + 'static) -> Self {
        self.dialog = Some(Box::new(dialog));
        self
    }

    /// Sets an already boxed dialog.
    #[must_use]
    pub fn with_boxed_dialog(mut self, dialog: Box<dyn Dialog>) -> Self {
        self.dialog = Some(dialog);
        self
    }

    /// Forwards every event of the thread to a shared bus as well.
    #[must_use]
    pub fn with_bus(mut self, bus: EventHub<ThreadEvent>) -> Self {
        self.bus = Some(bus);
        self
    }
}

/// Mutable thread state, guarded by the thread's lock.
struct ThreadData {
    state: ThreadState,
    annotation_type: AnnotationType,
    location: Location,
    thread_number: Option<u32>,
    annotations: HashMap<String, Annotation>,
    dialog: Option<Box<dyn Dialog>>,
    registry: Option<RegistryRef>,
    destroyed: bool,
}

impl ThreadData {
    fn dialog(&mut self) -> Option<&mut (dyn Dialog + 'static)> {
        self.dialog.as_deref_mut()
    }

    /// Earliest annotation of the thread, the one anchoring it.
    fn anchor(&self) -> Option<&Annotation> {
        self.annotations
            .values()
            .min_by(|a, b| a.created_at.cmp(&b.created_at))
    }
}

/// Inner thread state shared between handles.
struct ThreadInner {
    thread_id: String,
    file_version_id: String,
    is_mobile: bool,
    gateway: AnnotationGateway,
    events: EventHub<ThreadEvent>,
    bus: Option<EventHub<ThreadEvent>>,
    data: RwLock<ThreadData>,
}

/// Outcome of removing annotations locally.
enum Remaining {
    Some,
    Revert,
    Destroy,
}

/// A group of annotations anchored at one location.
///
/// Handles are cheap to clone and share the same thread. Saves and deletes
/// are optimistic: local state changes first, then the gateway is called
/// without holding the thread's lock, and completions reconcile by the
/// temporary annotation's client-generated id. Completions whose thread was
/// destroyed meanwhile are no-ops.
///
/// Failures never escape as errors; they become [`ThreadEvent`]s.
#[derive(Clone)]
pub struct AnnotationThread {
    inner: Arc<ThreadInner>,
}

impl std::fmt::Debug for AnnotationThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationThread")
            .field("thread_id", &self.inner.thread_id)
            .finish_non_exhaustive()
    }
}

impl AnnotationThread {
    /// Creates a thread. A thread without annotations starts `pending`,
    /// otherwise `inactive`.
    pub fn new(gateway: AnnotationGateway, options: ThreadOptions) -> Self {
        let thread_id = options
            .thread_id
            .or_else(|| options.annotations.first().map(|a| a.thread_id.clone()))
            .unwrap_or_else(AnnotationGateway::generate_id);

        let thread_number = options
            .thread_number
            .or_else(|| options.annotations.iter().find_map(|a| a.thread_number));

        let state = if options.annotations.is_empty() {
            ThreadState::Pending
        } else {
            ThreadState::Inactive
        };

        let mut dialog = options.dialog;
        let mut annotations = HashMap::with_capacity(options.annotations.len());
        for annotation in options.annotations {
            if let Some(dialog) = dialog.as_deref_mut() {
                dialog.add_annotation(&annotation);
            }
            annotations.insert(annotation.id.clone(), annotation);
        }

        tracing::debug!(
            target: TRACING_TARGET_THREAD,
            thread_id = %thread_id,
            state = %state,
            annotations = annotations.len(),
            "Creating annotation thread"
        );

        let data = ThreadData {
            state,
            annotation_type: options.annotation_type,
            location: options.location,
            thread_number,
            annotations,
            dialog,
            registry: None,
            destroyed: false,
        };

        let inner = ThreadInner {
            thread_id,
            file_version_id: options.file_version_id,
            is_mobile: options.is_mobile,
            gateway,
            events: EventHub::new(),
            bus: options.bus,
            data: RwLock::new(data),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Returns the thread identifier.
    pub fn thread_id(&self) -> &str {
        &self.inner.thread_id
    }

    /// Returns the file version the thread belongs to.
    pub fn file_version_id(&self) -> &str {
        &self.inner.file_version_id
    }

    /// Returns whether both handles point to the same thread.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Subscribes to this thread's events.
    pub fn subscribe(&self) -> broadcast::Receiver<ThreadEvent> {
        self.inner.events.subscribe()
    }

    /// Returns the current state.
    pub async fn state(&self) -> ThreadState {
        self.inner.data.read().await.state
    }

    /// Returns the annotation type of the thread.
    pub async fn annotation_type(&self) -> AnnotationType {
        self.inner.data.read().await.annotation_type
    }

    /// Returns the thread's location.
    pub async fn location(&self) -> Location {
        self.inner.data.read().await.location.clone()
    }

    /// Returns the page the thread sits on.
    pub async fn page(&self) -> u32 {
        self.inner.data.read().await.location.page()
    }

    /// Returns the thread ordinal, once assigned.
    pub async fn thread_number(&self) -> Option<u32> {
        self.inner.data.read().await.thread_number
    }

    /// Returns the annotations in chronological order.
    pub async fn annotations(&self) -> Vec<Annotation> {
        let mut annotations: Vec<_> = {
            let data = self.inner.data.read().await;
            data.annotations.values().cloned().collect()
        };
        annotations.sort_by(|a, b| a.id.cmp(&b.id));
        sort_chronologically(&mut annotations);
        annotations
    }

    /// Returns one annotation.
    pub async fn annotation(&self, annotation_id: &str) -> Option<Annotation> {
        self.inner
            .data
            .read()
            .await
            .annotations
            .get(annotation_id)
            .cloned()
    }

    /// Returns the number of annotations, temporary ones included.
    pub async fn len(&self) -> usize {
        self.inner.data.read().await.annotations.len()
    }

    /// Returns whether the thread holds no annotation.
    pub async fn is_empty(&self) -> bool {
        self.inner.data.read().await.annotations.is_empty()
    }

    /// Returns whether the thread was destroyed or unmounted.
    pub async fn is_destroyed(&self) -> bool {
        self.inner.data.read().await.destroyed
    }

    /// Moves the thread. Registries must be updated by re-registering.
    pub async fn set_location(&self, location: Location) {
        self.inner.data.write().await.location = location;
    }

    /// Forgets any interaction state.
    pub async fn reset(&self) {
        self.set_state(ThreadState::Inactive).await;
    }

    /// Marks an unsaved thread as being composed.
    pub async fn begin_composing(&self) {
        let mut data = self.inner.data.write().await;
        if data.state == ThreadState::Pending {
            data.state = ThreadState::PendingActive;
        }
    }

    /// Shows the dialog.
    pub async fn show_dialog(&self) {
        let mut data = self.inner.data.write().await;
        if data.destroyed {
            return;
        }

        data.state = if data.state.is_unsaved() {
            ThreadState::PendingActive
        } else {
            ThreadState::Hover
        };

        if let Some(dialog) = data.dialog() {
            dialog.show();
        }
    }

    /// Hides the dialog.
    pub async fn hide_dialog(&self) {
        let mut data = self.inner.data.write().await;
        if data.destroyed {
            return;
        }

        data.state = ThreadState::Inactive;
        if let Some(dialog) = data.dialog() {
            dialog.hide();
        }
    }

    async fn set_state(&self, state: ThreadState) {
        let mut data = self.inner.data.write().await;
        if !data.destroyed {
            data.state = state;
        }
    }

    /// Saves a new annotation optimistically.
    ///
    /// A temporary annotation is shown right away with its controls
    /// disabled, then swapped for the confirmed one once the server answers.
    /// Returns the confirmed annotation, or `None` if the save failed or the
    /// temporary annotation was discarded in the meantime.
    pub async fn save_annotation(
        &self,
        annotation_type: AnnotationType,
        text: impl Into<String>,
    ) -> Option<Annotation> {
        let text = text.into();
        let created_by = self.inner.gateway.session().user().await;
        let now = Timestamp::now();

        let (temporary, previous_state) = {
            let mut data = self.inner.data.write().await;
            if data.destroyed {
                tracing::warn!(
                    target: TRACING_TARGET_THREAD,
                    thread_id = %self.inner.thread_id,
                    "Save on destroyed thread ignored"
                );
                return None;
            }

            let temporary = Annotation {
                id: AnnotationGateway::generate_id(),
                thread_id: self.inner.thread_id.clone(),
                thread_number: data.thread_number,
                file_version_id: self.inner.file_version_id.clone(),
                annotation_type,
                message: text.clone(),
                location: data.location.clone(),
                drawing_paths: None,
                created_by,
                permissions: Permissions::full(),
                created_at: now,
                modified_at: now,
                is_pending: true,
            };

            if annotation_type.is_comment_bearing() && data.annotation_type.is_highlight() {
                data.annotation_type = annotation_type;
            }

            data.annotations
                .insert(temporary.id.clone(), temporary.clone());
            if let Some(dialog) = data.dialog() {
                dialog.add_annotation(&temporary);
                dialog.set_controls_enabled(&temporary.id, false);
            }

            let previous_state = data.state;
            if previous_state.is_unsaved() {
                data.state = ThreadState::Hover;
            }

            (temporary, previous_state)
        };

        tracing::debug!(
            target: TRACING_TARGET_THREAD,
            thread_id = %self.inner.thread_id,
            temporary_id = %temporary.id,
            "Saving annotation"
        );

        match self.inner.gateway.create(&temporary).await {
            Ok(confirmed) => self.reconcile(&temporary.id, confirmed).await,
            Err(error) => {
                self.discard_temporary(&temporary.id, previous_state).await;
                self.emit(ThreadEvent::CreateError {
                    thread_id: self.inner.thread_id.clone(),
                    text,
                    reason: error.kind,
                });
                None
            }
        }
    }

    /// Swaps a temporary annotation for its confirmed counterpart.
    async fn reconcile(&self, temporary_id: &str, confirmed: Annotation) -> Option<Annotation> {
        let event = {
            let mut data = self.inner.data.write().await;
            if data.destroyed || data.annotations.remove(temporary_id).is_none() {
                tracing::debug!(
                    target: TRACING_TARGET_THREAD,
                    thread_id = %self.inner.thread_id,
                    temporary_id,
                    annotation_id = %confirmed.id,
                    "Temporary annotation gone, reconciliation skipped"
                );
                return None;
            }

            if data.thread_number.is_none() {
                data.thread_number = confirmed.thread_number;
            }

            data.annotations
                .insert(confirmed.id.clone(), confirmed.clone());

            let is_mobile = self.inner.is_mobile;
            if is_mobile {
                data.state = ThreadState::Hover;
            }

            if let Some(dialog) = data.dialog() {
                if confirmed.id != temporary_id {
                    dialog.remove_annotation(temporary_id);
                    dialog.add_annotation(&confirmed);
                }
                dialog.set_controls_enabled(&confirmed.id, true);
                if is_mobile {
                    dialog.show();
                }
            }

            ThreadEvent::Saved {
                thread_id: self.inner.thread_id.clone(),
                thread_number: data.thread_number,
                annotation_id: confirmed.id.clone(),
            }
        };

        tracing::debug!(
            target: TRACING_TARGET_THREAD,
            thread_id = %self.inner.thread_id,
            temporary_id,
            annotation_id = %confirmed.id,
            "Annotation reconciled"
        );

        self.emit(event);
        Some(confirmed)
    }

    /// Drops a temporary annotation whose create failed.
    ///
    /// A thread left empty by its first save is destroyed and cancelled.
    async fn discard_temporary(&self, temporary_id: &str, previous_state: ThreadState) {
        let abandoned = {
            let mut data = self.inner.data.write().await;
            if data.destroyed || data.annotations.remove(temporary_id).is_none() {
                return;
            }

            if let Some(dialog) = data.dialog() {
                dialog.remove_annotation(temporary_id);
            }

            tracing::debug!(
                target: TRACING_TARGET_THREAD,
                thread_id = %self.inner.thread_id,
                temporary_id,
                "Temporary annotation discarded"
            );

            data.annotations.is_empty() && previous_state.is_unsaved()
        };

        if abandoned && self.teardown(false).await {
            self.emit(ThreadEvent::Cancel {
                thread_id: self.inner.thread_id.clone(),
            });
        }
    }

    /// Adds an annotation that is already confirmed by the server.
    pub async fn create_annotation(&self, mut annotation: Annotation) -> bool {
        annotation.is_pending = false;

        let mut data = self.inner.data.write().await;
        if data.destroyed {
            return false;
        }

        if data.thread_number.is_none() {
            data.thread_number = annotation.thread_number;
        }

        if data.state.is_unsaved() {
            data.state = ThreadState::Inactive;
        }

        if let Some(dialog) = data.dialog() {
            dialog.add_annotation(&annotation);
        }

        data.annotations.insert(annotation.id.clone(), annotation);
        true
    }

    /// Deletes an annotation, optionally on the server as well.
    ///
    /// The local removal is immediate and never rolled back. When the last
    /// annotation goes, the thread is destroyed, except for a highlight whose
    /// anchor the actor may not delete: it reverts to a plain highlight.
    /// Returns `false` if the annotation is unknown.
    pub async fn delete_annotation(&self, annotation_id: &str, use_server: bool) -> bool {
        let (removed, placeholder, remaining) = {
            let mut data = self.inner.data.write().await;
            if data.destroyed {
                return false;
            }

            let anchor_can_delete = data
                .anchor()
                .is_none_or(|anchor| anchor.permissions.can_delete);

            let Some(removed) = data.annotations.remove(annotation_id) else {
                tracing::debug!(
                    target: TRACING_TARGET_THREAD,
                    thread_id = %self.inner.thread_id,
                    annotation_id,
                    "Unknown annotation, delete ignored"
                );
                return false;
            };

            if let Some(dialog) = data.dialog() {
                dialog.remove_annotation(annotation_id);
            }

            let placeholder = if use_server && is_blank_highlight(data.annotations.values()) {
                data.annotations
                    .values()
                    .find(|a| {
                        !a.is_pending
                            && a.permissions.can_delete
                            && a.annotation_type.is_highlight()
                    })
                    .map(|a| a.id.clone())
            } else {
                None
            };

            if let Some(placeholder) = placeholder.as_deref() {
                data.annotations.remove(placeholder);
                if let Some(dialog) = data.dialog() {
                    dialog.remove_annotation(placeholder);
                }
            }

            let remaining = if !data.annotations.is_empty() {
                if let Some(dialog) = data.dialog() {
                    dialog.activate_reply();
                }
                Remaining::Some
            } else if data.annotation_type.is_highlight() && !anchor_can_delete {
                Remaining::Revert
            } else {
                Remaining::Destroy
            };

            (removed, placeholder, remaining)
        };

        tracing::debug!(
            target: TRACING_TARGET_THREAD,
            thread_id = %self.inner.thread_id,
            annotation_id,
            use_server,
            "Annotation removed"
        );

        match remaining {
            Remaining::Some => {}
            Remaining::Revert => self.cancel_first_comment().await,
            Remaining::Destroy => {
                self.teardown(true).await;
            }
        }

        if use_server && !removed.is_pending && self.delete_on_server(annotation_id).await {
            if let Some(placeholder) = placeholder {
                self.delete_on_server(&placeholder).await;
            }
        }

        true
    }

    /// Deletes an annotation on the server, as the dialog does.
    pub async fn delete_annotation_with_id(&self, annotation_id: &str) -> bool {
        self.delete_annotation(annotation_id, true).await
    }

    /// Returns whether the server accepted the delete.
    async fn delete_on_server(&self, annotation_id: &str) -> bool {
        let (deleted, event) = match self.inner.gateway.delete(annotation_id).await {
            Ok(()) => (true, ThreadEvent::AnnotationDeleted {
                thread_id: self.inner.thread_id.clone(),
                annotation_id: annotation_id.to_owned(),
            }),
            Err(error) => (false, ThreadEvent::DeleteError {
                thread_id: self.inner.thread_id.clone(),
                annotation_id: annotation_id.to_owned(),
                reason: error.kind,
            }),
        };

        self.emit(event);
        deleted
    }

    /// Discards an unsaved thread, or hides the dialog of a saved one.
    pub async fn cancel_unsaved_annotation(&self) {
        if !self.state().await.is_unsaved() {
            self.hide_dialog().await;
            return;
        }

        if self.teardown(false).await {
            self.emit(ThreadEvent::Cancel {
                thread_id: self.inner.thread_id.clone(),
            });
        }
    }

    /// Turns a highlight whose only comment went away back into a plain
    /// highlight.
    pub async fn cancel_first_comment(&self) {
        {
            let mut data = self.inner.data.write().await;
            if data.destroyed {
                return;
            }

            data.annotation_type = AnnotationType::Highlight;
            data.state = ThreadState::Inactive;
            if let Some(dialog) = data.dialog() {
                dialog.revert_to_plain_highlight();
                dialog.hide();
            }
        }

        self.emit(ThreadEvent::FirstCommentCancelled {
            thread_id: self.inner.thread_id.clone(),
        });
    }

    /// Routes an action raised by the dialog.
    pub async fn handle_dialog_action(&self, action: DialogAction) -> bool {
        match action {
            DialogAction::Create {
                annotation_type,
                text,
            } => self.save_annotation(annotation_type, text).await.is_some(),
            DialogAction::Cancel => {
                self.cancel_unsaved_annotation().await;
                true
            }
            DialogAction::Delete { annotation_id } => {
                self.delete_annotation_with_id(&annotation_id).await
            }
        }
    }

    /// Destroys the thread: releases its dialog, leaves the registry and
    /// announces `ThreadDeleted` unless it was never saved.
    ///
    /// Only the first call has an effect; it returns `true`.
    pub async fn destroy(&self) -> bool {
        self.teardown(true).await
    }

    /// Destroys the thread without announcing it, as done on reload.
    pub async fn unmount(&self) -> bool {
        self.teardown(false).await
    }

    async fn teardown(&self, announce: bool) -> bool {
        let (registry, was_unsaved) = {
            let mut data = self.inner.data.write().await;
            if data.destroyed {
                return false;
            }

            data.destroyed = true;
            if let Some(mut dialog) = data.dialog.take() {
                dialog.destroy();
            }

            (data.registry.take(), data.state.is_unsaved())
        };

        if let Some(registry) = registry.as_ref().and_then(ThreadRegistry::from_ref) {
            registry.remove_thread(self).await;
        }

        tracing::debug!(
            target: TRACING_TARGET_THREAD,
            thread_id = %self.inner.thread_id,
            announce,
            was_unsaved,
            "Thread destroyed"
        );

        if announce && !was_unsaved {
            self.emit(ThreadEvent::ThreadDeleted {
                thread_id: self.inner.thread_id.clone(),
            });
        }

        true
    }

    pub(crate) async fn attach_registry(&self, registry: RegistryRef) {
        let mut data = self.inner.data.write().await;
        if !data.destroyed {
            data.registry = Some(registry);
        }
    }

    pub(crate) async fn detach_registry(&self, registry: &RegistryRef) {
        let mut data = self.inner.data.write().await;
        if data
            .registry
            .as_ref()
            .is_some_and(|current| current.ptr_eq(registry))
        {
            data.registry = None;
        }
    }

    fn emit(&self, event: ThreadEvent) {
        tracing::debug!(
            target: TRACING_TARGET_THREAD,
            thread_id = %self.inner.thread_id,
            event = event.as_ref(),
            "Thread event"
        );

        if let Some(bus) = self.inner.bus.as_ref() {
            bus.emit(event.clone());
        }
        self.inner.events.emit(event);
    }
}
