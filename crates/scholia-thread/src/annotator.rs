//! Annotator: loads threads for a file version and reacts to their events.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use scholia_core::{
    Annotation, AnnotationType, Dialog, Error, ErrorKind, EventHub, Location, Result,
    sort_chronologically,
};
use scholia_gateway::{AnnotationGateway, GatewayEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{Mutex, broadcast};

use crate::{
    AnnotationThread, TRACING_TARGET_ANNOTATOR, ThreadCommand, ThreadEvent, ThreadOptions,
    ThreadRegistry,
};

/// What the viewer may see and do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerPermissions {
    /// Whether the viewer may create annotations.
    #[serde(default)]
    pub can_annotate: bool,
    /// Whether the viewer may see everyone's annotations.
    #[serde(default = "default_true")]
    pub can_view_all: bool,
    /// Whether the viewer may see their own annotations.
    #[serde(default = "default_true")]
    pub can_view_own: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ViewerPermissions {
    fn default() -> Self {
        Self {
            can_annotate: false,
            can_view_all: true,
            can_view_own: true,
        }
    }
}

impl ViewerPermissions {
    /// Returns whether any annotation may be shown at all.
    pub const fn can_view(&self) -> bool {
        self.can_view_all || self.can_view_own
    }
}

fn default_supported_types() -> Vec<AnnotationType> {
    AnnotationType::ALL.to_vec()
}

/// Configuration of an [`Annotator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatorOptions {
    /// File version whose annotations are shown.
    pub file_version_id: String,
    /// Viewer permissions.
    #[serde(default)]
    pub permissions: ViewerPermissions,
    /// Whether threads live on a touch surface.
    #[serde(default)]
    pub is_mobile: bool,
    /// Annotation types this viewer can render.
    #[serde(default = "default_supported_types")]
    pub supported_types: Vec<AnnotationType>,
}

impl AnnotatorOptions {
    /// Creates options for a file version, with every type supported.
    pub fn new(file_version_id: impl Into<String>) -> Self {
        Self {
            file_version_id: file_version_id.into(),
            permissions: ViewerPermissions::default(),
            is_mobile: false,
            supported_types: default_supported_types(),
        }
    }

    /// Sets the viewer permissions.
    #[must_use]
    pub fn with_permissions(mut self, permissions: ViewerPermissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Marks the viewer as a touch surface.
    #[must_use]
    pub fn with_mobile(mut self, is_mobile: bool) -> Self {
        self.is_mobile = is_mobile;
        self
    }

    /// Restricts the supported annotation types.
    #[must_use]
    pub fn with_supported_types(mut self, types: impl IntoIterator<Item = AnnotationType>) -> Self {
        self.supported_types = types.into_iter().collect();
        self
    }

    /// Returns whether annotations of `annotation_type` can be rendered.
    pub fn supports(&self, annotation_type: AnnotationType) -> bool {
        self.supported_types.contains(&annotation_type)
    }

    /// Validates the options.
    pub fn validate(&self) -> Result<()> {
        if self.file_version_id.trim().is_empty() {
            return Err(Error::configuration().with_message("File version ID cannot be empty"));
        }

        if self.supported_types.is_empty() {
            return Err(
                Error::configuration().with_message("At least one annotation type is required")
            );
        }

        Ok(())
    }
}

/// Creates the dialog of each thread built by the annotator.
pub trait DialogFactory: Send + Sync {
    /// Creates a dialog for a thread.
    fn create_dialog(&self, thread_id: &str, annotation_type: AnnotationType) -> Box<dyn Dialog>;
}

impl<F> DialogFactory for F
where
    F: Fn(&str, AnnotationType) -> Box<dyn Dialog> + Send + Sync,
{
    fn create_dialog(&self, thread_id: &str, annotation_type: AnnotationType) -> Box<dyn Dialog> {
        self(thread_id, annotation_type)
    }
}

/// Events published by the [`Annotator`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotatorEvent {
    /// Annotations could not be loaded; the registry stays empty.
    LoadError {
        /// Human-readable message.
        message: String,
    },
    /// A gateway operation failed.
    Error {
        /// Failure classification.
        reason: ErrorKind,
        /// Human-readable message.
        message: String,
    },
    /// A thread could not be created. Reported once per annotator.
    ValidationError,
    /// Annotations were loaded into the registry.
    AnnotationsLoaded {
        /// Number of threads registered.
        thread_count: usize,
    },
    /// An event raised by one of the annotator's threads.
    Thread(ThreadEvent),
}

/// Builds, registers and supervises the threads of one file version.
///
/// Threads built here forward their events to a shared bus. Those events,
/// and the gateway's error events, are consumed by
/// [`Annotator::process_pending_events`] or [`Annotator::run`]: create and
/// delete failures trigger a full reload, destroyed or cancelled threads
/// are unregistered, and everything is re-published as [`AnnotatorEvent`]s.
pub struct Annotator {
    gateway: AnnotationGateway,
    options: AnnotatorOptions,
    registry: ThreadRegistry,
    dialogs: Option<Arc<dyn DialogFactory>>,
    bus: EventHub<ThreadEvent>,
    events: EventHub<AnnotatorEvent>,
    bus_events: Mutex<broadcast::Receiver<ThreadEvent>>,
    gateway_events: Mutex<broadcast::Receiver<GatewayEvent>>,
    validation_reported: AtomicBool,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("options", &self.options)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Annotator {
    /// Creates an annotator with an empty registry.
    pub fn new(gateway: AnnotationGateway, options: AnnotatorOptions) -> Self {
        let bus = EventHub::<ThreadEvent>::new();
        let bus_events = Mutex::new(bus.subscribe());
        let gateway_events = Mutex::new(gateway.subscribe());

        Self {
            gateway,
            options,
            registry: ThreadRegistry::new(),
            dialogs: None,
            bus,
            events: EventHub::new(),
            bus_events,
            gateway_events,
            validation_reported: AtomicBool::new(false),
        }
    }

    /// Sets the factory creating each thread's dialog.
    #[must_use]
    pub fn with_dialog_factory(mut self, factory: impl DialogFactory + 'static) -> Self {
        self.dialogs = Some(Arc::new(factory));
        self
    }

    /// Gets the annotator options.
    pub fn options(&self) -> &AnnotatorOptions {
        &self.options
    }

    /// Gets the gateway.
    pub fn gateway(&self) -> &AnnotationGateway {
        &self.gateway
    }

    /// Gets the thread registry.
    pub fn registry(&self) -> &ThreadRegistry {
        &self.registry
    }

    /// Subscribes to annotator events.
    pub fn subscribe(&self) -> broadcast::Receiver<AnnotatorEvent> {
        self.events.subscribe()
    }

    /// Replaces the registry content with every thread of a file version.
    ///
    /// Threads registered before are unmounted first. Viewers who may see no
    /// annotation get an empty registry and the gateway is never called. A
    /// failed load is reported as [`AnnotatorEvent::LoadError`] and leaves
    /// the registry empty.
    pub async fn fetch_all(&self, file_version_id: &str) -> ThreadRegistry {
        self.unmount_all().await;

        if !self.options.permissions.can_view() {
            tracing::debug!(
                target: TRACING_TARGET_ANNOTATOR,
                file_version_id,
                "Viewer may not see annotations, skipping fetch"
            );
            return self.registry.clone();
        }

        let thread_map = match self.gateway.get_thread_map(file_version_id).await {
            Ok(thread_map) => thread_map,
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET_ANNOTATOR,
                    file_version_id,
                    error = %error,
                    "Could not load annotations"
                );
                self.events.emit(AnnotatorEvent::LoadError {
                    message: error.message().to_owned(),
                });
                return self.registry.clone();
            }
        };

        let mut thread_count = 0;
        for (thread_id, mut annotations) in thread_map {
            annotations.retain(|a| self.options.supports(a.annotation_type));
            if annotations.is_empty() {
                continue;
            }

            sort_chronologically(&mut annotations);
            let annotation_type = annotations[0].annotation_type;
            let location = annotations[0].location.clone();

            let thread = self.build_thread(
                file_version_id,
                thread_id,
                annotation_type,
                location,
                annotations,
            );
            if self.registry.register(&thread).await {
                thread_count += 1;
            }
        }

        tracing::info!(
            target: TRACING_TARGET_ANNOTATOR,
            file_version_id,
            thread_count,
            "Annotations loaded"
        );

        self.events
            .emit(AnnotatorEvent::AnnotationsLoaded { thread_count });
        self.registry.clone()
    }

    /// Discards every thread silently and loads them again.
    pub async fn load_annotations(&self) -> ThreadRegistry {
        self.fetch_all(&self.options.file_version_id).await
    }

    async fn unmount_all(&self) {
        for thread in self.registry.clear().await {
            thread.unmount().await;
        }
    }

    /// Creates and registers a new thread.
    ///
    /// Returns `None` when the viewer may not annotate, the type is not
    /// supported or the location is unusable. The first such failure is
    /// reported as [`AnnotatorEvent::ValidationError`].
    pub async fn create_annotation_thread(
        &self,
        annotations: Vec<Annotation>,
        location: Location,
        annotation_type: AnnotationType,
    ) -> Option<AnnotationThread> {
        let valid = self.options.permissions.can_annotate
            && self.options.supports(annotation_type)
            && location.is_valid();

        if !valid {
            tracing::warn!(
                target: TRACING_TARGET_ANNOTATOR,
                annotation_type = %annotation_type,
                "Invalid annotation thread"
            );
            if !self.validation_reported.swap(true, Ordering::SeqCst) {
                self.events.emit(AnnotatorEvent::ValidationError);
            }
            return None;
        }

        let thread_id = annotations
            .first()
            .map(|a| a.thread_id.clone())
            .unwrap_or_else(AnnotationGateway::generate_id);

        let thread = self.build_thread(
            &self.options.file_version_id,
            thread_id,
            annotation_type,
            location,
            annotations,
        );
        self.registry.register(&thread).await;
        Some(thread)
    }

    fn build_thread(
        &self,
        file_version_id: &str,
        thread_id: String,
        annotation_type: AnnotationType,
        location: Location,
        annotations: Vec<Annotation>,
    ) -> AnnotationThread {
        let mut options = ThreadOptions::new(file_version_id, annotation_type, location)
            .with_thread_id(thread_id.clone())
            .with_annotations(annotations)
            .with_mobile(self.options.is_mobile)
            .with_bus(self.bus.clone());

        if let Some(factory) = self.dialogs.as_deref() {
            options = options.with_boxed_dialog(factory.create_dialog(&thread_id, annotation_type));
        }

        AnnotationThread::new(self.gateway.clone(), options)
    }

    /// Executes a command against the registry.
    ///
    /// Returns whether the command took effect.
    pub async fn dispatch(&self, command: ThreadCommand) -> bool {
        tracing::debug!(
            target: TRACING_TARGET_ANNOTATOR,
            command = ?command,
            "Dispatching thread command"
        );

        match command {
            ThreadCommand::Save {
                thread_id,
                annotation_type,
                text,
            } => match self.registry.get_by_id(&thread_id).await {
                Some(thread) => thread.save_annotation(annotation_type, text).await.is_some(),
                None => false,
            },
            ThreadCommand::Cancel { thread_id } => match self.registry.get_by_id(&thread_id).await {
                Some(thread) => {
                    thread.cancel_unsaved_annotation().await;
                    true
                }
                None => false,
            },
            ThreadCommand::Delete {
                thread_id,
                annotation_id,
            } => match self.registry.get_by_id(&thread_id).await {
                Some(thread) => thread.delete_annotation(&annotation_id, true).await,
                None => false,
            },
            ThreadCommand::RegisterThread(thread) => self.registry.register(&thread).await,
            ThreadCommand::UnregisterThread { thread_id } => {
                self.registry.unregister(&thread_id).await.is_some()
            }
        }
    }

    /// Reacts to an event raised by one of the threads.
    pub async fn handle_thread_event(&self, event: ThreadEvent) {
        let reload = match &event {
            ThreadEvent::CreateError { .. } | ThreadEvent::DeleteError { .. } => true,
            ThreadEvent::ThreadDeleted { thread_id } | ThreadEvent::Cancel { thread_id } => {
                self.registry.unregister(thread_id).await;
                false
            }
            ThreadEvent::Saved { .. }
            | ThreadEvent::AnnotationDeleted { .. }
            | ThreadEvent::FirstCommentCancelled { .. } => false,
        };

        self.events.emit(AnnotatorEvent::Thread(event));

        if reload {
            tracing::info!(
                target: TRACING_TARGET_ANNOTATOR,
                "Reloading annotations after a failed change"
            );
            self.load_annotations().await;
        }
    }

    fn handle_gateway_event(&self, event: GatewayEvent) {
        match event {
            GatewayEvent::AnnotationError { reason, message } => {
                self.events.emit(AnnotatorEvent::Error { reason, message });
            }
            GatewayEvent::IdentityResolved { user } => {
                tracing::debug!(
                    target: TRACING_TARGET_ANNOTATOR,
                    user_id = %user.id,
                    "Viewer identity resolved"
                );
            }
        }
    }

    /// Re-publishes queued gateway errors as [`AnnotatorEvent::Error`].
    ///
    /// Returns how many gateway events were consumed.
    pub async fn forward_gateway_errors(&self) -> usize {
        let mut handled = 0;
        loop {
            let next = self.gateway_events.lock().await.try_recv();
            match next {
                Ok(event) => {
                    self.handle_gateway_event(event);
                    handled += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => lagged(skipped),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return handled,
            }
        }
    }

    /// Handles every queued thread and gateway event.
    ///
    /// Returns how many events were handled.
    pub async fn process_pending_events(&self) -> usize {
        let mut total = 0;
        loop {
            let mut handled = self.forward_gateway_errors().await;

            loop {
                let next = self.bus_events.lock().await.try_recv();
                match next {
                    Ok(event) => {
                        self.handle_thread_event(event).await;
                        handled += 1;
                    }
                    Err(TryRecvError::Lagged(skipped)) => lagged(skipped),
                    Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                }
            }

            if handled == 0 {
                return total;
            }
            total += handled;
        }
    }

    /// Handles thread and gateway events as they arrive, until the returned
    /// future is dropped.
    pub async fn run(&self) {
        let mut bus_events = self.bus_events.lock().await;
        let mut gateway_events = self.gateway_events.lock().await;

        loop {
            tokio::select! {
                event = bus_events.recv() => match event {
                    Ok(event) => self.handle_thread_event(event).await,
                    Err(RecvError::Lagged(skipped)) => lagged(skipped),
                    Err(RecvError::Closed) => return,
                },
                event = gateway_events.recv() => match event {
                    Ok(event) => self.handle_gateway_event(event),
                    Err(RecvError::Lagged(skipped)) => lagged(skipped),
                    Err(RecvError::Closed) => return,
                },
            }
        }
    }
}

fn lagged(skipped: u64) {
    tracing::warn!(
        target: TRACING_TARGET_ANNOTATOR,
        skipped,
        "Event receiver lagged, events dropped"
    );
}
