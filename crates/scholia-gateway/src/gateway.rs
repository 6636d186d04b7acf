//! Annotation gateway: create, delete and paginated read.

use std::collections::HashMap;
use std::sync::Arc;

use jiff::Timestamp;
use scholia_core::{Annotation, Error, ErrorKind, EventHub, Permissions, Result, User};

use crate::wire::{
    ANNOTATIONS_PATH, AnnotationEntry, AnnotationPage, CreateAnnotationBody, annotation_path,
    file_annotations_path,
};
use crate::{
    DEFAULT_READ_FIELDS, GatewayConfig, Session, TRACING_TARGET_GATEWAY, Transport,
    TransportRequest,
};

/// Message reported when an annotation cannot be created.
const CREATE_FAILED: &str = "Could not create annotation";

/// Events emitted by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// An operation failed (`annotationerror`).
    AnnotationError {
        /// Failure classification.
        reason: ErrorKind,
        /// Human-readable message.
        message: String,
    },
    /// The session's anonymous placeholder was replaced by a real author.
    IdentityResolved {
        /// The adopted user.
        user: User,
    },
}

/// Annotations grouped by thread identifier.
///
/// Threads iterate in the order their first annotation was received;
/// annotations inside a thread keep their receive order.
#[derive(Debug, Clone, Default)]
pub struct ThreadMap {
    order: Vec<String>,
    groups: HashMap<String, Vec<Annotation>>,
}

impl ThreadMap {
    /// Groups annotations by `thread_id`.
    pub fn from_annotations(annotations: impl IntoIterator<Item = Annotation>) -> Self {
        let mut map = Self::default();
        for annotation in annotations {
            map.insert(annotation);
        }
        map
    }

    fn insert(&mut self, annotation: Annotation) {
        match self.groups.get_mut(&annotation.thread_id) {
            Some(group) => group.push(annotation),
            None => {
                self.order.push(annotation.thread_id.clone());
                self.groups
                    .insert(annotation.thread_id.clone(), vec![annotation]);
            }
        }
    }

    /// Returns the number of threads.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns whether there are no threads.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the annotations of one thread.
    pub fn get(&self, thread_id: &str) -> Option<&[Annotation]> {
        self.groups.get(thread_id).map(Vec::as_slice)
    }

    /// Iterates over thread identifiers in first-seen order.
    pub fn thread_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Iterates over `(thread_id, annotations)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Annotation])> {
        self.order
            .iter()
            .filter_map(|id| self.groups.get(id).map(|group| (id.as_str(), group.as_slice())))
    }

    /// Returns the number of annotations across all threads.
    pub fn total_annotations(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

impl FromIterator<Annotation> for ThreadMap {
    fn from_iter<I: IntoIterator<Item = Annotation>>(iter: I) -> Self {
        Self::from_annotations(iter)
    }
}

impl IntoIterator for ThreadMap {
    type IntoIter = std::vec::IntoIter<(String, Vec<Annotation>)>;
    type Item = (String, Vec<Annotation>);

    fn into_iter(mut self) -> Self::IntoIter {
        self.order
            .into_iter()
            .filter_map(|id| self.groups.remove(&id).map(|group| (id, group)))
            .collect::<Vec<_>>()
            .into_iter()
    }
}

/// Inner gateway state shared between clones.
struct GatewayInner {
    transport: Arc<dyn Transport>,
    config: GatewayConfig,
    session: Session,
    events: EventHub<GatewayEvent>,
}

/// Network-facing annotation operations with failure classification.
///
/// Every failure is reported twice: the returned `Err` lets the caller clean
/// up local state, and a [`GatewayEvent::AnnotationError`] lets session-wide
/// listeners notify the user.
///
/// # Examples
///
/// ```rust,ignore
/// use scholia_gateway::{AnnotationGateway, GatewayConfig};
/// use scholia_gateway::reqwest::{ReqwestClient, ReqwestConfig};
///
/// let transport = ReqwestClient::new(ReqwestConfig::new(api_host).with_token(token))?;
/// let gateway = AnnotationGateway::new(transport, GatewayConfig::new("file-1"));
///
/// let threads = gateway.get_thread_map("file-version-1").await?;
/// ```
#[derive(Clone)]
pub struct AnnotationGateway {
    inner: Arc<GatewayInner>,
}

impl std::fmt::Debug for AnnotationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationGateway")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl AnnotationGateway {
    /// Creates a gateway with an anonymous session.
    pub fn new(transport: impl Transport + 'static, config: GatewayConfig) -> Self {
        let session = Session::anonymous(config.anonymous_user_name.clone());
        Self::with_session(transport, config, session)
    }

    /// Creates a gateway bound to an existing session.
    pub fn with_session(
        transport: impl Transport + 'static,
        config: GatewayConfig,
        session: Session,
    ) -> Self {
        tracing::debug!(
            target: TRACING_TARGET_GATEWAY,
            file_id = %config.file_id,
            page_size = ?config.page_size,
            "Creating annotation gateway"
        );

        let inner = GatewayInner {
            transport: Arc::new(transport),
            config,
            session,
            events: EventHub::new(),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Gets the gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// Gets the session context.
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Gets the gateway's event hub.
    pub fn events(&self) -> &EventHub<GatewayEvent> {
        &self.inner.events
    }

    /// Subscribes to gateway events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<GatewayEvent> {
        self.inner.events.subscribe()
    }

    /// Generates a client-side identifier for a temporary annotation.
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Creates an annotation on the server.
    ///
    /// The returned annotation is confirmed and carries edit and delete
    /// permission. The first successful create made by an anonymous session
    /// adopts the response's author as the session user.
    pub async fn create(&self, annotation: &Annotation) -> Result<Annotation> {
        let body = serde_json::to_value(CreateAnnotationBody::from(annotation))?;
        let request = TransportRequest::post(ANNOTATIONS_PATH).with_body(body);

        tracing::debug!(
            target: TRACING_TARGET_GATEWAY,
            thread_id = %annotation.thread_id,
            annotation_type = %annotation.annotation_type,
            "Creating annotation"
        );

        let response = match self.inner.transport.send(request).await {
            Ok(response) => response,
            Err(error) => {
                return Err(self.fail(ErrorKind::Authorization, CREATE_FAILED, Some(error)));
            }
        };

        if response.is_unauthorized() {
            return Err(self.fail(ErrorKind::Authorization, CREATE_FAILED, None));
        }

        let created = response
            .body
            .and_then(|body| serde_json::from_value::<AnnotationEntry>(body).ok())
            .and_then(|entry| entry.into_annotation(Timestamp::now()));

        let Some(mut created) = created else {
            return Err(self.fail(ErrorKind::Create, CREATE_FAILED, None));
        };

        created.permissions = Permissions::full();
        created.thread_number = created.thread_number.or(annotation.thread_number);
        if created.file_version_id.is_empty() {
            created.file_version_id = annotation.file_version_id.clone();
        }

        if self
            .inner
            .session
            .set_identity(created.created_by.clone())
            .await
        {
            self.inner.events.emit(GatewayEvent::IdentityResolved {
                user: created.created_by.clone(),
            });
        }

        tracing::debug!(
            target: TRACING_TARGET_GATEWAY,
            annotation_id = %created.id,
            thread_id = %created.thread_id,
            "Annotation created"
        );

        Ok(created)
    }

    /// Deletes an annotation on the server. Only a 204 counts as success.
    pub async fn delete(&self, annotation_id: &str) -> Result<()> {
        let message = format!("Could not delete annotation with ID {annotation_id}");
        let request = TransportRequest::delete(annotation_path(annotation_id));

        tracing::debug!(
            target: TRACING_TARGET_GATEWAY,
            annotation_id,
            "Deleting annotation"
        );

        match self.inner.transport.send(request).await {
            Ok(response) if response.is_no_content() => {
                tracing::debug!(
                    target: TRACING_TARGET_GATEWAY,
                    annotation_id,
                    "Annotation deleted"
                );
                Ok(())
            }
            Ok(response) if response.is_unauthorized() => {
                Err(self.fail(ErrorKind::Authorization, message, None))
            }
            Ok(_) => Err(self.fail(ErrorKind::Delete, message, None)),
            Err(error) => Err(self.fail(ErrorKind::Authorization, message, Some(error))),
        }
    }

    /// Reads every annotation of a file version.
    ///
    /// Pages are requested strictly one after the other, following
    /// `next_marker` until a page carries none. A failure on any page fails
    /// the whole read; partial results are never returned. Entries that do
    /// not describe an annotation are skipped.
    pub async fn read(&self, file_version_id: &str) -> Result<Vec<Annotation>> {
        let message =
            format!("Could not read annotations from file version with ID {file_version_id}");

        let mut annotations = Vec::new();
        let mut marker: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let request = self.read_request(file_version_id, marker.as_deref());

            let response = match self.inner.transport.send(request).await {
                Ok(response) => response,
                Err(error) => {
                    return Err(self.fail(ErrorKind::Authorization, message, Some(error)));
                }
            };

            if response.is_unauthorized() {
                return Err(self.fail(ErrorKind::Authorization, message, None));
            }

            let page = response
                .is_success()
                .then_some(response.body)
                .flatten()
                .and_then(|body| serde_json::from_value::<AnnotationPage>(body).ok())
                .filter(AnnotationPage::is_valid);

            let Some(page) = page else {
                return Err(self.fail(ErrorKind::Read, message, None));
            };

            pages += 1;
            let next_marker = page.next_marker().map(str::to_owned);

            for raw in page.entries.unwrap_or_default() {
                let annotation = serde_json::from_value::<AnnotationEntry>(raw)
                    .ok()
                    .and_then(|entry| entry.into_annotation(Timestamp::UNIX_EPOCH));

                match annotation {
                    Some(annotation) => annotations.push(annotation),
                    None => tracing::warn!(
                        target: TRACING_TARGET_GATEWAY,
                        file_version_id,
                        page = pages,
                        "Skipping malformed annotation entry"
                    ),
                }
            }

            match next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        tracing::debug!(
            target: TRACING_TARGET_GATEWAY,
            file_version_id,
            pages,
            count = annotations.len(),
            "Annotations read"
        );

        Ok(annotations)
    }

    /// Reads every annotation of a file version, grouped by thread.
    pub async fn get_thread_map(&self, file_version_id: &str) -> Result<ThreadMap> {
        let annotations = self.read(file_version_id).await?;
        Ok(ThreadMap::from_annotations(annotations))
    }

    fn read_request(&self, file_version_id: &str, marker: Option<&str>) -> TransportRequest {
        let config = &self.inner.config;
        let mut request = TransportRequest::get(file_annotations_path(&config.file_id))
            .with_query("version", file_version_id)
            .with_query("fields", DEFAULT_READ_FIELDS);

        if let Some(marker) = marker {
            request = request.with_query("marker", marker);
        }

        if let Some(limit) = config.page_size {
            request = request.with_query("limit", limit.to_string());
        }

        request
    }

    /// Reports a failure on the event hub and builds the returned error.
    fn fail(&self, kind: ErrorKind, message: impl Into<String>, source: Option<Error>) -> Error {
        debug_assert!(kind.is_reported(), "{kind} is not an annotation error reason");
        let message = message.into();

        tracing::warn!(
            target: TRACING_TARGET_GATEWAY,
            reason = %kind,
            source = source.as_ref().map(tracing::field::display),
            "{message}"
        );

        self.inner.events.emit(GatewayEvent::AnnotationError {
            reason: kind,
            message: message.clone(),
        });

        let error = Error::new(kind).with_message(message);
        match source {
            Some(source) => error.with_source(source),
            None => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use scholia_core::{AnnotationType, Location};
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::Method;
    use crate::mock::{MockTransport, entry, page};

    fn gateway(transport: &MockTransport) -> AnnotationGateway {
        AnnotationGateway::new(transport.clone(), GatewayConfig::new("file-1"))
    }

    fn temporary(message: &str) -> Annotation {
        Annotation::builder()
            .with_id(AnnotationGateway::generate_id())
            .with_thread_id("thread-1")
            .with_file_version_id("fv-1")
            .with_annotation_type(AnnotationType::Point)
            .with_message(message)
            .with_location(Location::on_page(1))
            .with_is_pending(true)
            .build()
            .unwrap()
    }

    fn next_error(receiver: &mut tokio::sync::broadcast::Receiver<GatewayEvent>) -> ErrorKind {
        loop {
            match receiver.try_recv() {
                Ok(GatewayEvent::AnnotationError { reason, .. }) => {
                    assert!(reason.is_reported());
                    return reason;
                }
                Ok(_) => continue,
                Err(error) => panic!("expected an annotation error event, got {error:?}"),
            }
        }
    }

    #[tokio::test]
    async fn create_confirms_annotation_and_adopts_identity() {
        let transport = MockTransport::new();
        transport.reply_json(
            201,
            entry("srv-1", "thread-1")
                .with_message("hello")
                .with_author("55", "Ada")
                .with_can_delete(false)
                .into_json(),
        );
        let gateway = gateway(&transport);
        let mut events = gateway.subscribe();

        let created = gateway.create(&temporary("hello")).await.unwrap();

        assert_eq!(created.id, "srv-1");
        assert_eq!(created.message, "hello");
        assert!(!created.is_pending);
        assert_eq!(created.permissions, Permissions::full());
        assert_eq!(gateway.session().user().await.id, "55");
        assert!(matches!(
            events.try_recv(),
            Ok(GatewayEvent::IdentityResolved { user }) if user.id == "55"
        ));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].path, "/2.0/annotations");
        let body = requests[0].body.as_ref().unwrap();
        assert_eq!(body["details"]["threadID"], json!("thread-1"));
        assert_eq!(body["item"], json!({"type": "file_version", "id": "fv-1"}));
    }

    #[tokio::test]
    async fn create_keeps_known_identity() {
        let transport = MockTransport::new();
        transport.reply_json(201, entry("srv-1", "t").with_author("55", "Ada").into_json());
        let session = Session::new(User::new("9", "Known"));
        let gateway =
            AnnotationGateway::with_session(transport.clone(), GatewayConfig::new("f"), session);

        gateway.create(&temporary("x")).await.unwrap();
        assert_eq!(gateway.session().user().await.id, "9");
    }

    #[tokio::test]
    async fn create_error_body_is_a_create_failure() {
        let transport = MockTransport::new();
        transport.reply_json(400, json!({"type": "error", "status": 400}));
        let gateway = gateway(&transport);
        let mut events = gateway.subscribe();

        let error = gateway.create(&temporary("x")).await.unwrap_err();

        assert_eq!(error.kind, ErrorKind::Create);
        assert_eq!(error.message(), "Could not create annotation");
        assert_eq!(next_error(&mut events), ErrorKind::Create);
        assert!(gateway.session().is_anonymous().await);
    }

    #[tokio::test]
    async fn create_without_id_is_a_create_failure() {
        let transport = MockTransport::new();
        transport.reply_json(201, json!({"type": "annotation", "message": "x"}));
        let gateway = gateway(&transport);

        let error = gateway.create(&temporary("x")).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Create);
    }

    #[tokio::test]
    async fn rejected_create_is_an_authorization_failure() {
        let transport = MockTransport::new();
        transport.reject("token expired");
        let gateway = gateway(&transport);
        let mut events = gateway.subscribe();

        let error = gateway.create(&temporary("x")).await.unwrap_err();

        assert_eq!(error.kind, ErrorKind::Authorization);
        assert!(error.source.is_some());
        assert_eq!(next_error(&mut events), ErrorKind::Authorization);
    }

    #[tokio::test]
    async fn unauthorized_status_is_an_authorization_failure() {
        let transport = MockTransport::new();
        transport.reply_status(401);
        let gateway = gateway(&transport);

        let error = gateway.create(&temporary("x")).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Authorization);
    }

    #[tokio::test]
    async fn delete_succeeds_only_on_no_content() {
        let transport = MockTransport::new();
        transport.reply_status(204);
        transport.reply_json(200, json!({}));
        let gateway = gateway(&transport);
        let mut events = gateway.subscribe();

        gateway.delete("a1").await.unwrap();
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

        let error = gateway.delete("a2").await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Delete);
        assert_eq!(error.message(), "Could not delete annotation with ID a2");
        assert_eq!(next_error(&mut events), ErrorKind::Delete);

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Delete);
        assert_eq!(requests[0].path, "/2.0/annotations/a1");
    }

    #[tokio::test]
    async fn rejected_delete_is_an_authorization_failure() {
        let transport = MockTransport::new();
        transport.reject("offline");
        let gateway = gateway(&transport);

        let error = gateway.delete("a1").await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Authorization);
    }

    #[tokio::test]
    async fn read_follows_markers_sequentially() {
        let transport = MockTransport::new();
        transport.reply_json(
            200,
            page(vec![entry("a1", "t1").into_json(), entry("a2", "t2").into_json()], Some("m1")),
        );
        transport.reply_json(200, page(vec![entry("a3", "t1").into_json()], Some("m2")));
        transport.reply_json(
            200,
            page(vec![entry("a4", "t3").into_json(), entry("a5", "t2").into_json()], None),
        );
        let gateway = gateway(&transport);

        let annotations = gateway.read("fv-1").await.unwrap();
        assert_eq!(annotations.len(), 5);

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].path, "/2.0/files/file-1/annotations");
        assert_eq!(requests[0].query_value("version"), Some("fv-1"));
        assert_eq!(requests[0].query_value("fields"), Some(DEFAULT_READ_FIELDS));
        assert_eq!(requests[0].query_value("marker"), None);
        assert_eq!(requests[1].query_value("marker"), Some("m1"));
        assert_eq!(requests[2].query_value("marker"), Some("m2"));
        assert_eq!(requests[0].query_value("limit"), None);
    }

    #[tokio::test]
    async fn read_passes_configured_limit() {
        let transport = MockTransport::new();
        transport.reply_json(200, page(vec![], None));
        let gateway = AnnotationGateway::new(
            transport.clone(),
            GatewayConfig::new("file-1").with_page_size(25),
        );

        gateway.read("fv-1").await.unwrap();
        assert_eq!(transport.requests()[0].query_value("limit"), Some("25"));
    }

    #[tokio::test]
    async fn read_error_body_rejects_with_message() {
        let transport = MockTransport::new();
        transport.reply_json(200, json!({"type": "error", "status": 404}));
        let gateway = gateway(&transport);
        let mut events = gateway.subscribe();

        let error = gateway.read("fv-7").await.unwrap_err();

        assert_eq!(error.kind, ErrorKind::Read);
        assert_eq!(
            error.message(),
            "Could not read annotations from file version with ID fv-7"
        );
        assert_eq!(next_error(&mut events), ErrorKind::Read);
    }

    #[tokio::test]
    async fn read_failure_on_later_page_discards_everything() {
        let transport = MockTransport::new();
        transport.reply_json(200, page(vec![entry("a1", "t1").into_json()], Some("m1")));
        transport.reject("connection reset");
        let gateway = gateway(&transport);

        let error = gateway.read("fv-1").await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Authorization);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn read_skips_malformed_entries() {
        let transport = MockTransport::new();
        transport.reply_json(
            200,
            page(
                vec![
                    entry("a1", "t1").into_json(),
                    json!({"type": "annotation"}),
                    json!("garbage"),
                ],
                None,
            ),
        );
        let gateway = gateway(&transport);

        let annotations = gateway.read("fv-1").await.unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].id, "a1");
    }

    #[tokio::test]
    async fn thread_map_groups_by_thread_id() {
        let transport = MockTransport::new();
        transport.reply_json(
            200,
            page(
                vec![
                    entry("a1", "t1").with_thread_number(1).into_json(),
                    entry("a2", "t2").with_thread_number(1).into_json(),
                    entry("a3", "t1").with_thread_number(1).into_json(),
                ],
                Some("m"),
            ),
        );
        transport.reply_json(200, page(vec![entry("a4", "t2").into_json()], None));
        let gateway = gateway(&transport);

        let map = gateway.get_thread_map("fv-1").await.unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.total_annotations(), 4);
        assert_eq!(map.thread_ids().collect::<Vec<_>>(), ["t1", "t2"]);

        let t1: Vec<_> = map.get("t1").unwrap().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(t1, ["a1", "a3"]);

        let mut union: Vec<String> = map
            .into_iter()
            .flat_map(|(_, group)| group.into_iter().map(|a| a.id))
            .collect();
        union.sort();
        assert_eq!(union, ["a1", "a2", "a3", "a4"]);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(AnnotationGateway::generate_id(), AnnotationGateway::generate_id());
    }
}
