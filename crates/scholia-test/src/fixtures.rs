//! Annotation fixtures and test setup helpers.

use jiff::Timestamp;
use scholia_core::{Annotation, AnnotationType, Location, Permissions, User};
use scholia_gateway::mock::MockTransport;
use scholia_gateway::{AnnotationGateway, GatewayConfig};

/// Builds a confirmed annotation on page 1, created at `created_at` seconds
/// after the epoch.
pub fn confirmed_annotation(
    id: &str,
    thread_id: &str,
    annotation_type: AnnotationType,
    message: &str,
    created_at: i64,
) -> Annotation {
    let created_at = Timestamp::from_second(created_at).unwrap_or(Timestamp::UNIX_EPOCH);

    Annotation {
        id: id.to_owned(),
        thread_id: thread_id.to_owned(),
        thread_number: Some(1),
        file_version_id: "fv-1".to_owned(),
        annotation_type,
        message: message.to_owned(),
        location: Location::on_page(1),
        drawing_paths: None,
        created_by: User::new("1", "Author"),
        permissions: Permissions::full(),
        created_at,
        modified_at: created_at,
        is_pending: false,
    }
}

/// Builds a temporary annotation awaiting server confirmation.
pub fn pending_annotation(
    id: &str,
    thread_id: &str,
    annotation_type: AnnotationType,
    message: &str,
) -> Annotation {
    Annotation {
        thread_number: None,
        is_pending: true,
        ..confirmed_annotation(id, thread_id, annotation_type, message, 0)
    }
}

/// Creates a gateway for file `file-1` backed by `transport`.
pub fn mock_gateway(transport: &MockTransport) -> AnnotationGateway {
    AnnotationGateway::new(transport.clone(), GatewayConfig::new("file-1"))
}

/// Installs a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
