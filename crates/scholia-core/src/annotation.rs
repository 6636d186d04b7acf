//! Annotation data model and derived predicates.
//!
//! An [`Annotation`] is a single comment (or marker) belonging to exactly one
//! thread. Annotations come either from the server, already confirmed, or are
//! built locally as temporary annotations while a create round trip is in
//! flight. Everything in this module is a pure value or a pure query.

use derive_builder::Builder;
use derive_more::{Deref, From};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Identifier of the anonymous placeholder user.
pub const ANONYMOUS_USER_ID: &str = "0";

/// Display name used for the anonymous placeholder user.
pub const DEFAULT_ANONYMOUS_NAME: &str = "Anonymous";

/// Kind of annotation, as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AnnotationType {
    /// Comment pinned to a single point.
    Point,
    /// Plain text highlight, usually without a comment.
    Highlight,
    /// Text highlight carrying comments.
    HighlightComment,
    /// Free-hand drawing.
    Draw,
}

impl AnnotationType {
    /// All annotation types, in declaration order.
    pub const ALL: [AnnotationType; 4] = [
        Self::Point,
        Self::Highlight,
        Self::HighlightComment,
        Self::Draw,
    ];

    /// Returns whether this is one of the highlight types.
    #[must_use]
    pub const fn is_highlight(&self) -> bool {
        matches!(self, Self::Highlight | Self::HighlightComment)
    }

    /// Returns whether annotations of this type are written as comments.
    #[must_use]
    pub const fn is_comment_bearing(&self) -> bool {
        matches!(self, Self::Point | Self::HighlightComment)
    }

    /// Returns whether annotations of this type may carry an empty message.
    #[must_use]
    pub const fn allows_blank(&self) -> bool {
        matches!(self, Self::Highlight | Self::HighlightComment | Self::Draw)
    }
}

/// Opaque positioning payload of an annotation.
///
/// The shape depends on the annotation type and is owned by the rendering
/// layer. The only field interpreted here is `page`, which defaults to 1
/// (image annotators never set it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Deref, From)]
#[serde(transparent)]
pub struct Location(Value);

impl Default for Location {
    fn default() -> Self {
        Self(Value::Object(Map::new()))
    }
}

impl Location {
    /// Wraps a raw location payload.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Creates a location that only carries a page number.
    pub fn on_page(page: u32) -> Self {
        let mut map = Map::new();
        map.insert("page".to_owned(), Value::from(page));
        Self(Value::Object(map))
    }

    /// Returns the page this location sits on, defaulting to 1.
    pub fn page(&self) -> u32 {
        self.parse_page().unwrap_or(1)
    }

    /// Returns a copy of this location moved to another page.
    pub fn with_page(&self, page: u32) -> Self {
        let mut value = self.0.clone();
        if !value.is_object() {
            value = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut value {
            map.insert("page".to_owned(), Value::from(page));
        }
        Self(value)
    }

    /// Returns whether the payload is an object with a usable page, if any.
    pub fn is_valid(&self) -> bool {
        match &self.0 {
            Value::Object(map) => !map.contains_key("page") || self.parse_page().is_some(),
            _ => false,
        }
    }

    /// Returns the raw payload.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the location and returns the raw payload.
    pub fn into_inner(self) -> Value {
        self.0
    }

    fn parse_page(&self) -> Option<u32> {
        let page = match self.0.get("page")? {
            Value::Number(number) => u32::try_from(number.as_u64()?).ok()?,
            Value::String(text) => text.trim().parse().ok()?,
            _ => return None,
        };
        (page > 0).then_some(page)
    }
}

/// Author of an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-side user identifier; `"0"` for the anonymous placeholder.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Avatar image URL, if known.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl User {
    /// Creates a user with the given identifier and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar_url: None,
        }
    }

    /// Creates the anonymous placeholder user.
    pub fn anonymous(name: impl Into<String>) -> Self {
        Self::new(ANONYMOUS_USER_ID, name)
    }

    /// Sets the avatar URL.
    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }

    /// Returns whether this is the anonymous placeholder.
    pub fn is_anonymous(&self) -> bool {
        self.id == ANONYMOUS_USER_ID
    }
}

impl Default for User {
    fn default() -> Self {
        Self::anonymous(DEFAULT_ANONYMOUS_NAME)
    }
}

/// Per-annotation permissions granted to the current actor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    /// Whether the annotation may be edited.
    #[serde(default)]
    pub can_edit: bool,
    /// Whether the annotation may be deleted.
    #[serde(default)]
    pub can_delete: bool,
}

impl Permissions {
    /// Edit and delete permission, granted to freshly created annotations.
    pub const fn full() -> Self {
        Self {
            can_edit: true,
            can_delete: true,
        }
    }

    /// No permission at all.
    pub const fn read_only() -> Self {
        Self {
            can_edit: false,
            can_delete: false,
        }
    }
}

/// A single annotation.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(
    name = "AnnotationBuilder",
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(private, name = "build_inner", error = "AnnotationBuilderError")
)]
pub struct Annotation {
    /// Server id, or a client GUID while temporary.
    pub id: String,
    /// Thread this annotation belongs to.
    pub thread_id: String,
    /// Display ordinal of the thread, assigned by the server.
    #[builder(default)]
    pub thread_number: Option<u32>,
    /// File version the annotation is attached to.
    #[builder(default)]
    pub file_version_id: String,
    /// Kind of annotation.
    pub annotation_type: AnnotationType,
    /// Comment text; empty for blank highlights and drawings.
    #[builder(default)]
    pub message: String,
    /// Positioning payload.
    #[builder(default)]
    pub location: Location,
    /// Drawing paths for draw annotations.
    #[builder(default)]
    pub drawing_paths: Option<Value>,
    /// Author of the annotation.
    #[builder(default)]
    pub created_by: User,
    /// Permissions granted to the current actor.
    #[builder(default)]
    pub permissions: Permissions,
    /// Creation time.
    #[builder(default = "Timestamp::now()")]
    pub created_at: Timestamp,
    /// Last modification time.
    #[builder(default = "Timestamp::now()")]
    pub modified_at: Timestamp,
    /// True until the server has confirmed this annotation.
    #[builder(default)]
    pub is_pending: bool,
}

/// Error type for Annotation builder.
pub type AnnotationBuilderError = derive_builder::UninitializedFieldError;

impl AnnotationBuilder {
    /// Build the annotation.
    pub fn build(self) -> Result<Annotation, AnnotationBuilderError> {
        self.build_inner()
    }
}

impl Annotation {
    /// Create a builder for this annotation.
    pub fn builder() -> AnnotationBuilder {
        AnnotationBuilder::default()
    }

    /// Returns whether this annotation still awaits server confirmation.
    pub fn is_temporary(&self) -> bool {
        self.is_pending
    }

    /// Returns whether the annotation carries no comment text.
    pub fn is_blank(&self) -> bool {
        self.message.is_empty()
    }

    /// Returns the page this annotation sits on.
    pub fn page(&self) -> u32 {
        self.location.page()
    }

    /// Returns whether `user` wrote this annotation.
    pub fn is_authored_by(&self, user: &User) -> bool {
        self.created_by.id == user.id
    }
}

/// Returns whether the annotations form a blank highlight: exactly one
/// annotation, with an empty message.
pub fn is_blank_highlight<'a, I>(annotations: I) -> bool
where
    I: IntoIterator<Item = &'a Annotation>,
{
    let mut iter = annotations.into_iter();
    match (iter.next(), iter.next()) {
        (Some(only), None) => only.is_blank(),
        _ => false,
    }
}

/// Returns whether the annotation is temporary.
pub fn is_temporary(annotation: &Annotation) -> bool {
    annotation.is_temporary()
}

/// Sorts annotations by creation time, keeping receive order for ties.
pub fn sort_chronologically(annotations: &mut [Annotation]) {
    annotations.sort_by(|a, b| a.created_at.cmp(&b.created_at));
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    fn annotation(id: &str, message: &str) -> Annotation {
        Annotation::builder()
            .with_id(id)
            .with_thread_id("thread-1")
            .with_annotation_type(AnnotationType::Highlight)
            .with_message(message)
            .build()
            .unwrap()
    }

    #[test]
    fn builder_applies_defaults() {
        let annotation = annotation("a1", "hello");

        assert_eq!(annotation.thread_number, None);
        assert!(!annotation.is_pending);
        assert!(annotation.created_by.is_anonymous());
        assert_eq!(annotation.permissions, Permissions::read_only());
        assert_eq!(annotation.page(), 1);
    }

    #[test]
    fn builder_requires_identity() {
        let result = Annotation::builder()
            .with_annotation_type(AnnotationType::Point)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn blank_highlight_needs_exactly_one_blank_annotation() {
        let blank = annotation("a1", "");
        let comment = annotation("a2", "note");

        assert!(is_blank_highlight([&blank]));
        assert!(!is_blank_highlight([&comment]));
        assert!(!is_blank_highlight([&blank, &comment]));
        assert!(!is_blank_highlight(std::iter::empty::<&Annotation>()));
    }

    #[test]
    fn temporary_follows_pending_flag() {
        let mut annotation = annotation("a1", "hi");
        assert!(!is_temporary(&annotation));

        annotation.is_pending = true;
        assert!(is_temporary(&annotation));
    }

    #[test]
    fn location_page_parsing() {
        assert_eq!(Location::new(json!({"page": 3, "x": 1})).page(), 3);
        assert_eq!(Location::new(json!({"page": "4"})).page(), 4);
        assert_eq!(Location::new(json!({"x": 1})).page(), 1);
        assert_eq!(Location::new(json!({"page": 0})).page(), 1);
        assert_eq!(Location::on_page(7).page(), 7);
        assert_eq!(Location::on_page(2).with_page(5).page(), 5);
    }

    #[test]
    fn location_validity() {
        assert!(Location::default().is_valid());
        assert!(Location::on_page(1).is_valid());
        assert!(!Location::new(json!({"page": 0})).is_valid());
        assert!(!Location::new(json!("page 1")).is_valid());
    }

    #[test]
    fn sort_is_chronological_and_stable() {
        let early: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let late: Timestamp = "2024-02-01T00:00:00Z".parse().unwrap();

        let mut first = annotation("first", "a");
        first.created_at = late;
        let mut second = annotation("second", "b");
        second.created_at = early;
        let mut third = annotation("third", "c");
        third.created_at = late;

        let mut annotations = vec![first, second, third];
        sort_chronologically(&mut annotations);

        let ids: Vec<_> = annotations.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["second", "first", "third"]);
    }

    #[test]
    fn annotation_type_names() {
        assert_eq!(AnnotationType::HighlightComment.as_ref(), "highlight-comment");
        assert_eq!(
            AnnotationType::from_str("draw").unwrap(),
            AnnotationType::Draw
        );
        assert_eq!(
            serde_json::to_value(AnnotationType::HighlightComment).unwrap(),
            json!("highlight-comment")
        );
        assert!(AnnotationType::Highlight.is_highlight());
        assert!(!AnnotationType::Point.allows_blank());
        assert!(AnnotationType::HighlightComment.is_comment_bearing());
        assert!(!AnnotationType::Draw.is_comment_bearing());
    }
}
