//! Wire format of the annotations API.
//!
//! The backend names the thread's display ordinal `thread` and nests the
//! stable thread identifier under `details.threadID`. Both are kept apart
//! here: [`CreateAnnotationBody::thread`] carries the ordinal only.

use jiff::Timestamp;
use scholia_core::{Annotation, AnnotationType, Location, Permissions, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Collection path for annotations.
pub const ANNOTATIONS_PATH: &str = "/2.0/annotations";

/// Item type every annotation is attached to.
pub const FILE_VERSION_ITEM: &str = "file_version";

/// Returns the path of a single annotation.
pub fn annotation_path(annotation_id: &str) -> String {
    format!("{ANNOTATIONS_PATH}/{annotation_id}")
}

/// Returns the path listing a file's annotations.
pub fn file_annotations_path(file_id: &str) -> String {
    format!("/2.0/files/{file_id}/annotations")
}

/// Reference to the item an annotation is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    /// Item type, always `file_version` for annotations.
    #[serde(rename = "type")]
    pub kind: String,
    /// Item identifier.
    pub id: String,
}

impl ItemRef {
    /// References a file version.
    pub fn file_version(id: impl Into<String>) -> Self {
        Self {
            kind: FILE_VERSION_ITEM.to_owned(),
            id: id.into(),
        }
    }
}

/// Type-specific annotation details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDetails {
    /// Annotation type.
    #[serde(rename = "type")]
    pub annotation_type: AnnotationType,
    /// Drawing paths, for draw annotations.
    #[serde(
        rename = "drawingPaths",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub drawing_paths: Option<Value>,
    /// Positioning payload.
    #[serde(default)]
    pub location: Location,
    /// Stable thread identifier.
    #[serde(rename = "threadID")]
    pub thread_id: String,
}

/// Body of `POST /2.0/annotations`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateAnnotationBody {
    /// File version the annotation is attached to.
    pub item: ItemRef,
    /// Type, location and thread identity.
    pub details: AnnotationDetails,
    /// Comment text.
    pub message: String,
    /// Thread display ordinal; omitted for a thread's first annotation.
    #[serde(with = "thread_number", skip_serializing_if = "Option::is_none")]
    pub thread: Option<u32>,
}

impl From<&Annotation> for CreateAnnotationBody {
    fn from(annotation: &Annotation) -> Self {
        Self {
            item: ItemRef::file_version(annotation.file_version_id.clone()),
            details: AnnotationDetails {
                annotation_type: annotation.annotation_type,
                drawing_paths: annotation.drawing_paths.clone(),
                location: annotation.location.clone(),
                thread_id: annotation.thread_id.clone(),
            },
            message: annotation.message.clone(),
            thread: annotation.thread_number,
        }
    }
}

/// Author as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireUser {
    /// User identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Login, used when no display name is set.
    #[serde(default)]
    pub login: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub profile_image: Option<String>,
}

impl WireUser {
    /// Converts into a [`User`], falling back to the anonymous placeholder.
    pub fn into_user(self) -> User {
        let Some(id) = self.id.filter(|id| !id.is_empty()) else {
            return User::default();
        };

        User {
            id,
            name: self.name.or(self.login).unwrap_or_default(),
            avatar_url: self.profile_image,
        }
    }
}

/// A single annotation object, or an error object, as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnnotationEntry {
    /// Object type; `annotation` or `error`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Server-assigned identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Item the annotation is attached to.
    #[serde(default)]
    pub item: Option<ItemRef>,
    /// Type-specific details.
    #[serde(default)]
    pub details: Option<AnnotationDetails>,
    /// Comment text.
    #[serde(default)]
    pub message: Option<String>,
    /// Thread display ordinal.
    #[serde(default, with = "thread_number")]
    pub thread: Option<u32>,
    /// Author.
    #[serde(default)]
    pub created_by: Option<WireUser>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    /// Last modification time.
    #[serde(default)]
    pub modified_at: Option<Timestamp>,
    /// Permissions of the caller.
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

impl AnnotationEntry {
    /// Returns whether the API reported an error object.
    pub fn is_error(&self) -> bool {
        self.kind.as_deref() == Some("error")
    }

    /// Converts into a confirmed [`Annotation`].
    ///
    /// Returns `None` for error objects and entries without an id or details.
    /// Missing timestamps fall back to `fallback_time`.
    pub fn into_annotation(self, fallback_time: Timestamp) -> Option<Annotation> {
        if self.is_error() {
            return None;
        }

        let id = self.id.filter(|id| !id.is_empty())?;
        let details = self.details?;
        let created_at = self.created_at.unwrap_or(fallback_time);

        Some(Annotation {
            id,
            thread_id: details.thread_id,
            thread_number: self.thread,
            file_version_id: self.item.map(|item| item.id).unwrap_or_default(),
            annotation_type: details.annotation_type,
            message: self.message.unwrap_or_default(),
            location: details.location,
            drawing_paths: details.drawing_paths,
            created_by: self.created_by.map(WireUser::into_user).unwrap_or_default(),
            permissions: self.permissions.unwrap_or_default(),
            created_at,
            modified_at: self.modified_at.unwrap_or(created_at),
            is_pending: false,
        })
    }
}

/// One page of a marker-paginated annotation listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnnotationPage {
    /// Object type; `error` for failures.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Raw entries of this page.
    #[serde(default)]
    pub entries: Option<Vec<Value>>,
    /// Marker of the next page, absent on the last one.
    #[serde(default)]
    pub next_marker: Option<String>,
}

impl AnnotationPage {
    /// Returns whether this page is well formed: not an error, with entries.
    pub fn is_valid(&self) -> bool {
        self.kind.as_deref() != Some("error") && self.entries.is_some()
    }

    /// Returns the marker of the next page, ignoring empty markers.
    pub fn next_marker(&self) -> Option<&str> {
        self.next_marker.as_deref().filter(|marker| !marker.is_empty())
    }
}

/// (De)serializes the thread ordinal, which the API sends as a string.
mod thread_number {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    pub fn serialize<S>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(number) => serializer.serialize_str(&number.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Number(number)) => Some(number),
            Some(Raw::Text(text)) => text.trim().parse().ok(),
            None => None,
        })
    }
}
