//! Working-draft data model.
//!
//! The draft is the single shared object all composer components mutate.
//! Collection entries (custom fields, attachments) carry a session-local
//! [`EntryKey`] so edits and rollbacks can address exactly one entry even
//! when equal-looking entries coexist or list order changes underneath them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Display label used while no project is selected.
pub const UNSELECTED_LABEL: &str = "Not selected";

/// Identifier of a server-side draft.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(String);

/// Identifier of a project on the remote tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

/// Identifier of a created issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(DraftId);
string_id!(ProjectId);
string_id!(IssueId);

/// Session-local stable key for a draft collection entry.
///
/// Keys are reassigned whenever a server representation is adopted; a key is
/// valid between two adoptions, which is exactly the window in which a caller
/// can hold one. Zero means "not yet assigned".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct EntryKey(u64);

impl EntryKey {
    pub(crate) const fn from_seq(seq: u64) -> Self {
        Self(seq)
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A destination project for the issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Option<ProjectId>,
    #[serde(rename = "shortName", default)]
    pub short_name: String,
}

impl Project {
    #[must_use]
    pub fn new(id: impl Into<ProjectId>, short_name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            short_name: short_name.into(),
        }
    }

    /// Selection built from a stored default project id. The display name
    /// stays the unselected label until a push response supplies the real one.
    #[must_use]
    pub fn provisional(id: ProjectId) -> Self {
        Self {
            id: Some(id),
            short_name: UNSELECTED_LABEL.to_string(),
        }
    }
}

/// Whether a project has been chosen for the draft.
///
/// Selection is tested by tag, never by id presence: a `Selected` project may
/// transiently carry no id, and submission gating checks the id separately.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProjectSelection {
    #[default]
    NotSelected,
    Selected(Project),
}

impl ProjectSelection {
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        matches!(self, Self::Selected(_))
    }

    /// Id of the selected project, if a project is selected and has one.
    #[must_use]
    pub const fn project_id(&self) -> Option<&ProjectId> {
        match self {
            Self::Selected(project) => project.id.as_ref(),
            Self::NotSelected => None,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Selected(project) => &project.short_name,
            Self::NotSelected => UNSELECTED_LABEL,
        }
    }
}

// On the wire a selection is a nullable project object.
impl Serialize for ProjectSelection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Selected(project) => serializer.serialize_some(project),
            Self::NotSelected => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for ProjectSelection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<Project>::deserialize(deserializer)?
            .map_or(Self::NotSelected, Self::Selected))
    }
}

/// Opaque custom field entry: a server-defined descriptor plus the current
/// value. The descriptor is round-tripped untouched and must be a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    #[serde(skip)]
    pub key: EntryKey,
    #[serde(flatten)]
    pub descriptor: serde_json::Value,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl CustomField {
    #[must_use]
    pub fn new(descriptor: serde_json::Value, value: serde_json::Value) -> Self {
        Self {
            key: EntryKey::default(),
            descriptor,
            value,
        }
    }
}

/// An uploaded or uploading file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(skip)]
    pub key: EntryKey,
    pub url: String,
    pub name: String,
}

impl Attachment {
    #[must_use]
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: EntryKey::default(),
            url: url.into(),
            name: name.into(),
        }
    }
}

/// Issue returned by the remote service on successful creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    pub id: IssueId,
    #[serde(default)]
    pub summary: Option<String>,
}

/// The mutable working issue.
///
/// Invariants: `attachments` is ordered most recently added first; `fields`
/// order comes from the remote draft and is never reordered by local edits.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Draft {
    pub id: Option<DraftId>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub project: ProjectSelection,
    pub fields: Vec<CustomField>,
    pub attachments: Vec<Attachment>,
}

impl Draft {
    /// Look up a field entry by its stable key.
    #[must_use]
    pub fn field(&self, key: EntryKey) -> Option<&CustomField> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Replace the value of exactly the keyed entry, leaving every other
    /// entry and the list order untouched. Returns false if the key is gone
    /// (e.g. the list was replaced by a push response in the meantime).
    pub fn set_field_value(&mut self, key: EntryKey, value: serde_json::Value) -> bool {
        match self.fields.iter_mut().find(|f| f.key == key) {
            Some(field) => {
                field.value = value;
                true
            }
            None => false,
        }
    }

    /// Prepend an attachment (most recently added first).
    pub fn prepend_attachment(&mut self, attachment: Attachment) {
        self.attachments.insert(0, attachment);
    }

    /// Remove exactly the keyed attachment, wherever it currently sits.
    /// Returns false if no entry carries the key.
    pub fn remove_attachment(&mut self, key: EntryKey) -> bool {
        let before = self.attachments.len();
        self.attachments.retain(|a| a.key != key);
        before != self.attachments.len()
    }

    /// Build the outgoing save payload for the given scope.
    #[must_use]
    pub fn payload(&self, scope: PushScope) -> SavePayload<'_> {
        SavePayload {
            id: self.id.as_ref(),
            summary: self.summary.as_deref(),
            description: self.description.as_deref(),
            project: self.project.project_id().map(|id| ProjectRef { id }),
            fields: match scope {
                PushScope::Full => Some(&self.fields),
                PushScope::ProjectOnly => None,
            },
        }
    }

    /// Reassign stable keys to every collection entry from the session
    /// counter. Called whenever a server representation is adopted.
    pub(crate) fn assign_entry_keys(&mut self, seq: &mut u64) {
        for field in &mut self.fields {
            *seq += 1;
            field.key = EntryKey::from_seq(*seq);
        }
        for attachment in &mut self.attachments {
            *seq += 1;
            attachment.key = EntryKey::from_seq(*seq);
        }
    }
}

/// How much of the draft a push sends.
///
/// `ProjectOnly` withholds the fields list: after a project change, stale
/// field values can be incompatible with the new project and the server
/// rejects the whole save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushScope {
    Full,
    ProjectOnly,
}

impl PushScope {
    #[must_use]
    pub const fn omits_fields(self) -> bool {
        matches!(self, Self::ProjectOnly)
    }
}

/// Wire reference to a project: id only.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProjectRef<'a> {
    pub id: &'a ProjectId,
}

/// Outgoing save payload: a borrowed view of the draft with absent parts
/// genuinely missing from the serialized form.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SavePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a DraftId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectRef<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<&'a [CustomField]>,
}
