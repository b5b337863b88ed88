#![forbid(unsafe_code)]
//! quill-core: draft synchronization, attachment upload, and submission
//! logic for issue composers, decoupled from any UI layer.
//!
//! The [`Composer`] facade owns one draft and coordinates three concerns
//! behind trait seams: a [`DraftService`] talking to the tracker, a
//! [`KeyValueStore`] for the device-local draft/project keys, and a
//! [`FileSource`] producing attachment candidates. All remote failures are
//! routed through a [`Notifier`] and surfaced as typed outcomes; none of
//! them poison the in-memory draft.

pub mod composer;
pub mod error;
pub mod files;
pub mod model;
pub mod notify;
pub mod reducer;
pub mod service;
pub mod store;

pub use composer::{AttachOutcome, Composer, PushOutcome, SubmitOutcome};
pub use error::{AcquireError, ServiceError, StoreError};
pub use files::{CandidateFile, FileOrigin, FileSource};
pub use model::{
    Attachment, CreatedIssue, CustomField, Draft, DraftId, EntryKey, IssueId, Project, ProjectId,
    ProjectSelection, PushScope, SavePayload,
};
pub use notify::{Notifier, NullNotifier, TracingNotifier};
pub use service::DraftService;
pub use store::{DEFAULT_PROJECT_KEY, DRAFT_ID_KEY, KeyValueStore, MemoryStore, SqliteStore};
