//! The issue composer: draft synchronization, attachment uploads, and
//! submission over one shared working draft.
//!
//! Three components own the flows ([`sync`], [`attach`], [`submit`]); this
//! module owns what they share: the state cell, the backend handles, and the
//! [`Composer`] facade the UI talks to.
//!
//! Locking discipline: the state mutex guards synchronous sections only and
//! is never held across a network await. Every mutation is a commit point on
//! an explicit snapshot; in-flight operations re-read state when they settle.

mod attach;
mod submit;
mod sync;

pub use attach::AttachOutcome;
pub use submit::SubmitOutcome;
pub use sync::PushOutcome;

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::files::{FileOrigin, FileSource};
use crate::model::{Attachment, Draft, DraftId, EntryKey, Project, PushScope};
use crate::notify::Notifier;
use crate::service::DraftService;
use crate::store::KeyValueStore;

use attach::AttachmentCoordinator;
use submit::SubmissionController;
use sync::Synchronizer;

/// Mutable composer state shared by the three components.
#[derive(Debug)]
pub(crate) struct ComposerState {
    pub(crate) draft: Draft,
    /// Bumped on every local edit.
    pub(crate) revision: u64,
    /// Revision the server last acknowledged; `revision == acked_revision`
    /// means the draft content matches the last adopted representation.
    pub(crate) acked_revision: u64,
    pub(crate) processing: bool,
    /// The single in-flight attachment slot.
    pub(crate) attaching: Option<Attachment>,
    key_seq: u64,
}

impl ComposerState {
    fn new() -> Self {
        Self {
            draft: Draft::default(),
            revision: 0,
            acked_revision: 0,
            processing: false,
            attaching: None,
            key_seq: 0,
        }
    }

    /// Record a local edit.
    pub(crate) const fn touch(&mut self) {
        self.revision += 1;
    }

    /// Replace the working draft with a server representation and mark the
    /// current revision acknowledged.
    pub(crate) fn adopt(&mut self, mut remote: Draft) {
        remote.assign_entry_keys(&mut self.key_seq);
        self.draft = remote;
        self.acked_revision = self.revision;
    }

    pub(crate) const fn next_entry_key(&mut self) -> EntryKey {
        self.key_seq += 1;
        EntryKey::from_seq(self.key_seq)
    }

    /// Submission gate: non-empty summary, a selected project with an id,
    /// not already processing, and no attachment in flight.
    pub(crate) fn can_submit(&self) -> bool {
        self.draft
            .summary
            .as_deref()
            .is_some_and(|s| !s.is_empty())
            && self.draft.project.project_id().is_some()
            && !self.processing
            && self.attaching.is_none()
    }
}

pub(crate) type Shared = Arc<Mutex<ComposerState>>;

/// External collaborators, shared by every component.
pub(crate) struct Backends {
    pub(crate) service: Arc<dyn DraftService>,
    pub(crate) store: Arc<dyn KeyValueStore>,
    pub(crate) files: Arc<dyn FileSource>,
    pub(crate) notifier: Arc<dyn Notifier>,
}

impl Backends {
    /// Read a persisted identifier, degrading storage faults and empty
    /// values to "absent". The composer has no fatal storage path.
    pub(crate) async fn read_key(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(err) => {
                warn!(key, error = %err, "storage read failed, treating as absent");
                None
            }
        }
    }

    pub(crate) async fn write_key(&self, key: &str, value: &str) {
        if let Err(err) = self.store.set(key, value).await {
            warn!(key, error = %err, "storage write failed");
        }
    }

    pub(crate) async fn delete_key(&self, key: &str) {
        if let Err(err) = self.store.delete(key).await {
            warn!(key, error = %err, "storage delete failed");
        }
    }
}

/// Facade over the composer core; one instance per composer screen.
///
/// All methods resolve when their visible state has settled. Failures never
/// escape as errors: they are classified internally and either silently
/// recovered or reported through the [`Notifier`].
#[derive(Clone)]
pub struct Composer {
    state: Shared,
    sync: Synchronizer,
    attachments: AttachmentCoordinator,
    submission: SubmissionController,
}

impl Composer {
    #[must_use]
    pub fn new(
        service: Arc<dyn DraftService>,
        store: Arc<dyn KeyValueStore>,
        files: Arc<dyn FileSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let state: Shared = Arc::new(Mutex::new(ComposerState::new()));
        let backends = Arc::new(Backends {
            service,
            store,
            files,
            notifier,
        });
        let sync = Synchronizer::new(Arc::clone(&state), Arc::clone(&backends));
        let attachments = AttachmentCoordinator::new(Arc::clone(&state), Arc::clone(&backends));
        let submission = SubmissionController::new(Arc::clone(&state), backends, sync.clone());
        Self {
            state,
            sync,
            attachments,
            submission,
        }
    }

    /// Run the screen-entry protocol once: recover the persisted draft (or
    /// fall back to a fresh one) and bind the sticky default project.
    pub async fn initialize(&self, entry_draft: Option<DraftId>) {
        self.sync.initialize(entry_draft).await;
    }

    /// Update the summary in memory. Pushed on the next explicit trigger.
    pub async fn edit_summary(&self, text: impl Into<String> + Send) {
        self.sync.edit_summary(text.into()).await;
    }

    /// Update the description in memory. Pushed on the next explicit trigger.
    pub async fn edit_description(&self, text: impl Into<String> + Send) {
        self.sync.edit_description(text.into()).await;
    }

    /// Select a destination project and push the change (project-only scope),
    /// then persist the sticky default project id however the push settled.
    pub async fn set_project(&self, project: Project) {
        self.sync.set_project(project).await;
    }

    /// Replace the value of one custom field entry and push the draft.
    pub async fn set_field_value(&self, key: EntryKey, value: serde_json::Value) {
        self.sync.set_field_value(key, value).await;
    }

    /// Acquire a file from the device and upload it optimistically.
    pub async fn attach_photo(&self, origin: FileOrigin) -> AttachOutcome {
        self.attachments.attach_photo(origin).await
    }

    /// Submit the draft as a real issue. Gated; see [`SubmitOutcome`].
    pub async fn submit(&self) -> SubmitOutcome {
        self.submission.submit().await
    }

    /// Push any unpushed edits (screen-leave hook).
    pub async fn flush(&self) -> PushOutcome {
        self.sync.push(PushScope::Full).await
    }

    /// Snapshot of the current working draft.
    pub async fn draft(&self) -> Draft {
        self.state.lock().await.draft.clone()
    }

    /// Whether a submission is currently running.
    pub async fn is_processing(&self) -> bool {
        self.state.lock().await.processing
    }

    /// The attachment currently in flight, if any.
    pub async fn attaching(&self) -> Option<Attachment> {
        self.state.lock().await.attaching.clone()
    }

    /// Whether the submission gate is currently open.
    pub async fn can_submit(&self) -> bool {
        self.state.lock().await.can_submit()
    }
}
