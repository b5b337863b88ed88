//! Draft synchronizer: screen-entry recovery, serialized pushes, edits.
//!
//! A push sends the working draft to the remote service and adopts the
//! response as new ground truth. Saves are serialized behind an async gate:
//! the snapshot is taken at gate acquisition, so a push that waited carries
//! every edit made in the meantime, and responses can never be adopted out
//! of start order. A push whose snapshot would be identical to the last
//! acknowledged one skips the network call.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::model::{DraftId, EntryKey, Project, ProjectId, ProjectSelection, PushScope};
use crate::notify::CANNOT_UPDATE_DRAFT;
use crate::store::{DEFAULT_PROJECT_KEY, DRAFT_ID_KEY};

use super::{Backends, Shared};

/// How a push settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PushOutcome {
    /// The server accepted the save and its representation was adopted.
    Saved,
    /// No selected project with an id; nothing was sent.
    NoProject,
    /// Nothing changed since the last acknowledged save; skipped.
    AlreadyCurrent,
    /// A referenced entity vanished server-side; the project selection was
    /// silently reset.
    ProjectVanished,
    /// Any other failure; reported, local edits kept.
    Failed,
}

#[derive(Clone)]
pub(crate) struct Synchronizer {
    state: Shared,
    backends: Arc<Backends>,
    push_gate: Arc<Mutex<()>>,
}

impl Synchronizer {
    pub(crate) fn new(state: Shared, backends: Arc<Backends>) -> Self {
        Self {
            state,
            backends,
            push_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Screen-entry protocol: recover the persisted draft if one is known,
    /// otherwise start fresh and bind the sticky default project.
    pub(crate) async fn initialize(&self, entry_draft: Option<DraftId>) {
        let draft_id = match entry_draft {
            Some(id) => Some(id),
            None => self.backends.read_key(DRAFT_ID_KEY).await.map(DraftId::from),
        };

        if let Some(id) = draft_id {
            match self.backends.service.load_draft(&id).await {
                Ok(remote) => {
                    self.state.lock().await.adopt(remote);
                    debug!(draft = %id, "recovered persisted draft");
                    return;
                }
                Err(err) => {
                    // Recovery, not an error: forget the unusable draft and
                    // fall through to the fresh-draft flow.
                    debug!(draft = %id, error = %err, "persisted draft unusable, starting fresh");
                    self.backends.delete_key(DRAFT_ID_KEY).await;
                    self.state.lock().await.draft.id = None;
                }
            }
        }

        let Some(project_id) = self.backends.read_key(DEFAULT_PROJECT_KEY).await else {
            return;
        };
        {
            let mut state = self.state.lock().await;
            state.draft.project =
                ProjectSelection::Selected(Project::provisional(ProjectId::from(project_id)));
            state.touch();
        }
        // Push-on-load: bind the fresh draft to the sticky project now rather
        // than waiting for the first user edit.
        self.push(PushScope::Full).await;
    }

    /// Send the working draft to the remote service and adopt the response.
    pub(crate) async fn push(&self, scope: PushScope) -> PushOutcome {
        let _gate = self.push_gate.lock().await;

        let (snapshot, had_id) = {
            let state = self.state.lock().await;
            if state.draft.project.project_id().is_none() {
                return PushOutcome::NoProject;
            }
            if state.draft.id.is_some() && state.revision == state.acked_revision {
                return PushOutcome::AlreadyCurrent;
            }
            (state.draft.clone(), state.draft.id.is_some())
        };

        match self.backends.service.save_draft(snapshot.payload(scope)).await {
            Ok(remote) => {
                let server_id = remote.id.clone();
                self.state.lock().await.adopt(remote);
                if !had_id && let Some(id) = server_id {
                    self.backends.write_key(DRAFT_ID_KEY, id.as_str()).await;
                }
                debug!(?scope, "draft pushed");
                PushOutcome::Saved
            }
            Err(err) if err.is_missing_entity() => {
                // The chosen project is gone server-side. Silent correction;
                // the user just sees the selector drop back to unselected.
                let mut state = self.state.lock().await;
                state.draft.project = ProjectSelection::NotSelected;
                state.touch();
                debug!(error = %err, "referenced project vanished, selection reset");
                PushOutcome::ProjectVanished
            }
            Err(err) => {
                // Local edits stay; retry is user-initiated.
                self.backends.notifier.error(CANNOT_UPDATE_DRAFT, &err);
                PushOutcome::Failed
            }
        }
    }

    pub(crate) async fn edit_summary(&self, text: String) {
        let mut state = self.state.lock().await;
        state.draft.summary = Some(text);
        state.touch();
    }

    pub(crate) async fn edit_description(&self, text: String) {
        let mut state = self.state.lock().await;
        state.draft.description = Some(text);
        state.touch();
    }

    /// Select a project, push project-only, then persist the sticky default
    /// id however the push settled.
    pub(crate) async fn set_project(&self, project: Project) {
        let project_id = project.id.clone();
        {
            let mut state = self.state.lock().await;
            state.draft.project = ProjectSelection::Selected(project);
            state.touch();
        }
        self.push(PushScope::ProjectOnly).await;
        if let Some(id) = project_id {
            self.backends.write_key(DEFAULT_PROJECT_KEY, id.as_str()).await;
        }
    }

    /// Replace one field value by key, then push with the full field list.
    pub(crate) async fn set_field_value(&self, key: EntryKey, value: serde_json::Value) {
        {
            let mut state = self.state.lock().await;
            if state.draft.set_field_value(key, value) {
                state.touch();
            } else {
                debug!(%key, "field entry gone, edit dropped");
            }
        }
        self.push(PushScope::Full).await;
    }
}
