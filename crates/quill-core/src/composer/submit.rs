//! Issue submission controller: gate, processing flag, draft cleanup.
//!
//! `processing` is a two-state machine: set when a submission starts,
//! restored as the final step on every path out. Nothing else toggles it.

use std::sync::Arc;
use tracing::info;

use crate::model::{CreatedIssue, PushScope};
use crate::notify::CANNOT_CREATE_ISSUE;
use crate::store::DRAFT_ID_KEY;

use super::sync::Synchronizer;
use super::{Backends, Shared};

/// How a submission settled.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum SubmitOutcome {
    /// The issue exists; the persisted draft id was cleaned up. The caller
    /// owns what happens next (typically popping the screen).
    Created(CreatedIssue),
    /// The gate was closed (empty summary, no project id, already
    /// processing, or an attachment in flight). Nothing happened.
    Blocked,
    /// Creation failed; reported. The draft and its persisted id survive so
    /// the user can retry.
    Failed,
}

#[derive(Clone)]
pub(crate) struct SubmissionController {
    state: Shared,
    backends: Arc<Backends>,
    sync: Synchronizer,
}

impl SubmissionController {
    pub(crate) fn new(state: Shared, backends: Arc<Backends>, sync: Synchronizer) -> Self {
        Self {
            state,
            backends,
            sync,
        }
    }

    pub(crate) async fn submit(&self) -> SubmitOutcome {
        {
            let mut state = self.state.lock().await;
            if !state.can_submit() {
                return SubmitOutcome::Blocked;
            }
            state.processing = true;
        }

        let outcome = self.create_issue().await;

        // Guaranteed cleanup: no path leaves processing stuck at true.
        self.state.lock().await.processing = false;
        outcome
    }

    async fn create_issue(&self) -> SubmitOutcome {
        // Final push so the server draft carries edits that had no trigger
        // of their own (summary, description). Push failures follow the
        // ordinary push taxonomy; creation still gets its chance and fails
        // with its own report if the draft really is unusable.
        self.sync.push(PushScope::Full).await;

        let draft = self.state.lock().await.draft.clone();
        match self.backends.service.create_issue(&draft).await {
            Ok(created) => {
                info!(issue = %created.id, "issue created");
                // The draft's job is done; next entry starts fresh.
                self.backends.delete_key(DRAFT_ID_KEY).await;
                SubmitOutcome::Created(created)
            }
            Err(err) => {
                self.backends.notifier.error(CANNOT_CREATE_ISSUE, &err);
                SubmitOutcome::Failed
            }
        }
    }
}
