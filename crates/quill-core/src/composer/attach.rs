//! Attachment upload coordinator: optimistic add with key-based rollback.
//!
//! The attaching slot is the only mutual exclusion here: one attachment
//! round-trip in flight at a time. The slot is claimed in the same commit
//! as the optimistic prepend and is cleared however the upload settles.

use std::sync::Arc;
use tracing::debug;

use crate::error::ServiceError;
use crate::files::FileOrigin;
use crate::model::Attachment;
use crate::notify::{CANNOT_ATTACH_FILE, PICKER_FAILED};

use super::{Backends, Shared};

/// How an attach request settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum AttachOutcome {
    /// Uploaded; the attachment stays in the list.
    Attached,
    /// Another attachment is already in flight; nothing was mutated.
    AlreadyAttaching,
    /// The picker/camera produced no file; nothing was mutated.
    AcquireFailed,
    /// Upload failed; the optimistic entry was rolled back.
    UploadFailed,
}

#[derive(Clone)]
pub(crate) struct AttachmentCoordinator {
    state: Shared,
    backends: Arc<Backends>,
}

impl AttachmentCoordinator {
    pub(crate) fn new(state: Shared, backends: Arc<Backends>) -> Self {
        Self { state, backends }
    }

    pub(crate) async fn attach_photo(&self, origin: FileOrigin) -> AttachOutcome {
        if self.state.lock().await.attaching.is_some() {
            return AttachOutcome::AlreadyAttaching;
        }

        let candidate = match self.backends.files.acquire(origin).await {
            Ok(candidate) => candidate,
            Err(err) => {
                self.backends.notifier.error(PICKER_FAILED, &err);
                return AttachOutcome::AcquireFailed;
            }
        };

        // Optimistic add: prepend and claim the slot in one commit, before
        // the upload. Re-checks the slot because another request may have
        // claimed it while the picker was open.
        let (attachment, draft_id) = {
            let mut state = self.state.lock().await;
            if state.attaching.is_some() {
                return AttachOutcome::AlreadyAttaching;
            }
            let mut attachment = Attachment::new(candidate.url, candidate.name);
            attachment.key = state.next_entry_key();
            state.draft.prepend_attachment(attachment.clone());
            state.attaching = Some(attachment.clone());
            (attachment, state.draft.id.clone())
        };

        let uploaded = match draft_id {
            Some(id) => {
                self.backends
                    .service
                    .attach_file(&id, &attachment.url, &attachment.name)
                    .await
            }
            // No server-side draft to address the upload to; settle it the
            // same way a server rejection would.
            None => Err(ServiceError::remote("draft has not been saved yet")),
        };

        match uploaded {
            Ok(()) => {
                let mut state = self.state.lock().await;
                state.attaching = None;
                debug!(name = %attachment.name, "attachment uploaded");
                AttachOutcome::Attached
            }
            Err(err) => {
                self.backends.notifier.error(CANNOT_ATTACH_FILE, &err);
                // Roll back exactly the optimistic entry, wherever edits or
                // adoptions have moved it, and release the slot.
                let mut state = self.state.lock().await;
                state.draft.remove_attachment(attachment.key);
                state.attaching = None;
                AttachOutcome::UploadFailed
            }
        }
    }
}
