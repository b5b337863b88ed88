//! Remote draft service seam.

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::model::{CreatedIssue, Draft, DraftId, SavePayload};

/// Remote tracker operations the composer consumes.
///
/// Implementations own transport, authentication, and timeout behavior; the
/// composer only sees typed results. Entity-vanished responses (the tracker's
/// "Can't find entity with id ..." class) must map to
/// [`ServiceError::NotFound`]; that variant is what drives the silent
/// project-reset recovery.
#[async_trait]
pub trait DraftService: Send + Sync {
    /// Fetch an existing server-side draft by id.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] when the draft no longer exists, any other
    /// failure as [`ServiceError::Remote`].
    async fn load_draft(&self, id: &DraftId) -> Result<Draft, ServiceError>;

    /// Create or update the server-side draft and return the authoritative
    /// representation (the server may compute or normalize parts of it).
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] when a referenced entity vanished, any
    /// other failure as [`ServiceError::Remote`].
    async fn save_draft(&self, payload: SavePayload<'_>) -> Result<Draft, ServiceError>;

    /// Turn the server-side draft into a real issue.
    ///
    /// # Errors
    ///
    /// Any failure as a [`ServiceError`]; the draft survives server-side.
    async fn create_issue(&self, draft: &Draft) -> Result<CreatedIssue, ServiceError>;

    /// Upload a file against the draft.
    ///
    /// # Errors
    ///
    /// Any failure as a [`ServiceError`]; no partial attachment remains.
    async fn attach_file(&self, draft: &DraftId, url: &str, name: &str)
    -> Result<(), ServiceError>;
}
