//! File-acquisition seam (image picker, camera).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AcquireError;

/// Where a candidate file comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOrigin {
    Library,
    Camera,
}

impl FileOrigin {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Library => "library",
            Self::Camera => "camera",
        }
    }
}

impl fmt::Display for FileOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file picked by the user, not yet uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub url: String,
    pub name: String,
}

/// Capability that produces candidate files from the device.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Let the user pick or shoot a file.
    ///
    /// # Errors
    ///
    /// [`AcquireError`] when the user cancels, permission is denied, or the
    /// device fails; the coordinator reports it and mutates nothing.
    async fn acquire(&self, origin: FileOrigin) -> Result<CandidateFile, AcquireError>;
}
