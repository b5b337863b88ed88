//! Error types at the composer's external seams.
//!
//! None of these are fatal to the composer: every failure is classified at
//! the component boundary and reacted to locally. Vanished entities and
//! failed draft loads recover silently; everything else raises a
//! non-blocking notification.

use thiserror::Error;

/// Failure returned by the remote draft service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The referenced entity no longer exists on the server (deleted draft,
    /// vanished project). Implementations map their tracker's
    /// entity-not-found responses onto this variant.
    #[error("entity not found: {message}")]
    NotFound { message: String },

    /// Any other remote failure: transport, validation, server error.
    #[error("{message}")]
    Remote { message: String },
}

impl ServiceError {
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// True when the failure means the referenced entity is gone, which the
    /// synchronizer handles by silently resetting the project selection.
    #[must_use]
    pub const fn is_missing_entity(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failure from the local key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("storage backend: {message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure acquiring a candidate file from the picker or camera
/// (user cancelled, permission denied, device error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("file acquisition failed: {message}")]
pub struct AcquireError {
    pub message: String,
}

impl AcquireError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceError;

    #[test]
    fn only_not_found_classifies_as_missing_entity() {
        assert!(ServiceError::not_found("Can't find entity with id p-1").is_missing_entity());
        assert!(!ServiceError::remote("500 internal error").is_missing_entity());
    }

    #[test]
    fn display_carries_the_message() {
        let err = ServiceError::not_found("Can't find entity with id p-1");
        assert_eq!(
            err.to_string(),
            "entity not found: Can't find entity with id p-1"
        );
        assert_eq!(
            ServiceError::remote("timeout").to_string(),
            "timeout"
        );
    }
}
