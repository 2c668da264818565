//! Hash engine errors.

use std::fmt;

/// Error from a structural hash table operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Structural mutation of a restricted table.
    AccessDenied {
        /// The key as displayed in the message.
        key: String,
        reason: AccessReason,
    },
    /// The bucket array could not be grown.
    OutOfMemory { requested_buckets: usize },
}

/// Which restricted-table rule was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    /// Storing or fetching for write a key outside the allowed set.
    DisallowedKey,
    /// Deleting a key outside the allowed set.
    DeleteDisallowed,
    /// Deleting a key whose value is read-only.
    DeleteReadonly,
    /// Clearing a table that holds a read-only value.
    ClearReadonly,
}

impl HashError {
    pub(crate) fn denied(key: &[u8], reason: AccessReason) -> Self {
        HashError::AccessDenied {
            key: String::from_utf8_lossy(key).into_owned(),
            reason,
        }
    }
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashError::AccessDenied { key, reason } => match reason {
                AccessReason::DisallowedKey => {
                    write!(f, "Attempt to access disallowed key '{key}' in a restricted hash")
                }
                AccessReason::DeleteDisallowed => {
                    write!(f, "Attempt to delete disallowed key '{key}' from a restricted hash")
                }
                AccessReason::DeleteReadonly => {
                    write!(f, "Attempt to delete readonly key '{key}' from a restricted hash")
                }
                AccessReason::ClearReadonly => write!(
                    f,
                    "Attempt to delete readonly key '{key}' from a restricted hash"
                ),
            },
            HashError::OutOfMemory { requested_buckets } => write!(
                f,
                "Out of memory during hash split ({requested_buckets} buckets requested)"
            ),
        }
    }
}

impl std::error::Error for HashError {}
