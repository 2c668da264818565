//! Structural failures of runtime operations.
//!
//! These abort the one operation that raised them and are handed back to
//! the caller. Advisory conditions never show up here; they go through an
//! [`AdvisorySink`](opal_diagnostic::AdvisorySink).

use opal_diagnostic::ErrorCode;
use opal_hash::{AccessReason, HashError};

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// A value of one kind was used where another was required.
    #[error("Not {expected}: got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    #[error("Modification of a read-only value attempted")]
    Immutable,

    /// Structural mutation of a restricted table.
    #[error("{}", access_message(.key, .reason))]
    AccessDenied { key: String, reason: AccessReason },

    #[error("Recursive inheritance detected in package '{package}'")]
    InheritanceCycle { package: String },

    /// C3 could not merge the parents' orders.
    #[error("Inconsistent hierarchy during C3 merge of class '{package}'")]
    InconsistentHierarchy { package: String },

    #[error("Out of memory ({requested_buckets} buckets requested)")]
    OutOfMemory { requested_buckets: usize },

    /// An activation handle outlived its activation.
    #[error("Activation {index} (generation {generation}) is no longer live")]
    StaleActivation { index: u32, generation: u32 },
}

impl RuntimeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RuntimeError::TypeMismatch { .. } => ErrorCode::E2001,
            RuntimeError::Immutable => ErrorCode::E2002,
            RuntimeError::AccessDenied { .. } => ErrorCode::E2003,
            RuntimeError::InheritanceCycle { .. } => ErrorCode::E2004,
            RuntimeError::InconsistentHierarchy { .. } => ErrorCode::E2005,
            RuntimeError::StaleActivation { .. } => ErrorCode::E2006,
            RuntimeError::OutOfMemory { .. } => ErrorCode::E9001,
        }
    }

    /// Fatal errors end the runtime instance, not just the operation.
    pub fn is_fatal(&self) -> bool {
        self.code().is_fatal()
    }
}

fn access_message(key: &str, reason: &AccessReason) -> String {
    HashError::AccessDenied {
        key: key.to_owned(),
        reason: *reason,
    }
    .to_string()
}

impl From<HashError> for RuntimeError {
    fn from(err: HashError) -> Self {
        match err {
            HashError::AccessDenied { key, reason } => RuntimeError::AccessDenied { key, reason },
            HashError::OutOfMemory { requested_buckets } => {
                RuntimeError::OutOfMemory { requested_buckets }
            }
        }
    }
}
