//! Diagnostics channel for the Opal runtime.
//!
//! The runtime core never aborts an operation for an advisory condition.
//! Coercing `"42abc"` to a number still produces `42`; reading an undefined
//! cell still produces `0`. The condition is reported here instead, and the
//! host decides what to do with it (print, count, escalate).
//!
//! - [`ErrorCode`]: stable identifiers for every condition, advisory or not
//! - [`Advisory`]: one reported condition with its originating [`Site`]
//! - [`DiagnosticQueue`]: bounded, de-duplicating collection
//! - [`AdvisorySink`]: the seam operations report through
//!
//! Structural failures (`TypeMismatch`, `AccessDenied`, ...) are `Err` values
//! owned by the crates that raise them; they only borrow codes from here.

mod advisory;
mod error_code;
pub mod queue;
mod sink;

pub use advisory::{Advisory, AdvisoryKind, Site};
pub use error_code::{parse_error_code, ErrorCode};
pub use queue::{DiagnosticConfig, DiagnosticQueue};
pub use sink::{AdvisorySink, Diagnostics, NullSink};
