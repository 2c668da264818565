//! The seam advisory conditions are reported through.
//!
//! Operations take `&dyn AdvisorySink` rather than a concrete queue so the
//! host can route advisories anywhere. The runtime's own sink is
//! [`Diagnostics`]; [`NullSink`] discards.

use std::cell::RefCell;

use crate::{Advisory, AdvisoryKind, DiagnosticConfig, DiagnosticQueue};

/// Receiver of advisory conditions.
pub trait AdvisorySink {
    /// Report one advisory. Never fails, never aborts the caller.
    fn advise(&self, advisory: Advisory);
}

/// Sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl AdvisorySink for NullSink {
    fn advise(&self, _advisory: Advisory) {}
}

/// Per-instance advisory queue with interior mutability.
///
/// Single-threaded like the rest of an instance's state: value operations
/// report through `&self` while the instance keeps the queue.
#[derive(Debug, Default)]
pub struct Diagnostics {
    queue: RefCell<DiagnosticQueue>,
}

impl Diagnostics {
    pub fn new(config: DiagnosticConfig) -> Self {
        Diagnostics {
            queue: RefCell::new(DiagnosticQueue::with_config(config)),
        }
    }

    /// Take everything reported so far.
    pub fn take(&self) -> Vec<Advisory> {
        self.queue.borrow_mut().flush()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    pub fn count_of(&self, kind: AdvisoryKind) -> usize {
        self.queue.borrow().count_of(kind)
    }

    /// Forget queued advisories and which sites already reported.
    pub fn reset(&self) {
        self.queue.borrow_mut().reset();
    }
}

impl AdvisorySink for Diagnostics {
    fn advise(&self, advisory: Advisory) {
        self.queue.borrow_mut().add(advisory);
    }
}

#[cfg(test)]
mod tests;
