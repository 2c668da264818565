//! Stack growth for deep recursion.
//!
//! The runtime recurses over structures whose depth is controlled by user
//! programs: releasing a long chain of nested references, linearizing a tall
//! inheritance graph, cloning closures nested inside closures. Any of these
//! can exceed the native stack long before memory runs out.
//!
//! - **Native targets**: grows the stack on demand via `stacker`.
//! - **WASM targets**: plain call (the engine manages its own stack).

/// Remaining stack below which a new segment is allocated (128KB).
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated stack segment (1MB).
const SEGMENT_SIZE: usize = 1024 * 1024;

/// Run `f` with at least [`RED_ZONE`] bytes of stack available.
///
/// Wrap the recursive step, not the entry point:
///
/// ```text
/// fn release(cell: Body) {
///     ensure_sufficient_stack(|| drop(cell.take_payload()))
/// }
/// ```
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// WASM version: call directly.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

/// Remaining stack in bytes, when the platform can tell.
///
/// Used by tracing output around deep operations; `None` on WASM.
#[inline]
pub fn remaining_stack() -> Option<usize> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        stacker::remaining_stack()
    }
    #[cfg(target_arch = "wasm32")]
    {
        None
    }
}
