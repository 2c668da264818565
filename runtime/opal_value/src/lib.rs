//! Opal Value - the value cell of the Opal runtime.
//!
//! Every runtime datum lives in an [`Sv`]: a reference-counted cell whose
//! body type moves up a fixed lattice as it learns to hold more forms of
//! its value, and never back down.
//!
//! # Architecture
//!
//! - [`Sv`] / [`WeakSv`]: strong and non-owning handles to a cell
//! - [`SvType`] / [`Caps`]: body types and the upgrade lattice
//! - [`SvFlags`]: which cached forms are valid, plus state flags
//! - [`numeric`]: number recognition and `%.15g` formatting
//! - [`MagicVtable`]: get/set/clear/free hooks attached to a cell
//!
//! # Conditions
//!
//! Structural failures come back as [`RuntimeError`]. Advisory conditions
//! (a string that is not quite a number, a read of undef) are reported
//! through an [`AdvisorySink`](opal_diagnostic::AdvisorySink) and the
//! operation still produces its best-effort value.

mod aggregate;
mod code;
mod coerce;
mod error;
mod flags;
mod kind;
mod magic;
pub mod numeric;
mod reference;
mod sv;

pub use code::{ActivationId, CodeBody, HandleBody, NativeFn, UnitId};
pub use error::{RuntimeError, RuntimeResult};
pub use flags::SvFlags;
pub use kind::{Caps, SvType};
pub use magic::{
    EnvElement, Environment, Magic, MagicKind, MagicVtable, ProcessEnvironment, RestrictedMagic,
    TaintMagic, TaintState,
};
pub use sv::{Sv, WeakSv};
