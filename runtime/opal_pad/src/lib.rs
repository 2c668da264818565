//! Opal Pad - lexical variable storage for the Opal runtime.
//!
//! A compiled unit owns a list of names; every activation of the unit
//! owns one cell per name. Names are scoped by a compile sequence clock
//! rather than by a tree of scopes, so "is `$x` visible here" is a range
//! check on two numbers.
//!
//! # Architecture
//!
//! - [`PadArena`]: units, activations, and the sequence clock
//! - [`PadName`] / [`PadNames`]: slot metadata shared by a unit's pads
//! - [`Pad`]: the cells of one activation
//!
//! Compile-time operations (declaring, scoping, capturing) live in
//! `compile`; run-time ones (cloning, recursion, sweeping) in
//! `activation`.

mod activation;
mod arena;
mod compile;
mod dump;
mod name;
mod pad;

pub use arena::{Activation, PadArena, Unit};
pub use compile::ScopeMark;
pub use name::{Declarator, PadName, PadNameFlags, Sigil, Slot};
pub use pad::{Pad, PadNames};
