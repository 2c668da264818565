//! Opal MRO - packages and method resolution order for the Opal runtime.
//!
//! Packages live in a [`PackageTable`], itself a hash table of stashes.
//! [`MroCache`] linearizes the inheritance graph on demand, keeps the
//! result until a parent list changes, and caches method lookups against
//! two generation counters.
//!
//! # Invalidation
//!
//! Changing a package's parents drops its cached orders and those of
//! every package inheriting from it, found through a reverse index of
//! direct children. Defining or removing any method bumps the global
//! method generation, which retires every cached method lookup at once.

mod cache;
mod linearization;
mod method;
mod package;

pub use cache::{CacheState, MroCache, MroConfig, ReverseIndexPolicy, DEFAULT_RECURSION_LIMIT};
pub use linearization::{Linearization, MroAlgorithm, UNIVERSAL};
pub use method::ResolvedMethod;
pub use package::{PackageTable, ISA};
