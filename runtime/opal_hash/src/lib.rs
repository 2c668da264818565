//! Opal Hash - the associative-array engine of the Opal runtime.
//!
//! One engine serves two masters: user-level maps, and the runtime's own
//! namespaces (package stashes, the table of packages, lexical names).
//!
//! # Architecture
//!
//! - [`HashTable`]: open-chained table, power-of-two bucket array, growth by
//!   splitting each chain on one new hash bit
//! - [`HashKey`]: immutable key bytes with a precomputed hash and encoding flags
//! - [`KeyTable`] / [`SharedKeys`]: reference-counted interned keys, so names
//!   compare by pointer identity
//! - [`KeyHasher`]: seeded one-at-a-time hash
//!
//! # Restricted tables
//!
//! A restricted table has a fixed key set. Deleting turns the entry into a
//! placeholder that lookups skip but that still reserves the key, and
//! storing a key outside the set fails with [`HashError::AccessDenied`].

mod error;
mod hasher;
mod key;
mod shared;
mod table;

pub use error::{AccessReason, HashError};
pub use hasher::{seed_from_env, KeyHasher, HASH_SEED_ENV};
pub use key::{HashKey, KeyFlags, KeyRef};
pub use shared::{
    process_wide_interning, set_process_wide_interning, InterningMode, KeyTable, SharedKeys,
};
pub use table::{
    DeleteMode, HashTable, Iter, IterFlags, KeySource, KeyState, TableFlags, TableValue,
};
