//! Shared (interned) keys.
//!
//! A [`KeyTable`] is a hash table whose value slot counts the users of each
//! key. Tables built with shared keys intern every key they store and
//! release it when the entry goes away, so all of them hold the same
//! `HashKey` allocation for the same name and can compare by identity.
//!
//! Interning is instance-local by default: the key table sits behind a
//! `RefCell` and needs no locking. Process-wide interning puts one table
//! behind a `parking_lot::Mutex`, locked only for a single lookup-or-insert
//! or decrement-or-remove.

#![expect(
    clippy::disallowed_types,
    reason = "SharedKeys is the owning handle for key tables"
)]

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::table::Unshared;
use crate::{seed_from_env, DeleteMode, HashError, HashKey, HashTable, KeyHasher, KeyRef, KeySource};

/// Default interning mode for runtimes that do not choose one.
static PROCESS_WIDE: AtomicBool = AtomicBool::new(false);

/// The process-wide key table, created on first use.
static PROCESS_TABLE: OnceLock<Arc<Mutex<KeyTable>>> = OnceLock::new();

/// Make process-wide interning the default for new runtimes.
pub fn set_process_wide_interning(enabled: bool) {
    PROCESS_WIDE.store(enabled, Ordering::Relaxed);
}

pub fn process_wide_interning() -> bool {
    PROCESS_WIDE.load(Ordering::Relaxed)
}

/// Where a runtime's interned keys live.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InterningMode {
    /// One table per runtime instance, no locking.
    InstanceLocal,
    /// One mutex-guarded table for the whole process.
    ProcessWide,
}

impl Default for InterningMode {
    /// Follows [`set_process_wide_interning`].
    fn default() -> Self {
        if process_wide_interning() {
            InterningMode::ProcessWide
        } else {
            InterningMode::InstanceLocal
        }
    }
}

/// Reference-counted key table.
pub struct KeyTable {
    table: HashTable<usize, Unshared>,
}

impl KeyTable {
    pub fn new(hasher: KeyHasher) -> Self {
        KeyTable {
            table: HashTable::for_key_table(hasher),
        }
    }

    pub fn hasher(&self) -> KeyHasher {
        self.table.hasher()
    }

    /// Distinct keys held.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Shared handle for `key`, adding one user.
    pub fn intern(&mut self, key: &KeyRef<'_>) -> Result<HashKey, HashError> {
        if let Some((stored, count)) = self.table.entry_mut(key.clone()) {
            *count += 1;
            return Ok(stored.clone());
        }
        self.table.insert_absent(key, 1)
    }

    /// Drop one user of `key`; the key leaves the table with its last user.
    /// Returns false if the key was not interned here.
    pub fn release(&mut self, key: &HashKey) -> bool {
        let remaining = match self.table.fetch_mut(key) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => {
                tracing::debug!(key = %key, "release of a key that is not interned");
                return false;
            }
        };
        if remaining == 0 {
            if let Err(err) = self.table.delete(key, DeleteMode::Discard) {
                tracing::warn!(key = %key, %err, "could not drop released key");
            }
        }
        true
    }

    /// Users of `key`, zero if absent.
    pub fn refcount<'k>(&self, key: impl Into<KeyRef<'k>>) -> usize {
        self.table.fetch(key).copied().unwrap_or(0)
    }
}

impl fmt::Debug for KeyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyTable")
            .field("keys", &self.table.len())
            .field("buckets", &self.table.bucket_count())
            .finish()
    }
}

/// Handle to a key table, cloned into every table that shares keys.
#[derive(Clone)]
pub enum SharedKeys {
    Local(Rc<RefCell<KeyTable>>),
    ProcessWide(Arc<Mutex<KeyTable>>),
}

impl SharedKeys {
    /// A fresh instance-local table.
    pub fn local(hasher: KeyHasher) -> Self {
        SharedKeys::Local(Rc::new(RefCell::new(KeyTable::new(hasher))))
    }

    /// The process-wide table. Its seed is fixed by the first caller: the
    /// `OPAL_HASH_SEED` environment variable, or the default.
    pub fn process_wide() -> Self {
        let table = PROCESS_TABLE.get_or_init(|| {
            let hasher = seed_from_env().map_or_else(KeyHasher::default, KeyHasher::from_seed);
            tracing::debug!(seed = hasher.seed(), "creating process-wide key table");
            Arc::new(Mutex::new(KeyTable::new(hasher)))
        });
        SharedKeys::ProcessWide(Arc::clone(table))
    }

    /// Key table for `mode`. `hasher` only seeds an instance-local table.
    pub fn for_mode(mode: InterningMode, hasher: KeyHasher) -> Self {
        match mode {
            InterningMode::InstanceLocal => SharedKeys::local(hasher),
            InterningMode::ProcessWide => SharedKeys::process_wide(),
        }
    }

    pub fn mode(&self) -> InterningMode {
        match self {
            SharedKeys::Local(_) => InterningMode::InstanceLocal,
            SharedKeys::ProcessWide(_) => InterningMode::ProcessWide,
        }
    }

    /// Run `f` with the table borrowed or locked. Never call back into
    /// user code from `f`.
    fn with<R>(&self, f: impl FnOnce(&mut KeyTable) -> R) -> R {
        match self {
            SharedKeys::Local(table) => f(&mut table.borrow_mut()),
            SharedKeys::ProcessWide(table) => f(&mut table.lock()),
        }
    }

    pub fn intern_key<'k>(&self, key: impl Into<KeyRef<'k>>) -> Result<HashKey, HashError> {
        let key = key.into();
        self.with(|table| table.intern(&key))
    }

    pub fn refcount<'k>(&self, key: impl Into<KeyRef<'k>>) -> usize {
        let key = key.into();
        self.with(|table| table.refcount(key))
    }

    pub fn len(&self) -> usize {
        self.with(|table| table.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Same underlying table.
    pub fn ptr_eq(&self, other: &SharedKeys) -> bool {
        match (self, other) {
            (SharedKeys::Local(a), SharedKeys::Local(b)) => Rc::ptr_eq(a, b),
            (SharedKeys::ProcessWide(a), SharedKeys::ProcessWide(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl KeySource for SharedKeys {
    fn hasher(&self) -> KeyHasher {
        self.with(|table| table.hasher())
    }

    fn intern(&self, key: &KeyRef<'_>) -> Result<HashKey, HashError> {
        self.with(|table| table.intern(key))
    }

    fn release(&self, key: &HashKey) {
        self.with(|table| table.release(key));
    }
}

impl fmt::Debug for SharedKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKeys")
            .field("mode", &self.mode())
            .field("keys", &self.len())
            .finish()
    }
}
