//! The hash table engine.
//!
//! Entries live in an arena and are chained through indices; the bucket
//! array holds chain heads. Arena indices are stable for the life of an
//! entry, which is what lets the built-in cursor survive deletion of the
//! entry it points at.
//!
//! # Growth
//!
//! When the number of keys exceeds the number of buckets, the bucket array
//! doubles and every chain is split on the one hash bit that became
//! significant. Entries keep their relative order within a chain.
//!
//! # Iteration
//!
//! The table carries one built-in cursor ([`HashTable::iter_init`] /
//! [`HashTable::iter_next`]). Deleting the entry under the cursor is legal:
//! the entry is unlinked at once but freed only on the next `iter_next`.
//! For plain read-only traversal use [`HashTable::iter`].

use std::fmt;
use std::mem;

use bitflags::bitflags;

use crate::{AccessReason, HashError, HashKey, KeyFlags, KeyHasher, KeyRef, SharedKeys};

/// Bucket count of a fresh table.
const DEFAULT_BUCKETS: usize = 8;

/// Longest chain tolerated before a table abandons the shared seed.
const MAX_CHAIN_BEFORE_REHASH: usize = 14;

type EntryIdx = usize;

/// Values stored in a table.
///
/// Only restricted tables care: a read-only value may not be deleted or
/// cleared out of one.
pub trait TableValue {
    fn is_read_only(&self) -> bool {
        false
    }
}

macro_rules! plain_table_values {
    ($($ty:ty),* $(,)?) => {
        $(impl TableValue for $ty {})*
    };
}

plain_table_values!(bool, i32, i64, u32, u64, usize, f64, String, &'static str, ());

/// Where a table gets its keys from.
///
/// A table either makes private keys, or interns every key through a
/// [`KeySource`] and releases it when the entry goes away.
pub trait KeySource {
    /// Hasher the source hashes with; a sharing table must agree with it.
    fn hasher(&self) -> KeyHasher;
    fn intern(&self, key: &KeyRef<'_>) -> Result<HashKey, HashError>;
    fn release(&self, key: &HashKey);
}

/// Key source of the key table itself. Uninhabited: the key table never
/// shares its keys with anything.
#[derive(Debug)]
pub(crate) enum Unshared {}

impl KeySource for Unshared {
    fn hasher(&self) -> KeyHasher {
        match *self {}
    }

    fn intern(&self, _key: &KeyRef<'_>) -> Result<HashKey, HashError> {
        match *self {}
    }

    fn release(&self, _key: &HashKey) {
        match *self {}
    }
}

bitflags! {
    /// Table state flags.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct TableFlags: u8 {
        /// Key set is fixed; deletes leave placeholders.
        const RESTRICTED = 1 << 0;
        /// Switched to a private random seed after a pathological split.
        const REHASHED = 1 << 1;
        /// Keys are interned through a shared key table.
        const SHARED_KEYS = 1 << 2;
        /// This table is itself a key table; it is never rehashed.
        const KEY_TABLE = 1 << 3;
        /// Keys handed out must keep their hashes; never rehashed.
        const PINNED_SEED = 1 << 4;
    }
}

bitflags! {
    /// Options for [`HashTable::iter_next`].
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct IterFlags: u8 {
        /// Also yield placeholder entries.
        const WANT_PLACEHOLDERS = 1 << 0;
    }
}

/// Whether [`HashTable::delete`] hands back the removed value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeleteMode {
    Return,
    Discard,
}

/// What a table knows about a key.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyState {
    Absent,
    /// Reserved by a restricted table but holding no value.
    Placeholder,
    Live,
}

enum Slot<V> {
    Value(V),
    Placeholder,
    /// Arena slot on the free list.
    Vacant,
}

struct Entry<V> {
    key: HashKey,
    slot: Slot<V>,
    next: Option<EntryIdx>,
}

/// A successful chain walk: the entry plus what links to it.
#[derive(Copy, Clone)]
struct Found {
    bucket: usize,
    prev: Option<EntryIdx>,
    idx: EntryIdx,
}

#[derive(Copy, Clone, Default)]
struct Cursor {
    /// `None` before the first step and after exhaustion.
    bucket: Option<usize>,
    current: Option<EntryIdx>,
    /// `current` was deleted and awaits freeing.
    lazy_delete: bool,
}

/// Open-chained hash table keyed by byte strings.
pub struct HashTable<V, S: KeySource = SharedKeys> {
    buckets: Vec<Option<EntryIdx>>,
    entries: Vec<Entry<V>>,
    free: Vec<EntryIdx>,
    /// Keys in chains, placeholders included.
    total_keys: usize,
    placeholders: usize,
    flags: TableFlags,
    hasher: KeyHasher,
    shared: Option<S>,
    cursor: Cursor,
    /// Key held by vacant arena slots.
    vacant_key: HashKey,
}

impl<V> HashTable<V> {
    /// Table with private keys and the default seed.
    pub fn new() -> Self {
        Self::with_hasher(KeyHasher::default())
    }

    /// Table whose keys are interned in `shared`.
    pub fn with_shared_keys(shared: SharedKeys) -> Self {
        let mut table = Self::with_hasher(shared.hasher());
        table.shared = Some(shared);
        table.flags.insert(TableFlags::SHARED_KEYS);
        table
    }
}

impl<V> Default for HashTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, S: KeySource> HashTable<V, S> {
    /// Table with private keys hashed by `hasher`.
    pub fn with_hasher(hasher: KeyHasher) -> Self {
        HashTable {
            buckets: vec![None; DEFAULT_BUCKETS],
            entries: Vec::new(),
            free: Vec::new(),
            total_keys: 0,
            placeholders: 0,
            flags: TableFlags::empty(),
            hasher,
            shared: None,
            cursor: Cursor::default(),
            vacant_key: HashKey::from_parts(Vec::new(), 0, KeyFlags::empty()),
        }
    }

    pub(crate) fn for_key_table(hasher: KeyHasher) -> Self {
        let mut table = Self::with_hasher(hasher);
        table.flags.insert(TableFlags::KEY_TABLE);
        table
    }

    /// Live keys (placeholders excluded).
    pub fn len(&self) -> usize {
        self.total_keys - self.placeholders
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys including placeholders.
    pub fn total_keys(&self) -> usize {
        self.total_keys
    }

    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn flags(&self) -> TableFlags {
        self.flags
    }

    pub fn hasher(&self) -> KeyHasher {
        self.hasher
    }

    pub fn shared_keys(&self) -> Option<&S> {
        self.shared.as_ref()
    }

    pub fn is_restricted(&self) -> bool {
        self.flags.contains(TableFlags::RESTRICTED)
    }

    /// Fix the key set: from now on deletes leave placeholders and new
    /// keys are refused.
    pub fn restrict(&mut self) {
        self.flags.insert(TableFlags::RESTRICTED);
    }

    /// Keep the current seed for good. Keys already handed out, and keys
    /// built from [`HashTable::hasher`], stay comparable with the stored
    /// ones; long chains are tolerated instead.
    pub fn pin_seed(&mut self) {
        self.flags.insert(TableFlags::PINNED_SEED);
    }

    /// Lift the restriction. Placeholders stay until cleared or until the
    /// next split.
    pub fn unrestrict(&mut self) {
        self.flags.remove(TableFlags::RESTRICTED);
    }

    /// Number of non-empty buckets.
    pub fn fill(&self) -> usize {
        self.buckets.iter().filter(|head| head.is_some()).count()
    }

    pub fn longest_chain(&self) -> usize {
        (0..self.buckets.len())
            .map(|bucket| self.chain_len(bucket))
            .max()
            .unwrap_or(0)
    }

    fn chain_len(&self, bucket: usize) -> usize {
        let mut len = 0;
        let mut cur = self.buckets[bucket];
        while let Some(idx) = cur {
            len += 1;
            cur = self.entries[idx].next;
        }
        len
    }

    #[inline]
    fn bucket_of(&self, hash: u32) -> usize {
        hash as usize & (self.buckets.len() - 1)
    }

    fn locate(&self, key: &KeyRef<'_>) -> (u32, Option<Found>) {
        let hash = self.hasher.hash(key.as_bytes());
        let bucket = self.bucket_of(hash);
        let mut prev = None;
        let mut cur = self.buckets[bucket];
        while let Some(idx) = cur {
            let entry = &self.entries[idx];
            let same = match key.origin() {
                Some(origin) if origin.ptr_eq(&entry.key) => true,
                _ => entry.key.matches(hash, key.as_bytes(), key.flags()),
            };
            if same {
                return (hash, Some(Found { bucket, prev, idx }));
            }
            prev = cur;
            cur = entry.next;
        }
        (hash, None)
    }

    /// Value for `key`. Placeholders are invisible.
    pub fn fetch<'k>(&self, key: impl Into<KeyRef<'k>>) -> Option<&V> {
        let (_, found) = self.locate(&key.into());
        match &self.entries[found?.idx].slot {
            Slot::Value(value) => Some(value),
            Slot::Placeholder | Slot::Vacant => None,
        }
    }

    pub fn fetch_mut<'k>(&mut self, key: impl Into<KeyRef<'k>>) -> Option<&mut V> {
        let (_, found) = self.locate(&key.into());
        match &mut self.entries[found?.idx].slot {
            Slot::Value(value) => Some(value),
            Slot::Placeholder | Slot::Vacant => None,
        }
    }

    /// The stored key equal to `key`, placeholders included.
    pub fn stored_key<'k>(&self, key: impl Into<KeyRef<'k>>) -> Option<&HashKey> {
        let (_, found) = self.locate(&key.into());
        Some(&self.entries[found?.idx].key)
    }

    /// Stored key and live value for `key`.
    pub(crate) fn entry_mut<'k>(&mut self, key: impl Into<KeyRef<'k>>) -> Option<(&HashKey, &mut V)> {
        let (_, found) = self.locate(&key.into());
        let entry = &mut self.entries[found?.idx];
        match &mut entry.slot {
            Slot::Value(value) => Some((&entry.key, value)),
            Slot::Placeholder | Slot::Vacant => None,
        }
    }

    /// Live value for `key`, created with `make` when absent. A placeholder
    /// is reactivated. A restricted table refuses keys outside its set.
    pub fn fetch_or_insert_with<'k>(
        &mut self,
        key: impl Into<KeyRef<'k>>,
        make: impl FnOnce() -> V,
    ) -> Result<&mut V, HashError> {
        let key = key.into();
        let (hash, found) = self.locate(&key);
        let idx = match found {
            Some(found) => {
                let slot = &mut self.entries[found.idx].slot;
                if matches!(slot, Slot::Placeholder) {
                    *slot = Slot::Value(make());
                    self.placeholders -= 1;
                }
                found.idx
            }
            None => {
                if self.is_restricted() {
                    return Err(HashError::denied(key.as_bytes(), AccessReason::DisallowedKey));
                }
                self.insert_new(hash, &key, make())?
            }
        };
        match &mut self.entries[idx].slot {
            Slot::Value(value) => Ok(value),
            Slot::Placeholder | Slot::Vacant => unreachable!("entry {idx} was just filled"),
        }
    }

    /// Store `value` under `key`, returning the value it replaced.
    pub fn store<'k>(
        &mut self,
        key: impl Into<KeyRef<'k>>,
        value: V,
    ) -> Result<Option<V>, HashError> {
        let key = key.into();
        let (hash, found) = self.locate(&key);
        if let Some(found) = found {
            let old = mem::replace(&mut self.entries[found.idx].slot, Slot::Value(value));
            return Ok(match old {
                Slot::Value(old) => Some(old),
                Slot::Placeholder | Slot::Vacant => {
                    self.placeholders -= 1;
                    None
                }
            });
        }
        if self.is_restricted() {
            return Err(HashError::denied(key.as_bytes(), AccessReason::DisallowedKey));
        }
        self.insert_new(hash, &key, value)?;
        Ok(None)
    }

    /// Insert a key known to be absent. Returns its arena index.
    fn insert_new(&mut self, hash: u32, key: &KeyRef<'_>, value: V) -> Result<EntryIdx, HashError> {
        let key = match &self.shared {
            Some(shared) => shared.intern(key)?,
            None => key.to_key_hashed(hash),
        };
        let bucket = self.bucket_of(hash);
        let entry = Entry {
            key,
            slot: Slot::Value(value),
            next: self.buckets[bucket],
        };
        let idx = self.alloc(entry);
        self.buckets[bucket] = Some(idx);
        self.total_keys += 1;

        if self.total_keys > self.buckets.len() {
            self.split()?;
        } else if self.may_rehash() && self.chain_len(bucket) > MAX_CHAIN_BEFORE_REHASH {
            self.split()?;
        }
        Ok(idx)
    }

    /// Insert a key the caller has checked is absent, returning the stored
    /// key.
    pub(crate) fn insert_absent(&mut self, key: &KeyRef<'_>, value: V) -> Result<HashKey, HashError> {
        let hash = self.hasher.hash(key.as_bytes());
        let idx = self.insert_new(hash, key, value)?;
        Ok(self.entries[idx].key.clone())
    }

    fn alloc(&mut self, entry: Entry<V>) -> EntryIdx {
        if let Some(idx) = self.free.pop() {
            self.entries[idx] = entry;
            idx
        } else {
            self.entries.push(entry);
            self.entries.len() - 1
        }
    }

    /// Return an arena slot to the free list, releasing its key.
    fn free_entry(&mut self, idx: EntryIdx) {
        let vacant = Entry {
            key: self.vacant_key.clone(),
            slot: Slot::Vacant,
            next: None,
        };
        let entry = mem::replace(&mut self.entries[idx], vacant);
        if let Some(shared) = &self.shared {
            shared.release(&entry.key);
        }
        self.free.push(idx);
    }

    /// Take an entry out of its chain.
    fn unlink(&mut self, found: Found) {
        let next = self.entries[found.idx].next;
        match found.prev {
            Some(prev) => self.entries[prev].next = next,
            None => self.buckets[found.bucket] = next,
        }
        // A lazily deleted entry still points into the chain.
        if self.cursor.lazy_delete {
            if let Some(lazy) = self.cursor.current {
                if lazy != found.idx && self.entries[lazy].next == Some(found.idx) {
                    self.entries[lazy].next = next;
                }
            }
        }
    }

    /// Free an unlinked entry, or defer it if the cursor is on it.
    fn retire(&mut self, idx: EntryIdx) {
        if self.cursor.current == Some(idx) {
            self.cursor.lazy_delete = true;
        } else {
            self.free_entry(idx);
        }
    }

    /// Whether `key` holds a value. Placeholders do not count.
    pub fn exists<'k>(&self, key: impl Into<KeyRef<'k>>) -> bool {
        self.entry_state(key) == KeyState::Live
    }

    pub fn entry_state<'k>(&self, key: impl Into<KeyRef<'k>>) -> KeyState {
        let (_, found) = self.locate(&key.into());
        match found.map(|found| &self.entries[found.idx].slot) {
            Some(Slot::Value(_)) => KeyState::Live,
            Some(Slot::Placeholder) => KeyState::Placeholder,
            Some(Slot::Vacant) | None => KeyState::Absent,
        }
    }

    /// Delete `key`.
    ///
    /// On a restricted table the entry becomes a placeholder; deleting a
    /// key outside the set, or one whose value is read-only, is refused.
    /// Deleting a placeholder does nothing.
    pub fn delete<'k>(
        &mut self,
        key: impl Into<KeyRef<'k>>,
        mode: DeleteMode,
    ) -> Result<Option<V>, HashError>
    where
        V: TableValue,
    {
        let key = key.into();
        let (_, found) = self.locate(&key);
        let Some(found) = found else {
            if self.is_restricted() {
                return Err(HashError::denied(key.as_bytes(), AccessReason::DeleteDisallowed));
            }
            return Ok(None);
        };

        let read_only = match &self.entries[found.idx].slot {
            Slot::Value(value) => value.is_read_only(),
            Slot::Placeholder | Slot::Vacant => return Ok(None),
        };
        let old = if self.is_restricted() {
            if read_only {
                return Err(HashError::denied(key.as_bytes(), AccessReason::DeleteReadonly));
            }
            self.placeholders += 1;
            mem::replace(&mut self.entries[found.idx].slot, Slot::Placeholder)
        } else {
            self.unlink(found);
            self.total_keys -= 1;
            let old = mem::replace(&mut self.entries[found.idx].slot, Slot::Placeholder);
            self.retire(found.idx);
            old
        };
        match (old, mode) {
            (Slot::Value(value), DeleteMode::Return) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Remove every placeholder.
    pub fn clear_placeholders(&mut self) {
        if self.placeholders == 0 {
            return;
        }
        let mut removed = 0;
        for bucket in 0..self.buckets.len() {
            let mut prev = None;
            let mut cur = self.buckets[bucket];
            while let Some(idx) = cur {
                cur = self.entries[idx].next;
                if matches!(self.entries[idx].slot, Slot::Placeholder) {
                    self.unlink(Found { bucket, prev, idx });
                    self.retire(idx);
                    removed += 1;
                } else {
                    prev = Some(idx);
                }
            }
        }
        self.total_keys -= removed;
        self.placeholders -= removed;
        tracing::trace!(removed, "cleared placeholders");
    }

    /// Empty the table.
    ///
    /// A restricted table keeps its key set: every value becomes a
    /// placeholder, and the clear is refused if any value is read-only.
    pub fn clear(&mut self) -> Result<(), HashError>
    where
        V: TableValue,
    {
        if self.is_restricted() {
            for (key, value) in self.iter() {
                if value.is_read_only() {
                    return Err(HashError::denied(key.as_bytes(), AccessReason::ClearReadonly));
                }
            }
            for idx in self.chained() {
                self.entries[idx].slot = Slot::Placeholder;
            }
            self.placeholders = self.total_keys;
            return Ok(());
        }

        let entries = mem::take(&mut self.entries);
        self.free.clear();
        self.buckets.fill(None);
        self.total_keys = 0;
        self.placeholders = 0;
        self.cursor = Cursor::default();
        if let Some(shared) = &self.shared {
            for entry in &entries {
                if !matches!(entry.slot, Slot::Vacant) {
                    shared.release(&entry.key);
                }
            }
        }
        drop(entries);
        Ok(())
    }

    /// Presize for `expected` keys. Never shrinks.
    pub fn resize_hint(&mut self, expected: usize) -> Result<(), HashError> {
        let Some(wanted) = expected.checked_next_power_of_two() else {
            return Err(HashError::OutOfMemory {
                requested_buckets: usize::MAX,
            });
        };
        if wanted <= self.buckets.len() {
            return Ok(());
        }
        self.rebucket(wanted)
    }

    /// Indices of every chained entry, bucket order.
    fn chained(&self) -> Vec<EntryIdx> {
        let mut out = Vec::with_capacity(self.total_keys);
        for &head in &self.buckets {
            let mut cur = head;
            while let Some(idx) = cur {
                out.push(idx);
                cur = self.entries[idx].next;
            }
        }
        out
    }

    fn grow_buckets(&mut self, size: usize) -> Result<(), HashError> {
        let additional = size.saturating_sub(self.buckets.len());
        if self.buckets.try_reserve_exact(additional).is_err() {
            tracing::error!(requested_buckets = size, "bucket array allocation failed");
            return Err(HashError::OutOfMemory {
                requested_buckets: size,
            });
        }
        self.buckets.resize(size, None);
        Ok(())
    }

    /// Relink every chained entry into a bucket array of `size`.
    fn rebucket(&mut self, size: usize) -> Result<(), HashError> {
        let chained = self.chained();
        self.grow_buckets(size)?;
        self.buckets.fill(None);
        for idx in chained.into_iter().rev() {
            let bucket = self.bucket_of(self.entries[idx].key.hash_value());
            self.entries[idx].next = self.buckets[bucket];
            self.buckets[bucket] = Some(idx);
        }
        Ok(())
    }

    /// Double the bucket array, splitting each chain on the new hash bit.
    #[tracing::instrument(level = "trace", skip_all, fields(buckets = self.buckets.len(), keys = self.total_keys))]
    fn split(&mut self) -> Result<(), HashError> {
        if self.placeholders > 0 && !self.is_restricted() {
            self.clear_placeholders();
        }
        let old = self.buckets.len();
        let Some(new) = old.checked_mul(2) else {
            return Err(HashError::OutOfMemory {
                requested_buckets: usize::MAX,
            });
        };
        self.grow_buckets(new)?;

        for low in 0..old {
            let high = low + old;
            let mut cur = self.buckets[low].take();
            let mut low_tail: Option<EntryIdx> = None;
            let mut high_tail: Option<EntryIdx> = None;
            while let Some(idx) = cur {
                cur = self.entries[idx].next.take();
                let moves = (self.entries[idx].key.hash_value() as usize & old) != 0;
                let (target, tail) = if moves {
                    (high, &mut high_tail)
                } else {
                    (low, &mut low_tail)
                };
                match *tail {
                    Some(last) => self.entries[last].next = Some(idx),
                    None => self.buckets[target] = Some(idx),
                }
                *tail = Some(idx);
            }
        }

        if self.may_rehash() {
            let longest = self.longest_chain();
            if longest > MAX_CHAIN_BEFORE_REHASH {
                self.rehash_with_random_seed(longest)?;
            }
        }
        Ok(())
    }

    fn may_rehash(&self) -> bool {
        !self
            .flags
            .intersects(TableFlags::REHASHED | TableFlags::KEY_TABLE | TableFlags::PINNED_SEED)
    }

    /// Switch to a private random seed and rebucket everything. Shared keys
    /// are given up since their hashes belong to the shared seed.
    fn rehash_with_random_seed(&mut self, longest: usize) -> Result<(), HashError> {
        tracing::debug!(longest, buckets = self.buckets.len(), "pathological chain; rehashing");
        let hasher = KeyHasher::random();
        let shared = self.shared.take();
        for entry in &mut self.entries {
            if matches!(entry.slot, Slot::Vacant) {
                continue;
            }
            let bytes = entry.key.as_bytes();
            let private = HashKey::from_parts(bytes.to_vec(), hasher.hash(bytes), entry.key.flags());
            let old = mem::replace(&mut entry.key, private);
            if let Some(shared) = &shared {
                shared.release(&old);
            }
        }
        self.hasher = hasher;
        self.flags.remove(TableFlags::SHARED_KEYS);
        self.flags.insert(TableFlags::REHASHED);
        self.rebucket(self.buckets.len())
    }

    /// Reset the built-in cursor. Returns the number of live keys.
    pub fn iter_init(&mut self) -> usize {
        self.finish_lazy_delete();
        self.cursor = Cursor::default();
        self.len()
    }

    fn finish_lazy_delete(&mut self) {
        if self.cursor.lazy_delete {
            self.cursor.lazy_delete = false;
            if let Some(idx) = self.cursor.current.take() {
                self.free_entry(idx);
            }
        }
    }

    /// Advance the built-in cursor, returning the next key. After the last
    /// key it returns `None` and rewinds.
    pub fn iter_next(&mut self, flags: IterFlags) -> Option<HashKey> {
        let mut cur = self.cursor.current.and_then(|idx| self.entries[idx].next);
        self.finish_lazy_delete();
        self.cursor.current = None;

        loop {
            while cur.is_none() {
                let bucket = self.cursor.bucket.map_or(0, |bucket| bucket + 1);
                if bucket >= self.buckets.len() {
                    self.cursor = Cursor::default();
                    return None;
                }
                self.cursor.bucket = Some(bucket);
                cur = self.buckets[bucket];
            }
            let idx = cur?;
            let entry = &self.entries[idx];
            if matches!(entry.slot, Slot::Placeholder)
                && !flags.contains(IterFlags::WANT_PLACEHOLDERS)
            {
                cur = entry.next;
                continue;
            }
            let key = entry.key.clone();
            self.cursor.current = Some(idx);
            return Some(key);
        }
    }

    /// Value under the cursor, if it is live.
    pub fn iter_value(&self) -> Option<&V> {
        if self.cursor.lazy_delete {
            return None;
        }
        match &self.entries[self.cursor.current?].slot {
            Slot::Value(value) => Some(value),
            Slot::Placeholder | Slot::Vacant => None,
        }
    }

    /// Borrowing iterator over live entries in bucket order.
    pub fn iter(&self) -> Iter<'_, V, S> {
        Iter {
            table: self,
            bucket: 0,
            next: self.buckets.first().copied().flatten(),
        }
    }

    /// Live keys in bucket order.
    pub fn keys(&self) -> impl Iterator<Item = &HashKey> {
        self.iter().map(|(key, _)| key)
    }
}

impl<V, S: KeySource> Drop for HashTable<V, S> {
    fn drop(&mut self) {
        if let Some(shared) = &self.shared {
            for entry in &self.entries {
                if !matches!(entry.slot, Slot::Vacant) {
                    shared.release(&entry.key);
                }
            }
        }
    }
}

impl<V: fmt::Debug, S: KeySource> fmt::Debug for HashTable<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator returned by [`HashTable::iter`].
pub struct Iter<'a, V, S: KeySource = SharedKeys> {
    table: &'a HashTable<V, S>,
    bucket: usize,
    next: Option<EntryIdx>,
}

impl<'a, V, S: KeySource> Iterator for Iter<'a, V, S> {
    type Item = (&'a HashKey, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            while self.next.is_none() {
                self.bucket += 1;
                self.next = *self.table.buckets.get(self.bucket)?;
            }
            let entry = &self.table.entries[self.next?];
            self.next = entry.next;
            if let Slot::Value(value) = &entry.slot {
                return Some((&entry.key, value));
            }
        }
    }
}

impl<'a, V, S: KeySource> IntoIterator for &'a HashTable<V, S> {
    type Item = (&'a HashKey, &'a V);
    type IntoIter = Iter<'a, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
