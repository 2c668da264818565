//! The table of packages.
//!
//! Each package has a stash: a hash cell mapping names to the things the
//! package defines. `ISA` holds an array of parent package names; every
//! other entry that holds a code cell is a method.

use opal_diagnostic::NullSink;
use opal_hash::{HashKey, HashTable, KeyHasher, KeyRef, SharedKeys};
use opal_value::{RuntimeError, RuntimeResult, Sv, SvType};

/// Stash entry holding the parent list.
pub const ISA: &str = "ISA";

/// Package name to stash, with keys interned in the instance key table.
pub struct PackageTable {
    stashes: HashTable<Sv>,
    keys: SharedKeys,
}

impl PackageTable {
    /// The seed is pinned: the MRO cache keeps package keys across calls,
    /// and they must keep matching the table's.
    pub fn new(keys: SharedKeys) -> Self {
        let mut stashes = HashTable::with_shared_keys(keys.clone());
        stashes.pin_seed();
        PackageTable { stashes, keys }
    }

    pub fn hasher(&self) -> KeyHasher {
        self.stashes.hasher()
    }

    pub fn len(&self) -> usize {
        self.stashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stashes.is_empty()
    }

    pub fn contains<'k>(&self, name: impl Into<KeyRef<'k>>) -> bool {
        self.stashes.exists(name)
    }

    /// Stash of `name`, created empty if the package is new.
    pub fn define(&mut self, name: &str) -> RuntimeResult<Sv> {
        let keys = self.keys.clone();
        let stash = self
            .stashes
            .fetch_or_insert_with(name, || Sv::hash(HashTable::with_shared_keys(keys)))?
            .clone();
        Ok(stash)
    }

    pub fn stash<'k>(&self, name: impl Into<KeyRef<'k>>) -> Option<Sv> {
        self.stashes.fetch(name).cloned()
    }

    /// Interned name of a defined package.
    pub fn key<'k>(&self, name: impl Into<KeyRef<'k>>) -> Option<HashKey> {
        self.stashes.stored_key(name).cloned()
    }

    /// A key for `name` to look packages up by, whether or not it is
    /// defined.
    pub fn lookup_key(&self, name: &str) -> HashKey {
        self.key(name)
            .unwrap_or_else(|| HashKey::new(name, self.stashes.hasher()))
    }

    /// Names of every defined package.
    pub fn names(&self) -> Vec<HashKey> {
        self.stashes.keys().cloned().collect()
    }

    /// Direct parents of `name`, in order. A package without a stash or
    /// without an `ISA` entry has none.
    pub fn parents(&self, name: &HashKey) -> RuntimeResult<Vec<HashKey>> {
        let Some(isa) = self.stash(name).map(|stash| stash.hash_fetch(ISA)).transpose()? else {
            return Ok(Vec::new());
        };
        let Some(isa) = isa.filter(|isa| isa.kind() == SvType::Array) else {
            return Ok(Vec::new());
        };
        isa.array_items()?
            .iter()
            .map(|parent| {
                let bytes = parent.get_as_bytes(&NullSink, None)?;
                Ok(HashKey::new(bytes.as_slice(), self.stashes.hasher()))
            })
            .collect()
    }

    /// Replace the `ISA` of `name`, defining the package if needed.
    pub fn write_parents(&mut self, name: &str, parents: &[&str]) -> RuntimeResult<()> {
        let stash = self.define(name)?;
        let isa = match stash.hash_fetch(ISA)? {
            Some(isa) if isa.kind() == SvType::Array => isa,
            Some(_) => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "an ISA array",
                    got: "a scalar",
                })
            }
            None => {
                let isa = Sv::array(Vec::new());
                stash.hash_store(ISA, isa.clone())?;
                isa
            }
        };
        isa.array_assign(parents.iter().copied().map(Sv::string).collect())
    }

    /// Code cell `package` defines under `method`, ignoring inherited ones.
    pub fn own_method(&self, package: &HashKey, method: &str) -> RuntimeResult<Option<Sv>> {
        if method == ISA {
            return Ok(None);
        }
        let Some(stash) = self.stash(package) else {
            return Ok(None);
        };
        Ok(stash
            .hash_fetch(method)?
            .filter(|entry| entry.kind() == SvType::Code))
    }

    /// Store `code` as `method` of `package`, returning what it replaced.
    pub(crate) fn store_method(&mut self, package: &str, method: &str, code: Sv) -> RuntimeResult<Option<Sv>> {
        let stash = self.define(package)?;
        stash.hash_store(method, code)
    }

    pub(crate) fn remove_method(&mut self, package: &str, method: &str) -> RuntimeResult<Option<Sv>> {
        let key = self.lookup_key(package);
        if self.own_method(&key, method)?.is_none() {
            return Ok(None);
        }
        match self.stash(&key) {
            Some(stash) => stash.hash_delete(method),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for PackageTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageTable")
            .field("packages", &self.stashes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
