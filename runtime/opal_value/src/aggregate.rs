//! Access to the payload of array, hash and code cells.

use opal_hash::{DeleteMode, HashTable, KeyRef};

use crate::sv::Aggregate;
use crate::{CodeBody, RuntimeError, RuntimeResult, Sv, SvType};

fn mismatch(expected: SvType, got: SvType) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: expected.ref_name(),
        got: got.ref_name(),
    }
}

impl Sv {
    fn with_array<R>(&self, f: impl FnOnce(&Vec<Sv>) -> R) -> RuntimeResult<R> {
        let body = self.body();
        match &body.aggregate {
            Aggregate::Array(items) => Ok(f(items)),
            _ => Err(mismatch(SvType::Array, body.kind)),
        }
    }

    /// Mutate the elements. Whatever `f` removes is handed back and
    /// dropped after the cell is released.
    fn with_array_mut(&self, f: impl FnOnce(&mut Vec<Sv>) -> Vec<Sv>) -> RuntimeResult<()> {
        let removed = {
            let mut body = self.body_mut();
            body.check_writable()?;
            let kind = body.kind;
            match &mut body.aggregate {
                Aggregate::Array(items) => f(items),
                _ => return Err(mismatch(SvType::Array, kind)),
            }
        };
        drop(removed);
        Ok(())
    }

    pub fn array_len(&self) -> RuntimeResult<usize> {
        self.with_array(Vec::len)
    }

    pub fn array_get(&self, index: usize) -> RuntimeResult<Option<Sv>> {
        self.with_array(|items| items.get(index).cloned())
    }

    /// All elements, as new handles.
    pub fn array_items(&self) -> RuntimeResult<Vec<Sv>> {
        self.with_array(Clone::clone)
    }

    pub fn array_push(&self, value: Sv) -> RuntimeResult<()> {
        self.with_array_mut(|items| {
            items.push(value);
            Vec::new()
        })
    }

    /// Store at `index`, filling any gap with fresh undefined cells.
    pub fn array_store(&self, index: usize, value: Sv) -> RuntimeResult<()> {
        self.with_array_mut(|items| {
            if index >= items.len() {
                items.resize_with(index + 1, Sv::undef);
            }
            vec![std::mem::replace(&mut items[index], value)]
        })
    }

    pub fn array_clear(&self) -> RuntimeResult<()> {
        self.with_array_mut(std::mem::take)
    }

    /// Replace every element.
    pub fn array_assign(&self, values: Vec<Sv>) -> RuntimeResult<()> {
        self.with_array_mut(|items| std::mem::replace(items, values))
    }

    /// Read the table of a hash cell.
    pub fn with_hash<R>(&self, f: impl FnOnce(&HashTable<Sv>) -> R) -> RuntimeResult<R> {
        let body = self.body();
        match &body.aggregate {
            Aggregate::Hash(table) => Ok(f(table)),
            _ => Err(mismatch(SvType::Hash, body.kind)),
        }
    }

    /// Mutate the table of a hash cell. Values `f` takes out should be
    /// returned rather than dropped inside `f`.
    pub fn with_hash_mut<R>(&self, f: impl FnOnce(&mut HashTable<Sv>) -> R) -> RuntimeResult<R> {
        let mut body = self.body_mut();
        body.check_writable()?;
        let kind = body.kind;
        match &mut body.aggregate {
            Aggregate::Hash(table) => Ok(f(table)),
            _ => Err(mismatch(SvType::Hash, kind)),
        }
    }

    pub fn hash_fetch<'k>(&self, key: impl Into<KeyRef<'k>>) -> RuntimeResult<Option<Sv>> {
        self.with_hash(|table| table.fetch(key).cloned())
    }

    pub fn hash_exists<'k>(&self, key: impl Into<KeyRef<'k>>) -> RuntimeResult<bool> {
        self.with_hash(|table| table.exists(key))
    }

    pub fn hash_len(&self) -> RuntimeResult<usize> {
        self.with_hash(HashTable::len)
    }

    /// Store under `key`, returning the value it replaced.
    pub fn hash_store<'k>(
        &self,
        key: impl Into<KeyRef<'k>>,
        value: Sv,
    ) -> RuntimeResult<Option<Sv>> {
        self.with_hash_mut(|table| table.store(key, value))?.map_err(RuntimeError::from)
    }

    /// Value under `key`, created undefined when absent.
    pub fn hash_fetch_or_create<'k>(&self, key: impl Into<KeyRef<'k>>) -> RuntimeResult<Sv> {
        self.with_hash_mut(|table| table.fetch_or_insert_with(key, Sv::undef).cloned())?
            .map_err(RuntimeError::from)
    }

    pub fn hash_delete<'k>(&self, key: impl Into<KeyRef<'k>>) -> RuntimeResult<Option<Sv>> {
        self.with_hash_mut(|table| table.delete(key, DeleteMode::Return))?
            .map_err(RuntimeError::from)
    }

    /// Presize for `expected` keys.
    pub fn hash_reserve(&self, expected: usize) -> RuntimeResult<()> {
        self.with_hash_mut(|table| table.resize_hint(expected))?
            .map_err(RuntimeError::from)
    }

    pub fn hash_clear(&self) -> RuntimeResult<()> {
        // A restricted table keeps its keys; anything else is swapped out
        // and dropped once the cell is released.
        let emptied = self.with_hash_mut(|table| {
            if table.is_restricted() {
                return table.clear().map(|()| None);
            }
            let emptied = match table.shared_keys() {
                Some(shared) => HashTable::with_shared_keys(shared.clone()),
                None => HashTable::with_hasher(table.hasher()),
            };
            Ok(Some(std::mem::replace(table, emptied)))
        })?;
        drop(emptied?);
        Ok(())
    }

    /// Clone of the code payload.
    pub fn code_body(&self) -> RuntimeResult<CodeBody> {
        let body = self.body();
        match &body.aggregate {
            Aggregate::Code(code) => Ok(code.clone()),
            _ => Err(mismatch(SvType::Code, body.kind)),
        }
    }

    pub fn with_code_mut<R>(&self, f: impl FnOnce(&mut CodeBody) -> R) -> RuntimeResult<R> {
        let mut body = self.body_mut();
        let kind = body.kind;
        match &mut body.aggregate {
            Aggregate::Code(code) => Ok(f(code)),
            _ => Err(mismatch(SvType::Code, kind)),
        }
    }
}
