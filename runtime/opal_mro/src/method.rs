//! Method resolution through the linearization, with a per-package cache.
//!
//! A cache entry is stamped with the package's cache generation and the
//! global method generation when it is made, and is only trusted while
//! both still match. Misses are cached as well.

use opal_diagnostic::{Advisory, AdvisorySink};
use opal_hash::HashKey;
use opal_value::{RuntimeResult, Sv, SvType};

use crate::cache::MroCache;
use crate::linearization::UNIVERSAL;

/// A method found by resolution.
#[derive(Clone, Debug)]
pub struct ResolvedMethod {
    pub code: Sv,
    /// Package that defines it.
    pub package: HashKey,
}

#[derive(Clone, Debug)]
pub(crate) struct MethodEntry {
    cache_gen: u64,
    sub_generation: u64,
    found: Option<ResolvedMethod>,
}

impl MroCache {
    /// Define `method` in `package`, defining the package if needed.
    /// Replacing an existing method reports a redefinition advisory.
    pub fn define_method(
        &mut self,
        package: &str,
        method: &str,
        code: Sv,
        sink: &dyn AdvisorySink,
    ) -> RuntimeResult<()> {
        let owner = self.define_package(package)?;
        code.with_code_mut(|body| {
            body.package.get_or_insert(owner);
        })?;
        if let Some(old) = self.packages.store_method(package, method, code)? {
            if old.kind() == SvType::Code {
                sink.advise(Advisory::redefined(package, method));
            }
        }
        self.methods_changed();
        Ok(())
    }

    /// Remove `method` from `package`, returning its code.
    pub fn remove_method(&mut self, package: &str, method: &str) -> RuntimeResult<Option<Sv>> {
        let removed = self.packages.remove_method(package, method)?;
        if removed.is_some() {
            self.methods_changed();
        }
        Ok(removed)
    }

    /// Invalidate every cached method lookup, after stashes were edited
    /// behind the cache's back.
    pub fn methods_changed(&mut self) {
        self.sub_generation += 1;
        tracing::trace!(sub_generation = self.sub_generation, "method generation bumped");
    }

    /// Find `method` for `package`: its own definition, else the first one
    /// along its linearization.
    pub fn resolve_method(
        &mut self,
        package: &str,
        method: &str,
        sink: &dyn AdvisorySink,
    ) -> RuntimeResult<Option<ResolvedMethod>> {
        let key = self.packages.lookup_key(package);
        let name = HashKey::new(method, self.packages.hasher());
        if let Some(entry) = self.cached_method(&key, &name) {
            return Ok(entry);
        }

        let order = self.linearize_key(&key, self.config().default_algorithm)?;
        let found = self.search(&order, &key, method, 0, sink)?;
        let cache_gen = self.meta.get(&key).map_or(0, |meta| meta.cache_gen);
        let entry = MethodEntry {
            cache_gen,
            sub_generation: self.sub_generation,
            found: found.clone(),
        };
        self.meta.entry(key).or_default().methods.insert(name, entry);
        Ok(found)
    }

    /// Find `method` starting after `package` in its own linearization,
    /// as a call through `SUPER` does. Not cached.
    pub fn resolve_super(
        &mut self,
        package: &str,
        method: &str,
        sink: &dyn AdvisorySink,
    ) -> RuntimeResult<Option<ResolvedMethod>> {
        let key = self.packages.lookup_key(package);
        let order = self.linearize_key(&key, self.config().default_algorithm)?;
        self.search(&order, &key, method, 1, sink)
    }

    /// Whether `package` has or inherits `method`.
    pub fn can(&mut self, package: &str, method: &str, sink: &dyn AdvisorySink) -> RuntimeResult<bool> {
        Ok(self.resolve_method(package, method, sink)?.is_some())
    }

    fn cached_method(&self, key: &HashKey, name: &HashKey) -> Option<Option<ResolvedMethod>> {
        let meta = self.meta.get(key)?;
        let entry = meta.methods.get(name)?;
        let fresh = entry.cache_gen == meta.cache_gen && entry.sub_generation == self.sub_generation;
        fresh.then(|| entry.found.clone())
    }

    fn search(
        &self,
        order: &[HashKey],
        origin: &HashKey,
        method: &str,
        skip: usize,
        sink: &dyn AdvisorySink,
    ) -> RuntimeResult<Option<ResolvedMethod>> {
        for (index, package) in order.iter().enumerate().skip(skip) {
            if !self.packages.contains(package) {
                // Only parents warn; the package itself and the fallback
                // need not exist.
                if index > 0 && package.as_bytes() != UNIVERSAL.as_bytes() {
                    sink.advise(Advisory::missing_package(&package.to_text(), &origin.to_text()));
                }
                continue;
            }
            if let Some(code) = self.packages.own_method(package, method)? {
                let package = self.packages.key(package).unwrap_or_else(|| package.clone());
                return Ok(Some(ResolvedMethod { code, package }));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests;
