//! Per-package linearization cache and its invalidation.
//!
//! Every package has cache metadata: the orders computed for it, the set
//! of its ancestors, a cache generation bumped on every invalidation, and
//! the packages that list it as a direct parent (the reverse index).
//! Changing a parent list invalidates the package and, through the reverse
//! index, everything that inherits from it.

use opal_hash::{HashKey, SharedKeys};
use opal_stack::ensure_sufficient_stack;
use opal_value::{RuntimeError, RuntimeResult};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::linearization::{Linearization, MroAlgorithm, UNIVERSAL};
use crate::method::MethodEntry;
use crate::package::PackageTable;

/// Deepest parent chain followed before a hierarchy is taken to be
/// cyclic.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// How the reverse index is kept.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum ReverseIndexPolicy {
    /// Updated on every parent-list change; invalidation just walks it.
    #[default]
    Incremental,
    /// Not kept; invalidation rebuilds it from every package's parents.
    Lazy,
}

#[derive(Copy, Clone, Debug)]
pub struct MroConfig {
    pub recursion_limit: usize,
    pub reverse_index: ReverseIndexPolicy,
    pub default_algorithm: MroAlgorithm,
}

impl Default for MroConfig {
    fn default() -> Self {
        MroConfig {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            reverse_index: ReverseIndexPolicy::default(),
            default_algorithm: MroAlgorithm::default(),
        }
    }
}

/// Cache state of one package.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum CacheState {
    #[default]
    Uncached,
    /// Being linearized; meeting it again means a cycle.
    Computing,
    Cached,
}

#[derive(Default)]
pub(crate) struct PackageMeta {
    state: CacheState,
    dfs: Option<Linearization>,
    c3: Option<Linearization>,
    /// Every package in any cached order, for `is_a`.
    isa: Option<FxHashSet<HashKey>>,
    pub(crate) cache_gen: u64,
    /// Parent list the reverse index was last updated from.
    parents: Vec<HashKey>,
    /// Packages naming this one as a direct parent.
    children: FxHashSet<HashKey>,
    pub(crate) methods: FxHashMap<HashKey, MethodEntry>,
}

impl PackageMeta {
    fn order(&self, algorithm: MroAlgorithm) -> Option<&Linearization> {
        match algorithm {
            MroAlgorithm::Dfs => self.dfs.as_ref(),
            MroAlgorithm::C3 => self.c3.as_ref(),
        }
    }

    fn set_order(&mut self, algorithm: MroAlgorithm, order: Linearization) {
        self.isa
            .get_or_insert_with(FxHashSet::default)
            .extend(order.iter().cloned());
        match algorithm {
            MroAlgorithm::Dfs => self.dfs = Some(order),
            MroAlgorithm::C3 => self.c3 = Some(order),
        }
        self.state = CacheState::Cached;
    }

    fn has_order(&self) -> bool {
        self.dfs.is_some() || self.c3.is_some()
    }

    fn invalidate(&mut self) {
        self.dfs = None;
        self.c3 = None;
        self.isa = None;
        self.methods.clear();
        self.state = CacheState::Uncached;
        self.cache_gen += 1;
    }
}

/// Package table plus the caches derived from it.
pub struct MroCache {
    pub(crate) packages: PackageTable,
    pub(crate) meta: FxHashMap<HashKey, PackageMeta>,
    /// Bumped whenever any method is defined or removed.
    pub(crate) sub_generation: u64,
    config: MroConfig,
}

impl MroCache {
    pub fn new(keys: SharedKeys, config: MroConfig) -> Self {
        MroCache {
            packages: PackageTable::new(keys),
            meta: FxHashMap::default(),
            sub_generation: 0,
            config,
        }
    }

    pub fn config(&self) -> &MroConfig {
        &self.config
    }

    pub fn packages(&self) -> &PackageTable {
        &self.packages
    }

    /// Define a package with no parents and no methods, if it is new.
    pub fn define_package(&mut self, name: &str) -> RuntimeResult<HashKey> {
        self.packages.define(name)?;
        Ok(self.packages.lookup_key(name))
    }

    pub fn cache_state(&self, name: &str) -> CacheState {
        let key = self.packages.lookup_key(name);
        self.meta.get(&key).map_or(CacheState::Uncached, |meta| meta.state)
    }

    /// Generation of `name`'s cache; moves on every invalidation.
    pub fn cache_generation(&self, name: &str) -> u64 {
        let key = self.packages.lookup_key(name);
        self.meta.get(&key).map_or(0, |meta| meta.cache_gen)
    }

    /// Generation of method definitions across all packages.
    pub fn sub_generation(&self) -> u64 {
        self.sub_generation
    }

    /// Whether `name` has a cached order for `algorithm`.
    pub fn is_cached(&self, name: &str, algorithm: MroAlgorithm) -> bool {
        let key = self.packages.lookup_key(name);
        self.meta
            .get(&key)
            .is_some_and(|meta| meta.order(algorithm).is_some())
    }

    /// Replace the parent list of `name` and invalidate everything that
    /// depended on the old one.
    pub fn set_parents(&mut self, name: &str, parents: &[&str]) -> RuntimeResult<usize> {
        self.packages.write_parents(name, parents)?;
        self.on_parent_list_changed(name)
    }

    /// Linearization of `name` by the configured algorithm.
    pub fn linearize(&mut self, name: &str) -> RuntimeResult<Linearization> {
        self.linearize_with(name, self.config.default_algorithm)
    }

    /// Linearization of `name` by `algorithm`, computed and cached on
    /// first use.
    pub fn linearize_with(&mut self, name: &str, algorithm: MroAlgorithm) -> RuntimeResult<Linearization> {
        let key = self.packages.lookup_key(name);
        self.linearize_key(&key, algorithm)
    }

    pub(crate) fn linearize_key(&mut self, key: &HashKey, algorithm: MroAlgorithm) -> RuntimeResult<Linearization> {
        if let Some(order) = self.meta.get(key).and_then(|meta| meta.order(algorithm)) {
            return Ok(order.clone());
        }
        let _span = tracing::debug_span!("linearize", package = %key, algorithm = algorithm.name()).entered();
        ensure_sufficient_stack(|| self.linearize_at(key, algorithm, 0))
    }

    fn linearize_at(&mut self, key: &HashKey, algorithm: MroAlgorithm, depth: usize) -> RuntimeResult<Linearization> {
        if depth > self.config.recursion_limit {
            tracing::debug!(package = %key, depth, "parent chain too deep");
            return Err(cycle(key));
        }
        let meta = self.meta.entry(key.clone()).or_default();
        if let Some(order) = meta.order(algorithm) {
            return Ok(order.clone());
        }
        if meta.state == CacheState::Computing {
            tracing::debug!(package = %key, "inheritance cycle");
            return Err(cycle(key));
        }
        meta.state = CacheState::Computing;

        let computed = ensure_sufficient_stack(|| self.compute(key, algorithm, depth));
        let meta = self.meta.entry(key.clone()).or_default();
        match computed {
            Ok(order) => {
                meta.set_order(algorithm, order.clone());
                Ok(order)
            }
            Err(err) => {
                meta.state = if meta.has_order() {
                    CacheState::Cached
                } else {
                    CacheState::Uncached
                };
                Err(err)
            }
        }
    }

    fn compute(&mut self, key: &HashKey, algorithm: MroAlgorithm, depth: usize) -> RuntimeResult<Linearization> {
        let parents = self.packages.parents(key)?;
        let mut parent_orders = Vec::with_capacity(parents.len());
        for parent in &parents {
            parent_orders.push(self.linearize_at(parent, algorithm, depth + 1)?);
        }
        let mut order = match algorithm {
            MroAlgorithm::Dfs => merge_dfs(key, &parent_orders),
            MroAlgorithm::C3 => merge_c3(key, &parents, &parent_orders)?,
        };
        if !order.iter().any(|name| name.as_bytes() == UNIVERSAL.as_bytes()) {
            order.push(self.packages.lookup_key(UNIVERSAL));
        }
        tracing::trace!(package = %key, len = order.len(), "linearized");
        Ok(Linearization::new(order))
    }

    /// Whether `name` is `ancestor` or inherits from it.
    pub fn is_a(&mut self, name: &str, ancestor: &str) -> RuntimeResult<bool> {
        let key = self.packages.lookup_key(name);
        let target = self.packages.lookup_key(ancestor);
        if key == target {
            return Ok(true);
        }
        if self.meta.get(&key).and_then(|meta| meta.isa.as_ref()).is_none() {
            self.linearize_key(&key, self.config.default_algorithm)?;
        }
        Ok(self
            .meta
            .get(&key)
            .and_then(|meta| meta.isa.as_ref())
            .is_some_and(|isa| isa.contains(&target)))
    }

    /// Tell the cache that the `ISA` of `name` changed. Drops the cached
    /// orders of `name` and of every package inheriting from it, and
    /// returns how many packages were invalidated.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn on_parent_list_changed(&mut self, name: &str) -> RuntimeResult<usize> {
        let key = self.packages.lookup_key(name);
        let parents = self.packages.parents(&key)?;
        if self.config.reverse_index == ReverseIndexPolicy::Incremental {
            self.reindex(&key, &parents);
        }
        self.meta.entry(key.clone()).or_default().parents = parents;

        let affected = match self.config.reverse_index {
            ReverseIndexPolicy::Incremental => self.descendants(&key, |cache, package| {
                cache
                    .meta
                    .get(package)
                    .map(|meta| meta.children.iter().cloned().collect())
                    .unwrap_or_default()
            }),
            ReverseIndexPolicy::Lazy => {
                let children = self.rebuild_reverse_index()?;
                self.descendants(&key, |_, package| {
                    children.get(package).cloned().unwrap_or_default()
                })
            }
        };
        for package in &affected {
            self.meta.entry(package.clone()).or_default().invalidate();
        }
        tracing::debug!(invalidated = affected.len(), "parent list changed");
        Ok(affected.len())
    }

    /// Move `key` from the child sets of its old parents to those of
    /// `parents`.
    fn reindex(&mut self, key: &HashKey, parents: &[HashKey]) {
        let old = self
            .meta
            .get(key)
            .map(|meta| meta.parents.clone())
            .unwrap_or_default();
        for parent in old.iter().filter(|parent| !parents.contains(parent)) {
            if let Some(meta) = self.meta.get_mut(parent) {
                meta.children.remove(key);
            }
        }
        for parent in parents {
            self.meta
                .entry(parent.clone())
                .or_default()
                .children
                .insert(key.clone());
        }
    }

    /// Direct children of every package, read from the parent lists.
    fn rebuild_reverse_index(&self) -> RuntimeResult<FxHashMap<HashKey, Vec<HashKey>>> {
        let mut children: FxHashMap<HashKey, Vec<HashKey>> = FxHashMap::default();
        for package in self.packages.names() {
            for parent in self.packages.parents(&package)? {
                children.entry(parent).or_default().push(package.clone());
            }
        }
        Ok(children)
    }

    /// `key` and everything reachable from it through `children`, each
    /// once.
    fn descendants(
        &self,
        key: &HashKey,
        children: impl Fn(&Self, &HashKey) -> Vec<HashKey>,
    ) -> Vec<HashKey> {
        let mut seen: FxHashSet<HashKey> = FxHashSet::default();
        let mut found = Vec::new();
        let mut queue: SmallVec<[HashKey; 8]> = SmallVec::new();
        queue.push(key.clone());
        while let Some(package) = queue.pop() {
            if !seen.insert(package.clone()) {
                continue;
            }
            queue.extend(children(self, &package));
            found.push(package);
        }
        found
    }

    /// Drop every cached order and method, as after wholesale changes to
    /// the package table.
    pub fn invalidate_all(&mut self) {
        for meta in self.meta.values_mut() {
            meta.invalidate();
        }
        self.sub_generation += 1;
        tracing::debug!(packages = self.meta.len(), "invalidated every package");
    }

    /// Packages with any cached order.
    pub fn cached_count(&self) -> usize {
        self.meta.values().filter(|meta| meta.has_order()).count()
    }
}

fn cycle(key: &HashKey) -> RuntimeError {
    RuntimeError::InheritanceCycle {
        package: key.to_text(),
    }
}

/// `key`, then each parent's order in turn, skipping what is already
/// there.
fn merge_dfs(key: &HashKey, parent_orders: &[Linearization]) -> Vec<HashKey> {
    let mut seen: FxHashSet<&HashKey> = FxHashSet::default();
    let mut order = vec![key.clone()];
    seen.insert(key);
    for parent_order in parent_orders {
        for name in parent_order.inherited() {
            if seen.insert(name) {
                order.push(name.clone());
            }
        }
    }
    order
}

/// C3 merge of the parents' orders and the parent list itself.
fn merge_c3(key: &HashKey, parents: &[HashKey], parent_orders: &[Linearization]) -> RuntimeResult<Vec<HashKey>> {
    let mut sequences: Vec<&[HashKey]> = parent_orders
        .iter()
        .map(Linearization::inherited)
        .chain(std::iter::once(parents))
        .filter(|sequence| !sequence.is_empty())
        .collect();
    let mut order = vec![key.clone()];
    while !sequences.is_empty() {
        let candidate = sequences
            .iter()
            .map(|sequence| &sequence[0])
            .find(|&head| !sequences.iter().any(|sequence| sequence[1..].contains(head)))
            .cloned()
            .ok_or_else(|| RuntimeError::InconsistentHierarchy {
                package: key.to_text(),
            })?;
        sequences = sequences
            .into_iter()
            .map(|sequence| {
                if sequence[0] == candidate {
                    &sequence[1..]
                } else {
                    sequence
                }
            })
            .filter(|sequence| !sequence.is_empty())
            .collect();
        order.push(candidate);
    }
    Ok(order)
}

impl std::fmt::Debug for MroCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MroCache")
            .field("packages", &self.packages.len())
            .field("cached", &self.cached_count())
            .field("sub_generation", &self.sub_generation)
            .finish_non_exhaustive()
    }
}
