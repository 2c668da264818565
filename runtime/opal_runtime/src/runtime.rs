//! One runtime instance.
//!
//! An instance owns everything the value layer needs besides the values
//! themselves: the key table, the advisory queue, the packages and their
//! method resolution cache, and the pad arena. Instances never share any
//! of it, except the key table under process-wide interning.
//!
//! A fatal error (running out of memory while growing a table) poisons
//! the instance. Every later structural operation fails with the same
//! error, and the host is expected to drop the instance.

use opal_diagnostic::{Advisory, AdvisorySink, Diagnostics};
use opal_hash::{HashKey, HashTable, KeyHasher, KeySource, SharedKeys};
use opal_mro::{Linearization, MroAlgorithm, MroCache, ResolvedMethod};
use opal_pad::{Declarator, PadArena, Sigil, Slot};
use opal_value::{
    ActivationId, CodeBody, EnvElement, Environment, MagicKind, NativeFn, ProcessEnvironment,
    RuntimeError, RuntimeResult, Sv, UnitId,
};

use crate::config::{RuntimeBuilder, RuntimeConfig};

pub struct Runtime {
    config: RuntimeConfig,
    keys: SharedKeys,
    diagnostics: Diagnostics,
    mro: MroCache,
    pads: PadArena,
    /// Keys interned through [`Runtime::intern`], released on drop.
    interned: Vec<HashKey>,
    poisoned: Option<RuntimeError>,
}

impl Runtime {
    #[tracing::instrument(level = "debug", skip_all, fields(interning = ?config.interning))]
    pub fn new(config: RuntimeConfig) -> Self {
        let keys = SharedKeys::for_mode(config.interning, config.hasher());
        let runtime = Runtime {
            diagnostics: Diagnostics::new(config.diagnostics.clone()),
            mro: MroCache::new(keys.clone(), config.mro()),
            pads: PadArena::new(keys.clone()),
            keys,
            interned: Vec::new(),
            poisoned: None,
            config,
        };
        tracing::debug!(seed = runtime.hasher().seed(), "runtime created");
        runtime
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The key table this instance interns into.
    pub fn keys(&self) -> &SharedKeys {
        &self.keys
    }

    pub fn hasher(&self) -> KeyHasher {
        self.keys.hasher()
    }

    /// The error that poisoned this instance, if any.
    pub fn poisoned(&self) -> Option<&RuntimeError> {
        self.poisoned.as_ref()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    fn ensure_usable(&self) -> RuntimeResult<()> {
        match &self.poisoned {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Pass `result` through, poisoning the instance on a fatal error.
    /// Hosts route the results of cell operations they run themselves
    /// through here.
    pub fn track<T>(&mut self, result: RuntimeResult<T>) -> RuntimeResult<T> {
        if let Err(error) = &result {
            if error.is_fatal() && self.poisoned.is_none() {
                tracing::error!(%error, "runtime poisoned");
                self.poisoned = Some(error.clone());
            }
        }
        result
    }

    // Values and keys

    /// An empty user-level map cell with private keys.
    pub fn new_map(&self) -> RuntimeResult<Sv> {
        self.ensure_usable()?;
        Ok(Sv::hash(HashTable::with_hasher(self.hasher())))
    }

    /// Presize the map cell `map` for `expected` keys.
    pub fn reserve(&mut self, map: &Sv, expected: usize) -> RuntimeResult<()> {
        self.ensure_usable()?;
        let result = map.hash_reserve(expected);
        self.track(result)
    }

    /// Intern `name` in the instance key table. The instance holds one
    /// reference per call until it is dropped.
    pub fn intern(&mut self, name: &str) -> RuntimeResult<HashKey> {
        self.ensure_usable()?;
        let result = self.keys.intern_key(name).map_err(RuntimeError::from);
        let key = self.track(result)?;
        self.interned.push(key.clone());
        Ok(key)
    }

    /// Bless the referent of `reference` into `package`, defining the
    /// package if needed.
    pub fn bless(&mut self, reference: &Sv, package: &str) -> RuntimeResult<()> {
        let key = self.define_package(package)?;
        reference.bless(&key)
    }

    /// A cell bound to the process environment variable `name`.
    pub fn env_var(&self, name: &str) -> RuntimeResult<Sv> {
        self.env_var_in(name, ProcessEnvironment, false)
    }

    /// A cell bound to variable `name` of `env`.
    pub fn env_var_in(
        &self,
        name: &str,
        env: impl Environment + 'static,
        case_insensitive: bool,
    ) -> RuntimeResult<Sv> {
        self.ensure_usable()?;
        let cell = Sv::undef();
        cell.attach_magic(
            MagicKind::EnvElement,
            EnvElement::new(name, env).case_insensitive(case_insensitive),
        )?;
        Ok(cell)
    }

    // Packages and methods

    pub fn mro(&self) -> &MroCache {
        &self.mro
    }

    pub fn mro_mut(&mut self) -> &mut MroCache {
        &mut self.mro
    }

    pub fn define_package(&mut self, name: &str) -> RuntimeResult<HashKey> {
        self.ensure_usable()?;
        let result = self.mro.define_package(name);
        self.track(result)
    }

    /// Replace the parents of `name`. Returns how many cached orders were
    /// dropped.
    pub fn set_parents(&mut self, name: &str, parents: &[&str]) -> RuntimeResult<usize> {
        self.ensure_usable()?;
        let result = self.mro.set_parents(name, parents);
        self.track(result)
    }

    pub fn define_method(&mut self, package: &str, method: &str, code: Sv) -> RuntimeResult<()> {
        self.ensure_usable()?;
        let result = self.mro.define_method(package, method, code, &self.diagnostics);
        self.track(result)
    }

    /// Define a built-in method.
    pub fn define_native(
        &mut self,
        package: &str,
        method: &str,
        body: NativeFn,
    ) -> RuntimeResult<()> {
        let name = self.intern(method)?;
        let code = Sv::code(CodeBody::native(Some(name), body));
        self.define_method(package, method, code)
    }

    pub fn remove_method(&mut self, package: &str, method: &str) -> RuntimeResult<Option<Sv>> {
        self.ensure_usable()?;
        let result = self.mro.remove_method(package, method);
        self.track(result)
    }

    /// Linearization of `name` under the configured algorithm.
    pub fn linearize(&mut self, name: &str) -> RuntimeResult<Linearization> {
        self.ensure_usable()?;
        let result = self.mro.linearize(name);
        self.track(result)
    }

    pub fn linearize_with(
        &mut self,
        name: &str,
        algorithm: MroAlgorithm,
    ) -> RuntimeResult<Linearization> {
        self.ensure_usable()?;
        let result = self.mro.linearize_with(name, algorithm);
        self.track(result)
    }

    pub fn resolve_method(
        &mut self,
        package: &str,
        method: &str,
    ) -> RuntimeResult<Option<ResolvedMethod>> {
        self.ensure_usable()?;
        let result = self.mro.resolve_method(package, method, &self.diagnostics);
        self.track(result)
    }

    pub fn resolve_super(
        &mut self,
        package: &str,
        method: &str,
    ) -> RuntimeResult<Option<ResolvedMethod>> {
        self.ensure_usable()?;
        let result = self.mro.resolve_super(package, method, &self.diagnostics);
        self.track(result)
    }

    pub fn can(&mut self, package: &str, method: &str) -> RuntimeResult<bool> {
        Ok(self.resolve_method(package, method)?.is_some())
    }

    pub fn is_a(&mut self, package: &str, ancestor: &str) -> RuntimeResult<bool> {
        self.ensure_usable()?;
        let result = self.mro.is_a(package, ancestor);
        self.track(result)
    }

    /// Resolve `method` for the object `reference` points at.
    pub fn resolve_for(
        &mut self,
        reference: &Sv,
        method: &str,
    ) -> RuntimeResult<Option<ResolvedMethod>> {
        let package = reference.blessed().ok_or(RuntimeError::TypeMismatch {
            expected: "a blessed reference",
            got: "an unblessed value",
        })?;
        self.resolve_method(&package.to_text(), method)
    }

    // Pads

    pub fn pads(&self) -> &PadArena {
        &self.pads
    }

    pub fn pads_mut(&mut self) -> &mut PadArena {
        &mut self.pads
    }

    /// Open a compiled unit nested in `outer`.
    pub fn compile_unit(&mut self, name: Option<&str>, outer: Option<UnitId>) -> RuntimeResult<UnitId> {
        self.ensure_usable()?;
        let result = self.pads.new_unit(name, outer);
        self.track(result)
    }

    /// Declare a name in `unit`, reporting masked declarations.
    pub fn declare(
        &mut self,
        unit: UnitId,
        name: &str,
        sigil: Sigil,
        declarator: Declarator,
    ) -> RuntimeResult<Slot> {
        self.ensure_usable()?;
        let result = self
            .pads
            .add_name(unit, name, sigil, declarator, &self.diagnostics);
        self.track(result)
    }

    /// A closure of `unit` over the activation `outer`.
    pub fn clone_closure(&mut self, unit: UnitId, outer: Option<ActivationId>) -> RuntimeResult<Sv> {
        self.ensure_usable()?;
        let result = self.pads.make_closure(unit, outer);
        self.track(result)
    }

    /// Discard activations no code cell refers to any more.
    pub fn sweep(&mut self) -> usize {
        self.pads.sweep()
    }

    // Diagnostics

    /// The advisory sink operations on this instance report through.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Report an advisory raised outside the runtime's own operations.
    pub fn advise(&self, advisory: Advisory) {
        self.diagnostics.advise(advisory);
    }

    /// Take every advisory reported so far.
    pub fn take_diagnostics(&self) -> Vec<Advisory> {
        self.diagnostics.take()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new(RuntimeConfig::default())
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        tracing::debug!(
            packages = self.mro.packages().len(),
            cached_orders = self.mro.cached_count(),
            units = self.pads.unit_count(),
            activations = self.pads.live_activations(),
            interned = self.interned.len(),
            pending_advisories = self.diagnostics.len(),
            poisoned = self.poisoned.is_some(),
            "dropping runtime"
        );
        for key in self.interned.drain(..) {
            self.keys.release(&key);
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("keys", &self.keys)
            .field("packages", &self.mro.packages().len())
            .field("units", &self.pads.unit_count())
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}
