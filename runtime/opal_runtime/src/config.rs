//! Runtime configuration.

use opal_diagnostic::DiagnosticConfig;
use opal_hash::{seed_from_env, InterningMode, KeyHasher};
use opal_mro::{MroAlgorithm, MroConfig, ReverseIndexPolicy, DEFAULT_RECURSION_LIMIT};

use crate::Runtime;

/// Everything a runtime instance is built from.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Where interned keys live. Defaults to the process-wide toggle.
    pub interning: InterningMode,
    /// Hash seed. Falls back to `OPAL_HASH_SEED`, then to a fixed default.
    /// Ignored under process-wide interning, whose seed is fixed by the
    /// first runtime to use it.
    pub hash_seed: Option<u64>,
    pub mro_recursion_limit: usize,
    pub reverse_index: ReverseIndexPolicy,
    pub diagnostics: DiagnosticConfig,
    pub default_mro: MroAlgorithm,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            interning: InterningMode::default(),
            hash_seed: None,
            mro_recursion_limit: DEFAULT_RECURSION_LIMIT,
            reverse_index: ReverseIndexPolicy::default(),
            diagnostics: DiagnosticConfig::default(),
            default_mro: MroAlgorithm::default(),
        }
    }
}

impl RuntimeConfig {
    /// Hasher for instance-local keys and private tables.
    pub fn hasher(&self) -> KeyHasher {
        self.hash_seed
            .or_else(seed_from_env)
            .map_or_else(KeyHasher::default, KeyHasher::from_seed)
    }

    pub(crate) fn mro(&self) -> MroConfig {
        MroConfig {
            recursion_limit: self.mro_recursion_limit,
            reverse_index: self.reverse_index,
            default_algorithm: self.default_mro,
        }
    }
}

/// Builder for [`Runtime`].
#[derive(Clone, Debug, Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        RuntimeBuilder::default()
    }

    #[must_use]
    pub fn interning(mut self, mode: InterningMode) -> Self {
        self.config.interning = mode;
        self
    }

    #[must_use]
    pub fn hash_seed(mut self, seed: u64) -> Self {
        self.config.hash_seed = Some(seed);
        self
    }

    /// Deepest parent chain linearization follows.
    #[must_use]
    pub fn mro_recursion_limit(mut self, limit: usize) -> Self {
        self.config.mro_recursion_limit = limit;
        self
    }

    #[must_use]
    pub fn reverse_index(mut self, policy: ReverseIndexPolicy) -> Self {
        self.config.reverse_index = policy;
        self
    }

    #[must_use]
    pub fn diagnostics(mut self, diagnostics: DiagnosticConfig) -> Self {
        self.config.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn default_mro(mut self, algorithm: MroAlgorithm) -> Self {
        self.config.default_mro = algorithm;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn build(self) -> Runtime {
        Runtime::new(self.config)
    }
}

#[cfg(test)]
mod tests;
