//! Cached ancestor orders.

#![expect(
    clippy::disallowed_types,
    reason = "Rc shares one cached order between the cache and its readers"
)]

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use opal_hash::HashKey;

/// Name of the package every linearization falls back to.
pub const UNIVERSAL: &str = "UNIVERSAL";

/// How a package's ancestors are ordered.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum MroAlgorithm {
    /// Depth-first, left to right, first occurrence wins.
    #[default]
    Dfs,
    /// C3: every package precedes its parents, and parent order is kept.
    C3,
}

impl MroAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            MroAlgorithm::Dfs => "dfs",
            MroAlgorithm::C3 => "c3",
        }
    }

    pub fn from_name(name: &str) -> Option<MroAlgorithm> {
        match name {
            "dfs" => Some(MroAlgorithm::Dfs),
            "c3" => Some(MroAlgorithm::C3),
            _ => None,
        }
    }
}

/// Read-only ancestor order of one package, the package itself first.
///
/// Clones share the cached order.
#[derive(Clone, PartialEq, Eq)]
pub struct Linearization(Rc<[HashKey]>);

impl Linearization {
    pub(crate) fn new(order: Vec<HashKey>) -> Self {
        Linearization(order.into())
    }

    /// The order without its trailing `UNIVERSAL`, as merged into a
    /// child's order.
    pub(crate) fn inherited(&self) -> &[HashKey] {
        match self.0.split_last() {
            Some((last, rest)) if last.as_bytes() == UNIVERSAL.as_bytes() => rest,
            _ => &self.0,
        }
    }

    /// Package names, in order.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(HashKey::to_text).collect()
    }

    /// Same cached order, not merely equal.
    pub fn ptr_eq(&self, other: &Linearization) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Linearization {
    type Target = [HashKey];

    fn deref(&self) -> &[HashKey] {
        &self.0
    }
}

impl fmt::Debug for Linearization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter().map(HashKey::to_text)).finish()
    }
}

#[cfg(test)]
mod tests;
