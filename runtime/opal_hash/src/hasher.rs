//! Key hashing.
//!
//! Bob Jenkins' one-at-a-time hash, seeded per instance. The seed comes from
//! configuration, then the `OPAL_HASH_SEED` environment variable, then a
//! fixed default so runs are reproducible unless asked otherwise.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

/// Environment variable consulted for the hash seed.
pub const HASH_SEED_ENV: &str = "OPAL_HASH_SEED";

/// Seed used when neither configuration nor environment supplies one.
const DEFAULT_SEED: u32 = 0;

/// Seeded one-at-a-time hasher for key bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyHasher {
    seed: u32,
}

impl KeyHasher {
    pub const fn new(seed: u32) -> Self {
        KeyHasher { seed }
    }

    /// Hasher seeded from a 64-bit configuration value.
    pub fn from_seed(seed: u64) -> Self {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "folding a 64-bit seed into 32 bits is the point"
        )]
        let folded = (seed ^ (seed >> 32)) as u32;
        KeyHasher::new(folded)
    }

    /// Hasher with an unpredictable seed, for tables that detected
    /// pathological key distributions.
    pub fn random() -> Self {
        let mut hasher = RandomState::new().build_hasher();
        hasher.write_u32(0x5eed);
        KeyHasher::from_seed(hasher.finish())
    }

    pub const fn seed(&self) -> u32 {
        self.seed
    }

    /// Hash key bytes.
    #[inline]
    pub fn hash(&self, bytes: &[u8]) -> u32 {
        let mut hash = self.seed;
        for &byte in bytes {
            hash = hash.wrapping_add(u32::from(byte));
            hash = hash.wrapping_add(hash << 10);
            hash ^= hash >> 6;
        }
        hash = hash.wrapping_add(hash << 3);
        hash ^= hash >> 11;
        hash.wrapping_add(hash << 15)
    }
}

impl Default for KeyHasher {
    fn default() -> Self {
        KeyHasher::new(DEFAULT_SEED)
    }
}

/// Read the seed from `OPAL_HASH_SEED`, if set and parseable.
pub fn seed_from_env() -> Option<u64> {
    let raw = std::env::var(HASH_SEED_ENV).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(seed) => Some(seed),
        Err(_) => {
            tracing::debug!(value = %raw, "ignoring unparseable {HASH_SEED_ENV}");
            None
        }
    }
}
