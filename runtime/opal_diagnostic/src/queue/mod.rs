//! Advisory queue for collecting and de-duplicating runtime diagnostics.
//!
//! Features:
//! - Advisory limit to keep a hot loop from flooding the host
//! - De-duplication by (kind, site), so each site reports a condition once
//! - Site-less advisories de-duplicated by a hash of their message prefix

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use crate::{Advisory, AdvisoryKind, Site};

/// Number of characters to use for message prefix de-duplication.
const MESSAGE_PREFIX_LEN: usize = 30;

/// Hash the first N characters of a message for dedup comparison.
#[inline]
fn message_prefix_hash(msg: &str) -> u64 {
    let byte_end = msg
        .char_indices()
        .nth(MESSAGE_PREFIX_LEN)
        .map_or(msg.len(), |(idx, _)| idx);
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    msg[..byte_end].hash(&mut hasher);
    hasher.finish()
}

/// Configuration for advisory processing.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DiagnosticConfig {
    /// Maximum number of queued advisories (0 = unlimited).
    pub limit: usize,
    /// Report each (kind, site) pair at most once.
    pub deduplicate: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        DiagnosticConfig {
            limit: 1000,
            deduplicate: true,
        }
    }
}

impl DiagnosticConfig {
    /// No limit, no de-duplication (for tests that count every report).
    pub fn unlimited() -> Self {
        DiagnosticConfig {
            limit: 0,
            deduplicate: false,
        }
    }
}

/// De-duplication key: site-anchored advisories ignore their message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
enum SeenKey {
    Site(AdvisoryKind, Site),
    Message(AdvisoryKind, u64),
}

impl SeenKey {
    fn of(advisory: &Advisory) -> Self {
        match advisory.site {
            Some(site) => SeenKey::Site(advisory.kind, site),
            None => SeenKey::Message(advisory.kind, message_prefix_hash(&advisory.message)),
        }
    }
}

/// Queue for collecting advisories.
///
/// The seen-set survives [`flush`](Self::flush): a site that already
/// reported `NotNumeric` stays quiet for the life of the queue.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticQueue {
    advisories: Vec<Advisory>,
    seen: HashSet<SeenKey>,
    /// Advisories rejected because the limit was reached.
    dropped: usize,
    config: DiagnosticConfig,
}

impl DiagnosticQueue {
    pub fn new() -> Self {
        Self::with_config(DiagnosticConfig::default())
    }

    pub fn with_config(config: DiagnosticConfig) -> Self {
        DiagnosticQueue {
            advisories: Vec::new(),
            seen: HashSet::new(),
            dropped: 0,
            config,
        }
    }

    /// Add an advisory.
    ///
    /// Returns `true` if it was queued, `false` if it was filtered as a
    /// duplicate or dropped by the limit.
    pub fn add(&mut self, advisory: Advisory) -> bool {
        if self.config.deduplicate && !self.seen.insert(SeenKey::of(&advisory)) {
            return false;
        }
        if self.limit_reached() {
            self.dropped = self.dropped.saturating_add(1);
            return false;
        }
        tracing::trace!(code = %advisory.code(), message = %advisory.message, "advisory");
        self.advisories.push(advisory);
        true
    }

    /// Check if the advisory limit has been reached.
    pub fn limit_reached(&self) -> bool {
        self.config.limit > 0 && self.advisories.len() >= self.config.limit
    }

    /// Number of queued advisories.
    pub fn len(&self) -> usize {
        self.advisories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.advisories.is_empty()
    }

    /// Number of advisories dropped by the limit.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Count queued advisories of one kind.
    pub fn count_of(&self, kind: AdvisoryKind) -> usize {
        self.advisories.iter().filter(|a| a.kind == kind).count()
    }

    /// Peek at the queued advisories in report order.
    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    /// Take the queued advisories, in report order.
    pub fn flush(&mut self) -> Vec<Advisory> {
        self.dropped = 0;
        std::mem::take(&mut self.advisories)
    }

    /// Forget everything, including which sites already reported.
    pub fn reset(&mut self) {
        self.advisories.clear();
        self.seen.clear();
        self.dropped = 0;
    }
}
