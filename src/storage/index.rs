//! Expiration Index
//!
//! Ordered view of live keys by deadline, so a sweep can drain expired
//! entries without scanning the whole mapping.

use std::collections::BTreeSet;
use std::time::Instant;

/// Keys ordered by expiration instant, earliest first.
///
/// Must stay in lockstep with the mapping: every mapped key appears exactly
/// once here, under the deadline its entry currently carries. Both are
/// mutated under the store's exclusive lock.
#[derive(Debug, Default)]
pub(crate) struct ExpiryIndex {
    entries: BTreeSet<(Instant, String)>,
}

impl ExpiryIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a key under its deadline
    pub(crate) fn insert(&mut self, expires_at: Instant, key: String) {
        self.entries.insert((expires_at, key));
    }

    /// Drop a key's slot, identified by the deadline its entry carried
    pub(crate) fn remove(&mut self, expires_at: Instant, key: String) -> bool {
        self.entries.remove(&(expires_at, key))
    }

    /// Remove and return up to `limit` keys whose deadline has passed,
    /// earliest first, stopping at the first live entry.
    pub(crate) fn take_expired(&mut self, now: Instant, limit: usize) -> Vec<String> {
        let mut keys = Vec::new();
        while keys.len() < limit {
            let dead = self
                .entries
                .first()
                .is_some_and(|(expires_at, _)| *expires_at <= now);
            if !dead {
                break;
            }
            if let Some((_, key)) = self.entries.pop_first() {
                keys.push(key);
            }
        }
        keys
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, expires_at: Instant, key: &str) -> bool {
        self.entries.contains(&(expires_at, key.to_owned()))
    }
}
