//! # Membership Filter Module
//!
//! A probabilistic, false-positives-only membership filter used by the LSM
//! coordinator (C4) to skip sorted blocks that provably do not contain a
//! queried key (component C3).
//!
//! Sized from an expected key `capacity` and a target false-positive rate
//! using the standard formulas:
//!
//! - bits per element: `bpe = -ln(p) / (ln 2)^2`
//! - hash function count: `h = ceil(bpe * ln 2)`
//!
//! Backed by the `bloomfilter` crate, which implements exactly this sizing.

use std::sync::RwLock;

use bloomfilter::Bloom;
use tracing::warn;

/// A membership filter over `String` keys, internally synchronized so it
/// can be shared across the reader threads that query the LSM coordinator.
#[derive(Debug)]
pub struct MembershipFilter {
    inner: RwLock<Bloom<str>>,
}

impl MembershipFilter {
    /// Builds a filter sized for `capacity` expected keys at the given
    /// target `false_positive_rate` (e.g. `0.01` for 1%).
    pub fn new(capacity: usize, false_positive_rate: f64) -> Self {
        let capacity = capacity.max(1);
        let bloom = Bloom::new_for_fp_rate(capacity, false_positive_rate).unwrap_or_else(|err| {
            warn!(%err, capacity, false_positive_rate, "falling back to a minimal filter");
            Bloom::new_for_fp_rate(1, 0.5).expect("minimal filter parameters are always valid")
        });
        Self {
            inner: RwLock::new(bloom),
        }
    }

    /// Records `key` as present.
    pub fn add(&self, key: &str) {
        self.inner.write().expect("filter lock poisoned").set(key);
    }

    /// Returns `false` only if `key` is *definitely* absent; `true` means
    /// "maybe present" and the caller must still consult the backing block.
    pub fn may_contain(&self, key: &str) -> bool {
        self.inner.read().expect("filter lock poisoned").check(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_key_is_usually_rejected() {
        let filter = MembershipFilter::new(100, 0.01);
        for i in 0..100 {
            filter.add(&format!("key-{i}"));
        }
        assert!(!filter.may_contain("definitely-not-present-xyz"));
    }

    #[test]
    fn added_keys_are_always_reported_present() {
        let filter = MembershipFilter::new(50, 0.01);
        for i in 0..50 {
            filter.add(&format!("k{i}"));
        }
        for i in 0..50 {
            assert!(filter.may_contain(&format!("k{i}")));
        }
    }
}
