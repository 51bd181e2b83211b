//! L1 cache: an in-memory, fingerprint-keyed map with insertion-order
//! eviction and a TTL (spec.md §4.5). No `lru` crate appears anywhere in
//! the retrieved example pack, so this is hand-rolled rather than pulled in
//! — a `HashMap` plus a side `VecDeque` of keys in insertion order, capped
//! at [`MAX_ENTRIES`].
//!
//! L2 (persistent-across-runs) is explicitly optional per spec.md §4.5 and
//! is not implemented in this revision.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

pub const TTL: Duration = Duration::from_secs(300);
const MAX_ENTRIES: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub indicator: &'static str,
    pub params: Vec<i64>,
    pub fingerprint: u64,
    pub length: usize,
}

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub period_actually_used: usize,
    inserted_at: Instant,
}

pub struct IndicatorCache<T> {
    entries: HashMap<CacheKey, CacheEntry<T>>,
    order: VecDeque<CacheKey>,
}

impl<T: Clone> IndicatorCache<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        let entry = self.entries.get(key)?;
        if entry.inserted_at.elapsed() > TTL {
            return None;
        }
        Some(entry.clone())
    }

    /// Looks for an entry with the same (indicator, params, fingerprint) at
    /// some shorter length `length = target_length - delta` with
    /// `0 < delta <= max_delta` (spec.md §4.5's incremental search), scanning
    /// from the closest length outward so the forward recurrence is as
    /// short as possible.
    pub fn find_incremental_base(
        &self,
        indicator: &'static str,
        params: &[i64],
        fingerprint: u64,
        target_length: usize,
        max_delta: usize,
    ) -> Option<(usize, CacheEntry<T>)> {
        for delta in 1..=max_delta {
            let base_length = target_length.checked_sub(delta)?;
            if base_length == 0 {
                continue;
            }
            let key = CacheKey {
                indicator,
                params: params.to_vec(),
                fingerprint,
                length: base_length,
            };
            if let Some(entry) = self.get(&key) {
                return Some((delta, entry));
            }
        }
        None
    }

    pub fn insert(&mut self, key: CacheKey, value: T, period_actually_used: usize) {
        if !self.entries.contains_key(&key) {
            self.order.push_back(key.clone());
            if self.order.len() > MAX_ENTRIES {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                period_actually_used,
                inserted_at: Instant::now(),
            },
        );
    }
}

impl<T: Clone> Default for IndicatorCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Hashes over the first `K = 10` candles of the window (spec.md §4.5):
/// stable across appends, and changes if a different instrument or
/// timeframe is used. FNV-1a, chosen for being dependency-free and
/// deterministic across runs (no `std` `HashMap` hasher, which is
/// randomized per-process).
pub fn data_fingerprint(closes_opens_highs_lows_vols: &[[f64; 5]]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let k = 10.min(closes_opens_highs_lows_vols.len());
    let mut hash = FNV_OFFSET;
    for row in &closes_opens_highs_lows_vols[..k] {
        for value in row {
            for byte in value.to_bits().to_le_bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_stable_across_appends() {
        let base = vec![[1.0, 2.0, 3.0, 4.0, 5.0]; 10];
        let fp1 = data_fingerprint(&base);
        let mut extended = base.clone();
        extended.push([9.0, 9.0, 9.0, 9.0, 9.0]);
        let fp2 = data_fingerprint(&extended);
        assert_eq!(fp1, fp2);
    }

    #[test]
    fn fingerprint_changes_when_leading_candles_differ() {
        let a = vec![[1.0, 2.0, 3.0, 4.0, 5.0]; 10];
        let mut b = a.clone();
        b[0][0] = 999.0;
        assert_ne!(data_fingerprint(&a), data_fingerprint(&b));
    }

    #[test]
    fn incremental_base_prefers_closest_delta() {
        let mut cache: IndicatorCache<f64> = IndicatorCache::new();
        cache.insert(
            CacheKey {
                indicator: "ema",
                params: vec![20],
                fingerprint: 1,
                length: 95,
            },
            1.0,
            20,
        );
        cache.insert(
            CacheKey {
                indicator: "ema",
                params: vec![20],
                fingerprint: 1,
                length: 99,
            },
            2.0,
            20,
        );
        let (delta, entry) = cache
            .find_incremental_base("ema", &[20], 1, 100, 50)
            .unwrap();
        assert_eq!(delta, 1);
        assert_eq!(entry.value, 2.0);
    }
}
