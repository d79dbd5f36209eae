//! Concurrent per-key occurrence counting.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::hash::HashProvider;
use super::record::Fingerprint;

/// The per-key admission ledger.
pub trait Counter<K: ?Sized>: Send + Sync {
    /// Count one occurrence of `key`.
    ///
    /// Returns the count as it was *before* this occurrence, and the key's
    /// fingerprint. A key without an entry reports `0`.
    fn report(&self, key: &K) -> (u64, Fingerprint);

    /// Forget the entry for `fingerprint`. Absent entries are ignored.
    fn reset(&self, fingerprint: Fingerprint);

    /// Remove every entry.
    fn drain(&self);

    /// Current count for `fingerprint`, if it has an entry.
    fn count(&self, fingerprint: Fingerprint) -> Option<u64>;

    /// Number of fingerprints with an entry.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`Counter`] keyed by fingerprint, with one atomic cell per entry.
///
/// Reports on an existing fingerprint only take the shard's read lock and
/// increment the cell atomically, so hot keys never serialize on a write lock.
/// Creating or removing an entry takes the shard's write lock, which excludes
/// in-flight increments on that shard: an increment can't land on a cell that
/// is being removed.
pub struct ConcurrentHashCounter<K: ?Sized, H> {
    entries: DashMap<Fingerprint, AtomicU64>,
    hash: H,
    _key: PhantomData<fn(&K)>,
}

impl<K: ?Sized, H: HashProvider<K>> ConcurrentHashCounter<K, H> {
    pub fn new(hash: H) -> Self {
        Self { entries: DashMap::new(), hash, _key: PhantomData }
    }

    fn increment(&self, fingerprint: Fingerprint) -> u64 {
        if let Some(cell) = self.entries.get(&fingerprint) {
            return cell.fetch_add(1, Ordering::AcqRel);
        }
        self.entries
            .entry(fingerprint)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::AcqRel)
    }
}

impl<K: ?Sized, H: HashProvider<K>> Counter<K> for ConcurrentHashCounter<K, H> {
    fn report(&self, key: &K) -> (u64, Fingerprint) {
        let fingerprint = self.hash.get(key);
        (self.increment(fingerprint), fingerprint)
    }

    fn reset(&self, fingerprint: Fingerprint) {
        self.entries.remove(&fingerprint);
    }

    fn drain(&self) {
        self.entries.clear();
    }

    fn count(&self, fingerprint: Fingerprint) -> Option<u64> {
        self.entries
            .get(&fingerprint)
            .map(|cell| cell.load(Ordering::Acquire))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
