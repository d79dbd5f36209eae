use std::time::{Duration, Instant};

/// Fixed-width hash of a request key, used as the counter and queue index.
///
/// Not collision free: two keys with the same fingerprint share one counter
/// entry and one expiry slot.
pub type Fingerprint = u64;

/// Fingerprint returned for keys that could not be encoded.
pub const SENTINEL_FINGERPRINT: Fingerprint = 0;

/// A fingerprint together with the moment its first occurrence was recorded.
///
/// Records are created once per "first occurrence since last expiry" and are
/// never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryRecord {
    pub fingerprint: Fingerprint,
    pub enqueued_at: Instant,
}

impl ExpiryRecord {
    pub fn new(fingerprint: Fingerprint) -> Self {
        Self::at(fingerprint, Instant::now())
    }

    pub fn at(fingerprint: Fingerprint, enqueued_at: Instant) -> Self {
        Self { fingerprint, enqueued_at }
    }

    /// Whether `window` has fully elapsed since the record was enqueued.
    pub fn is_expired(&self, now: Instant, window: Duration) -> bool {
        match self.enqueued_at.checked_add(window) {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_exactly_at_deadline() {
        let start = Instant::now();
        let record = ExpiryRecord::at(7, start);
        let window = Duration::from_millis(100);

        assert!(!record.is_expired(start, window));
        assert!(!record.is_expired(start + Duration::from_millis(99), window));
        assert!(record.is_expired(start + window, window));
    }

    #[test]
    fn unrepresentable_deadline_never_expires() {
        let record = ExpiryRecord::new(7);
        assert!(!record.is_expired(Instant::now(), Duration::MAX));
    }
}
