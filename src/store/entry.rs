//! Entry envelope shared by every typed store

use std::time::{Duration, Instant};

/// A stored value plus its absolute expiration time
///
/// `expires_at == None` means the entry lives until it is deleted.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    /// The value
    pub value: V,

    /// Optional expiration time (absolute)
    pub expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    /// Create a new entry without expiration
    pub fn new(value: V) -> Self {
        Entry {
            value,
            expires_at: None,
        }
    }

    /// Create a new entry that expires `ttl` from now
    pub fn with_ttl(value: V, ttl: Duration) -> Self {
        Entry {
            value,
            expires_at: deadline(ttl),
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Check expiration against a caller-supplied clock reading
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Time left before expiration, `None` if the entry never expires
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| expires_at.saturating_duration_since(Instant::now()))
    }
}

/// Absolute deadline for a TTL starting now
///
/// A TTL too large to represent as an `Instant` is treated as "never".
pub(crate) fn deadline(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let entry = Entry::new(1u8);
        assert!(!entry.is_expired());
        assert_eq!(entry.remaining(), None);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let entry = Entry::with_ttl("v", Duration::from_millis(5));
        assert!(!entry.is_expired());
        assert!(entry.is_expired_at(Instant::now() + Duration::from_millis(10)));
    }

    #[test]
    fn test_huge_ttl_means_forever() {
        let entry = Entry::with_ttl((), Duration::MAX);
        assert_eq!(entry.expires_at, None);
    }
}
