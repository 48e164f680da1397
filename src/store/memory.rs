//! In-memory map with lazy expiration and a deadline index

use super::entry::{deadline, Entry};
use bytes::Bytes;
use serde::Serialize;
use siphasher::sip::SipHasher13;
use std::collections::{BTreeSet, HashMap};
use std::hash::BuildHasherDefault;
use std::time::{Duration, Instant};

/// Type alias for our hash map with SipHasher
type EntryMap<V> = HashMap<Bytes, Entry<V>, BuildHasherDefault<SipHasher13>>;

/// Result of a non-mutating lookup
///
/// Read-locked callers can't delete, so an expired entry is reported
/// back for the caller to purge under a write lock.
#[derive(Debug)]
pub enum Peek<'a, V> {
    Live(&'a V),
    Expired,
    Missing,
}

/// Remaining lifetime of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Key absent or expired
    Missing,
    /// Key present without expiration
    Forever,
    /// Key present, expires after this long
    Remaining(Duration),
}

/// Key -> entry map owned by one typed store
///
/// Every read path checks `expires_at` and drops expired entries before
/// answering, so an expired value is never observable. Entries carrying a
/// deadline are also indexed by that deadline so the active sweep can pop
/// the oldest expired keys without walking the map.
pub struct ExpiringMap<V> {
    /// The main storage map
    entries: EntryMap<V>,

    /// (deadline, key) for every entry with `expires_at = Some(deadline)`
    deadlines: BTreeSet<(Instant, Bytes)>,
}

impl<V> ExpiringMap<V> {
    /// Create a new map with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new map with specified initial capacity
    pub fn with_capacity(capacity: usize) -> Self {
        ExpiringMap {
            entries: HashMap::with_capacity_and_hasher(
                capacity,
                BuildHasherDefault::<SipHasher13>::default(),
            ),
            deadlines: BTreeSet::new(),
        }
    }

    /// Look a key up without deleting anything
    pub fn peek(&self, key: &[u8]) -> Peek<'_, V> {
        match self.entries.get(key) {
            None => Peek::Missing,
            Some(entry) if entry.is_expired() => Peek::Expired,
            Some(entry) => Peek::Live(&entry.value),
        }
    }

    /// Get a value by key, returns None if not found or expired
    pub fn get(&mut self, key: &[u8]) -> Option<&V> {
        if self.remove_if_expired(key) {
            return None;
        }
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Get a mutable reference to a value by key
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        if self.remove_if_expired(key) {
            return None;
        }
        self.entries.get_mut(key).map(|entry| &mut entry.value)
    }

    /// Get the live value for `key`, creating it with `make` if absent
    ///
    /// The flag is true when a live value already existed. A freshly
    /// created value has no expiration.
    pub fn get_or_insert_with(&mut self, key: Bytes, make: impl FnOnce() -> V) -> (&mut V, bool) {
        self.remove_if_expired(&key);
        let existed = self.entries.contains_key(&key);
        let entry = self.entries.entry(key).or_insert_with(|| Entry::new(make()));
        (&mut entry.value, existed)
    }

    /// Replace the value and expiration for `key`
    ///
    /// Returns true if a live value was replaced.
    pub fn insert(&mut self, key: Bytes, value: V, ttl: Option<Duration>) -> bool {
        let existed = match self.entries.remove(&key) {
            Some(old) => {
                self.unindex(&key, old.expires_at);
                !old.is_expired()
            }
            None => false,
        };

        let expires_at = ttl.and_then(deadline);
        self.index(&key, expires_at);
        self.entries.insert(key, Entry { value, expires_at });
        existed
    }

    /// Delete a key, returns true if a live value was removed
    pub fn remove(&mut self, key: &[u8]) -> bool {
        match self.entries.remove_entry(key) {
            Some((key, entry)) => {
                self.unindex(&key, entry.expires_at);
                !entry.is_expired()
            }
            None => false,
        }
    }

    /// Drop `key` if it is present and expired, returns true if dropped
    pub fn remove_if_expired(&mut self, key: &[u8]) -> bool {
        let expired = self
            .entries
            .get(key)
            .map(|entry| entry.is_expired())
            .unwrap_or(false);

        if expired {
            self.remove(key);
        }
        expired
    }

    /// Check if a key exists (and is not expired)
    pub fn contains(&mut self, key: &[u8]) -> bool {
        !self.remove_if_expired(key) && self.entries.contains_key(key)
    }

    /// Set the key to expire `ttl` from now, returns false if absent
    pub fn expire(&mut self, key: &[u8], ttl: Duration) -> bool {
        self.set_deadline(key, deadline(ttl))
    }

    /// Remove any expiration from the key, returns false if absent
    pub fn persist(&mut self, key: &[u8]) -> bool {
        self.set_deadline(key, None)
    }

    /// Remaining lifetime of the key
    pub fn ttl(&mut self, key: &[u8]) -> Ttl {
        if self.remove_if_expired(key) {
            return Ttl::Missing;
        }
        match self.entries.get(key) {
            Some(entry) => match entry.remaining() {
                Some(left) => Ttl::Remaining(left),
                None => Ttl::Forever,
            },
            None => Ttl::Missing,
        }
    }

    /// Remove up to `limit` expired entries, oldest deadline first
    ///
    /// Only the deadline index is consulted; live entries are never visited.
    /// Returns the removed keys.
    pub fn sweep(&mut self, limit: usize) -> Vec<Bytes> {
        let now = Instant::now();
        let mut removed = Vec::new();

        while removed.len() < limit {
            match self.deadlines.first() {
                Some((at, _)) if *at <= now => {}
                _ => break,
            }
            if let Some((_, key)) = self.deadlines.pop_first() {
                self.entries.remove(&key);
                removed.push(key);
            }
        }

        removed
    }

    /// Remove every expired entry, returns the removed keys
    pub fn clear_expired(&mut self) -> Vec<Bytes> {
        self.sweep(usize::MAX)
    }

    /// Remove all keys
    pub fn clear(&mut self) {
        self.entries.clear();
        self.deadlines.clear();
    }

    /// Number of physically present entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get statistics about the map
    pub fn stats(&self) -> StoreStats {
        let now = Instant::now();
        let expired_keys = self
            .deadlines
            .iter()
            .take_while(|(at, _)| *at <= now)
            .count();

        StoreStats {
            total_keys: self.entries.len(),
            expired_keys,
            active_keys: self.entries.len().saturating_sub(expired_keys),
            volatile_keys: self.deadlines.len(),
        }
    }

    fn set_deadline(&mut self, key: &[u8], expires_at: Option<Instant>) -> bool {
        if self.remove_if_expired(key) {
            return false;
        }
        let stored = match self.entries.get_key_value(key) {
            Some((stored, _)) => stored.clone(),
            None => return false,
        };
        let previous = match self.entries.get_mut(key) {
            Some(entry) => std::mem::replace(&mut entry.expires_at, expires_at),
            None => return false,
        };
        self.unindex(&stored, previous);
        self.index(&stored, expires_at);
        true
    }

    fn index(&mut self, key: &Bytes, expires_at: Option<Instant>) {
        if let Some(at) = expires_at {
            self.deadlines.insert((at, key.clone()));
        }
    }

    fn unindex(&mut self, key: &Bytes, expires_at: Option<Instant>) {
        if let Some(at) = expires_at {
            self.deadlines.remove(&(at, key.clone()));
        }
    }
}

impl<V> Default for ExpiringMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about one store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_keys: usize,
    pub expired_keys: usize,
    pub active_keys: usize,
    pub volatile_keys: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn key(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    #[test]
    fn test_insert_reports_existing() {
        let mut map = ExpiringMap::new();
        assert!(!map.insert(key("k"), 1, None));
        assert!(map.insert(key("k"), 2, None));
        assert_eq!(map.get(b"k"), Some(&2));
    }

    #[test]
    fn test_lazy_expiration() {
        let mut map = ExpiringMap::new();
        map.insert(key("k"), 1, Some(Duration::from_millis(1)));
        sleep(Duration::from_millis(5));

        assert!(matches!(map.peek(b"k"), Peek::Expired));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(b"k"), None);
        assert_eq!(map.len(), 0);
        assert_eq!(map.stats().volatile_keys, 0);
    }

    #[test]
    fn test_insert_over_expired_is_not_existing() {
        let mut map = ExpiringMap::new();
        map.insert(key("k"), 1, Some(Duration::from_millis(1)));
        sleep(Duration::from_millis(5));
        assert!(!map.insert(key("k"), 2, None));
        assert_eq!(map.ttl(b"k"), Ttl::Forever);
    }

    #[test]
    fn test_expire_and_persist() {
        let mut map = ExpiringMap::new();
        assert!(!map.expire(b"missing", Duration::from_secs(1)));

        map.insert(key("k"), 1, None);
        assert!(map.expire(b"k", Duration::from_secs(100)));
        match map.ttl(b"k") {
            Ttl::Remaining(left) => assert!(left <= Duration::from_secs(100)),
            other => panic!("unexpected ttl {:?}", other),
        }
        assert_eq!(map.stats().volatile_keys, 1);

        assert!(map.persist(b"k"));
        assert_eq!(map.ttl(b"k"), Ttl::Forever);
        assert_eq!(map.stats().volatile_keys, 0);
    }

    #[test]
    fn test_sweep_is_bounded() {
        let mut map = ExpiringMap::new();
        for i in 0..10 {
            map.insert(Bytes::from(format!("tmp{}", i)), i, Some(Duration::from_millis(1)));
        }
        map.insert(key("keep"), 99, None);
        map.insert(key("later"), 98, Some(Duration::from_secs(60)));
        sleep(Duration::from_millis(5));

        assert_eq!(map.stats().expired_keys, 10);
        assert_eq!(map.sweep(4).len(), 4);
        assert_eq!(map.len(), 8);

        let rest = map.clear_expired();
        assert_eq!(rest.len(), 6);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(b"keep"), Some(&99));
        assert_eq!(map.stats().volatile_keys, 1);
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut map: ExpiringMap<Vec<u8>> = ExpiringMap::new();
        let (value, existed) = map.get_or_insert_with(key("k"), Vec::new);
        value.push(1);
        assert!(!existed);

        let (value, existed) = map.get_or_insert_with(key("k"), Vec::new);
        assert!(existed);
        assert_eq!(value, &vec![1]);
    }

    #[test]
    fn test_clear() {
        let mut map = ExpiringMap::new();
        map.insert(key("a"), 1, Some(Duration::from_secs(5)));
        map.insert(key("b"), 2, None);
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.stats(), StoreStats::default());
    }
}
