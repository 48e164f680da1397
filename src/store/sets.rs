//! Set store: unordered unique members

use super::memory::Peek;
use super::shared::{SharedMap, TypedStore};
use super::KeyType;
use crate::error::{CacheError, CacheResult};
use bytes::Bytes;
use std::collections::HashSet;

type Members = HashSet<Bytes>;

/// key -> set of members
///
/// Membership reads run under the shared lock so they can proceed in
/// parallel.
pub struct SetStore {
    items: SharedMap<Members>,
}

impl SetStore {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SetStore {
            items: SharedMap::with_capacity(capacity),
        }
    }

    /// Add a member, creating the set if absent
    ///
    /// Adding a present member is a no-op. Returns true if the set
    /// already existed.
    pub fn sadd(&self, key: impl Into<Bytes>, member: impl Into<Bytes>) -> bool {
        let mut items = self.items.write();
        let (set, existed) = items.get_or_insert_with(key.into(), HashSet::new);
        set.insert(member.into());
        existed
    }

    /// Remove a member, returns true if it was present
    pub fn srem(&self, key: &[u8], member: &[u8]) -> bool {
        self.items
            .write()
            .get_mut(key)
            .map(|set| set.remove(member))
            .unwrap_or(false)
    }

    /// All members, in no particular order
    pub fn smembers(&self, key: &[u8]) -> CacheResult<Vec<Bytes>> {
        self.items
            .read_live(key, |set| set.iter().cloned().collect())
            .ok_or(CacheError::KeyNotFound)
    }

    pub fn sismember(&self, key: &[u8], member: &[u8]) -> CacheResult<bool> {
        self.items
            .read_live(key, |set| set.contains(member))
            .ok_or(CacheError::KeyNotFound)
    }

    /// Number of members, 0 if absent
    pub fn scard(&self, key: &[u8]) -> usize {
        self.items.read_live(key, HashSet::len).unwrap_or(0)
    }

    /// Members of either set
    ///
    /// A missing key contributes nothing. Neither source is modified.
    pub fn sunion(&self, first: &[u8], second: &[u8]) -> Members {
        self.combine(first, second, |a, b| match (a, b) {
            (Some(a), Some(b)) => a.union(b).cloned().collect(),
            (Some(only), None) | (None, Some(only)) => only.clone(),
            (None, None) => Members::new(),
        })
    }

    /// Members of both sets, empty unless both exist
    pub fn sinter(&self, first: &[u8], second: &[u8]) -> Members {
        self.combine(first, second, |a, b| match (a, b) {
            (Some(a), Some(b)) => b.iter().filter(|m| a.contains(*m)).cloned().collect(),
            _ => Members::new(),
        })
    }

    /// Run `f` over the live sets behind two keys
    ///
    /// Tries the shared lock first; if either key turns out expired, purges
    /// under the exclusive lock and answers from there.
    fn combine<R>(
        &self,
        first: &[u8],
        second: &[u8],
        f: impl FnOnce(Option<&Members>, Option<&Members>) -> R,
    ) -> R {
        {
            let sets = self.items.read();
            match (sets.peek(first), sets.peek(second)) {
                (Peek::Expired, _) | (_, Peek::Expired) => {}
                (a, b) => return f(live(a), live(b)),
            }
        }

        let mut sets = self.items.write();
        sets.remove_if_expired(first);
        sets.remove_if_expired(second);
        f(live(sets.peek(first)), live(sets.peek(second)))
    }
}

fn live<V>(peek: Peek<'_, V>) -> Option<&V> {
    match peek {
        Peek::Live(value) => Some(value),
        Peek::Expired | Peek::Missing => None,
    }
}

impl Default for SetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TypedStore for SetStore {
    type Value = Members;
    const KIND: KeyType = KeyType::Set;

    fn shared(&self) -> &SharedMap<Members> {
        &self.items
    }
}
