//! Sorted set store: member -> score with a materialized ranking

use super::range::normalize;
use super::shared::{SharedMap, TypedStore};
use super::KeyType;
use crate::error::{CacheError, CacheResult};
use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Ranked {
    score: f64,
    member: Bytes,
}

/// Ranking order: higher score first, equal scores by member bytes ascending
fn by_rank(a: (f64, &[u8]), b: (f64, &[u8])) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1))
}

/// One sorted set
///
/// `scores` and `ranked` always hold the same members; `ranked` is kept in
/// ranking order on every score change, so rank and range are a binary
/// search or a slice away.
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    scores: HashMap<Bytes, f64>,
    ranked: Vec<Ranked>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Set a member's score, returns its previous score
    pub fn insert(&mut self, member: Bytes, score: f64) -> CacheResult<Option<f64>> {
        if score.is_nan() {
            return Err(CacheError::InvalidScore);
        }
        // fold -0.0 into 0.0 so both sort as one value
        let score = score + 0.0;

        let previous = self.scores.insert(member.clone(), score);
        if let Some(old) = previous {
            self.unrank(&member, old);
        }
        let at = self.search(&member, score).unwrap_or_else(|at| at);
        self.ranked.insert(at, Ranked { score, member });

        debug_assert_eq!(self.ranked.len(), self.scores.len());
        Ok(previous)
    }

    /// Remove a member, returns true if it was present
    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.unrank(member, score);
                true
            }
            None => false,
        }
    }

    /// Add `delta` to a member's score, starting from 0 if absent
    pub fn incr(&mut self, member: Bytes, delta: f64) -> CacheResult<f64> {
        let next = self.score(&member).unwrap_or(0.0) + delta;
        self.insert(member, next)?;
        Ok(next + 0.0)
    }

    /// 1-based position, highest score is rank 1
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        self.search(member, score).ok().map(|at| at + 1)
    }

    /// 1-based position counted from the lowest score
    pub fn rev_rank(&self, member: &[u8]) -> Option<usize> {
        self.rank(member).map(|rank| self.len() - rank + 1)
    }

    /// Members within `[start, stop]` in ranking order
    pub fn range(&self, start: i64, stop: i64) -> Vec<Bytes> {
        self.window(start, stop, false).map(|r| r.member.clone()).collect()
    }

    /// Members within `[start, stop]` counted from the lowest score
    pub fn rev_range(&self, start: i64, stop: i64) -> Vec<Bytes> {
        self.window(start, stop, true).map(|r| r.member.clone()).collect()
    }

    /// Like `range`, paired with scores
    pub fn range_with_scores(&self, start: i64, stop: i64) -> HashMap<Bytes, f64> {
        self.window(start, stop, false)
            .map(|r| (r.member.clone(), r.score))
            .collect()
    }

    /// Like `rev_range`, paired with scores
    pub fn rev_range_with_scores(&self, start: i64, stop: i64) -> HashMap<Bytes, f64> {
        self.window(start, stop, true)
            .map(|r| (r.member.clone(), r.score))
            .collect()
    }

    /// Members and scores in ranking order
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, f64)> + '_ {
        self.ranked.iter().map(|r| (&r.member, r.score))
    }

    fn window(
        &self,
        start: i64,
        stop: i64,
        reverse: bool,
    ) -> Box<dyn Iterator<Item = &Ranked> + '_> {
        let (from, to) = match normalize(start, stop, self.ranked.len()) {
            Some(bounds) => bounds,
            None => return Box::new(std::iter::empty()),
        };
        if reverse {
            Box::new(self.ranked.iter().rev().skip(from).take(to - from + 1))
        } else {
            Box::new(self.ranked[from..=to].iter())
        }
    }

    fn search(&self, member: &[u8], score: f64) -> Result<usize, usize> {
        self.ranked
            .binary_search_by(|probe| by_rank((probe.score, &probe.member[..]), (score, member)))
    }

    fn unrank(&mut self, member: &[u8], score: f64) {
        match self.search(member, score) {
            Ok(at) => {
                self.ranked.remove(at);
            }
            Err(_) => debug_assert!(false, "ranking out of sync with scores"),
        }
    }
}

/// key -> sorted set
///
/// Rank and range queries run under the shared lock.
pub struct SortedSetStore {
    items: SharedMap<SortedSet>,
}

impl SortedSetStore {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SortedSetStore {
            items: SharedMap::with_capacity(capacity),
        }
    }

    /// Set a member's score, creating the sorted set if absent
    ///
    /// Returns true if the sorted set already existed.
    pub fn zadd(
        &self,
        key: impl Into<Bytes>,
        member: impl Into<Bytes>,
        score: f64,
    ) -> CacheResult<bool> {
        if score.is_nan() {
            return Err(CacheError::InvalidScore);
        }
        let mut items = self.items.write();
        let (zset, existed) = items.get_or_insert_with(key.into(), SortedSet::new);
        zset.insert(member.into(), score)?;
        Ok(existed)
    }

    /// Remove a member, returns true if it was present
    pub fn zrem(&self, key: &[u8], member: &[u8]) -> bool {
        self.items
            .write()
            .get_mut(key)
            .map(|zset| zset.remove(member))
            .unwrap_or(false)
    }

    /// Add `delta` to a member's score, returns the new score
    ///
    /// Creates the sorted set and the member (at 0) as needed.
    pub fn zincr_by(
        &self,
        key: impl Into<Bytes>,
        member: impl Into<Bytes>,
        delta: f64,
    ) -> CacheResult<f64> {
        if delta.is_nan() {
            return Err(CacheError::InvalidScore);
        }
        let (key, member) = (key.into(), member.into());
        let mut items = self.items.write();
        let current = items.get(&key).and_then(|zset| zset.score(&member)).unwrap_or(0.0);
        // inf + -inf
        if (current + delta).is_nan() {
            return Err(CacheError::InvalidScore);
        }
        let (zset, _) = items.get_or_insert_with(key, SortedSet::new);
        zset.incr(member, delta)
    }

    /// Subtract `delta` from a member's score, returns the new score
    pub fn zdecr_by(
        &self,
        key: impl Into<Bytes>,
        member: impl Into<Bytes>,
        delta: f64,
    ) -> CacheResult<f64> {
        self.zincr_by(key, member, -delta)
    }

    /// Number of members, 0 if absent or expired
    pub fn zcard(&self, key: &[u8]) -> usize {
        self.items.read_live(key, SortedSet::len).unwrap_or(0)
    }

    pub fn zscore(&self, key: &[u8], member: &[u8]) -> Option<f64> {
        self.items.read_live(key, |zset| zset.score(member)).flatten()
    }

    /// 1-based rank by descending score, `None` if key or member is absent
    pub fn zrank(&self, key: &[u8], member: &[u8]) -> Option<usize> {
        self.items.read_live(key, |zset| zset.rank(member)).flatten()
    }

    /// 1-based rank by ascending score
    pub fn zrevrank(&self, key: &[u8], member: &[u8]) -> Option<usize> {
        self.items.read_live(key, |zset| zset.rev_rank(member)).flatten()
    }

    pub fn zrank_with_score(&self, key: &[u8], member: &[u8]) -> Option<(usize, f64)> {
        self.items
            .read_live(key, |zset| Some((zset.rank(member)?, zset.score(member)?)))
            .flatten()
    }

    pub fn zrevrank_with_score(&self, key: &[u8], member: &[u8]) -> Option<(usize, f64)> {
        self.items
            .read_live(key, |zset| Some((zset.rev_rank(member)?, zset.score(member)?)))
            .flatten()
    }

    /// Members in `[start, stop]` by descending score
    pub fn zrange(&self, key: &[u8], start: i64, stop: i64) -> CacheResult<Vec<Bytes>> {
        self.query(key, start, stop, |zset| zset.range(start, stop))
    }

    /// Members in `[start, stop]` by ascending score
    pub fn zrevrange(&self, key: &[u8], start: i64, stop: i64) -> CacheResult<Vec<Bytes>> {
        self.query(key, start, stop, |zset| zset.rev_range(start, stop))
    }

    /// Same selection as `zrange`, as member -> score
    pub fn zrange_with_score(
        &self,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> CacheResult<HashMap<Bytes, f64>> {
        self.query(key, start, stop, |zset| zset.range_with_scores(start, stop))
    }

    /// Same selection as `zrevrange`, as member -> score
    pub fn zrevrange_with_score(
        &self,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> CacheResult<HashMap<Bytes, f64>> {
        self.query(key, start, stop, |zset| zset.rev_range_with_scores(start, stop))
    }

    fn query<R>(
        &self,
        key: &[u8],
        start: i64,
        stop: i64,
        f: impl FnOnce(&SortedSet) -> R,
    ) -> CacheResult<R> {
        if start > stop {
            return Err(CacheError::InvalidRange { start, stop });
        }
        self.items.read_live(key, f).ok_or(CacheError::KeyNotFound)
    }
}

impl Default for SortedSetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TypedStore for SortedSetStore {
    type Value = SortedSet;
    const KIND: KeyType = KeyType::SortedSet;

    fn shared(&self) -> &SharedMap<SortedSet> {
        &self.items
    }
}
