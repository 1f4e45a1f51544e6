//! Read interface over the sensor database.
//!
//! The store is an ordered key-value store holding sorted sets of
//! `(member, score)` pairs plus a few plain sets, hashes and strings. This
//! crate only ever reads from it.

use std::collections::{BTreeSet, HashMap};

use crate::error::Result;

/// Accumulated occurrence count of a member.
pub type Score = f64;

/// Read operations the aggregation engine needs from the sensor database.
///
/// Every method treats a missing key as empty: `Ok(false)`, `Ok(None)` or an
/// empty collection. Errors are reserved for store failures.
pub trait ScoreStore: Send + Sync {
    /// Whether `key` holds any value.
    fn exists(&self, key: &str) -> Result<bool>;

    /// Score of `member` in the sorted set `key`.
    fn score_of(&self, key: &str, member: &str) -> Result<Option<Score>>;

    /// Members of `key` with `min <= score <= max`, highest score first.
    fn descending_range(&self, key: &str, min: Score, max: Score) -> Result<Vec<(String, Score)>>;

    /// The `count` highest-ranked members of `key`, highest score first.
    fn top(&self, key: &str, count: usize) -> Result<Vec<(String, Score)>>;

    /// Whether `value` belongs to the plain set `set_key`.
    fn is_member(&self, set_key: &str, value: &str) -> Result<bool>;

    /// Every member of the plain set `set_key`.
    fn members_of(&self, set_key: &str) -> Result<BTreeSet<String>>;

    /// Value of `field` in the hash `key`.
    fn hash_field(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Value of the string `key`.
    fn string(&self, key: &str) -> Result<Option<String>>;
}

/// In-memory [`ScoreStore`], mirroring Redis ordering rules.
///
/// Used by tests and for offline fixtures.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sorted: HashMap<String, HashMap<String, Score>>,
    sets: HashMap<String, BTreeSet<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
    strings: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `score` to `member` in the sorted set `key` (like `ZINCRBY`).
    pub fn add_score(&mut self, key: &str, member: &str, score: Score) -> &mut Self {
        *self
            .sorted
            .entry(key.to_string())
            .or_default()
            .entry(member.to_string())
            .or_insert(0.0) += score;
        self
    }

    /// Add every `(member, score)` pair to the sorted set `key`.
    pub fn with_scores(mut self, key: &str, scores: &[(&str, Score)]) -> Self {
        for (member, score) in scores {
            self.add_score(key, member, *score);
        }
        self
    }

    pub fn add_to_set(&mut self, set_key: &str, value: &str) -> &mut Self {
        self.sets
            .entry(set_key.to_string())
            .or_default()
            .insert(value.to_string());
        self
    }

    pub fn set_hash_field(&mut self, key: &str, field: &str, value: &str) -> &mut Self {
        self.hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        self
    }

    pub fn set_string(&mut self, key: &str, value: &str) -> &mut Self {
        self.strings.insert(key.to_string(), value.to_string());
        self
    }

    /// Members of `key` ordered like `ZREVRANGE`: score descending, then
    /// member descending.
    fn ranked(&self, key: &str) -> Vec<(String, Score)> {
        let mut entries: Vec<(String, Score)> = self
            .sorted
            .get(key)
            .map(|set| set.iter().map(|(m, s)| (m.clone(), *s)).collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
        entries
    }
}

impl ScoreStore for MemoryStore {
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.sorted.contains_key(key)
            || self.sets.contains_key(key)
            || self.hashes.contains_key(key)
            || self.strings.contains_key(key))
    }

    fn score_of(&self, key: &str, member: &str) -> Result<Option<Score>> {
        Ok(self.sorted.get(key).and_then(|set| set.get(member).copied()))
    }

    fn descending_range(&self, key: &str, min: Score, max: Score) -> Result<Vec<(String, Score)>> {
        Ok(self
            .ranked(key)
            .into_iter()
            .filter(|(_, score)| *score >= min && *score <= max)
            .collect())
    }

    fn top(&self, key: &str, count: usize) -> Result<Vec<(String, Score)>> {
        Ok(self.ranked(key).into_iter().take(count).collect())
    }

    fn is_member(&self, set_key: &str, value: &str) -> Result<bool> {
        Ok(self.sets.get(set_key).is_some_and(|set| set.contains(value)))
    }

    fn members_of(&self, set_key: &str) -> Result<BTreeSet<String>> {
        Ok(self.sets.get(set_key).cloned().unwrap_or_default())
    }

    fn hash_field(&self, key: &str, field: &str) -> Result<Option<String>> {
        Ok(self.hashes.get(key).and_then(|hash| hash.get(field).cloned()))
    }

    fn string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.strings.get(key).cloned())
    }
}
