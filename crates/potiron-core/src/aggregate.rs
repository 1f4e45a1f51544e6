//! Merging day keys into accumulated score mappings.

use std::collections::{HashMap, HashSet};

use metrics::counter;
use serde::Serialize;

use crate::error::Result;
use crate::key::SourceKey;
use crate::store::{Score, ScoreStore};

/// Accumulated score per member.
///
/// Built by repeated [`merge`] calls; iteration order is unspecified, ranking
/// happens in [`crate::rank`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScoreMapping {
    scores: HashMap<String, Score>,
}

impl ScoreMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `score` to `member`, creating it at zero if absent.
    pub fn add(&mut self, member: &str, score: Score) {
        match self.scores.get_mut(member) {
            Some(total) => *total += score,
            None => {
                self.scores.insert(member.to_string(), score);
            }
        }
    }

    pub fn get(&self, member: &str) -> Option<Score> {
        self.scores.get(member).copied()
    }

    pub fn contains(&self, member: &str) -> bool {
        self.scores.contains_key(member)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Score)> {
        self.scores.iter().map(|(m, s)| (m.as_str(), *s))
    }
}

impl<S: Into<String>> FromIterator<(S, Score)> for ScoreMapping {
    fn from_iter<I: IntoIterator<Item = (S, Score)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (member, score) in iter {
            mapping.add(&member.into(), score);
        }
        mapping
    }
}

/// Members excluded from accumulation or from export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipSet {
    members: HashSet<String>,
}

impl SkipSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, member: impl Into<String>) -> bool {
        self.members.insert(member.into())
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.contains(member)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for SkipSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// The two independent skip sets of an export run.
///
/// `accumulation` keeps members out of every mapping (including the general
/// one); `export` drops members from the ranked output without counting them
/// against the limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipLists {
    pub accumulation: SkipSet,
    pub export: SkipSet,
}

impl SkipLists {
    /// Use the same members at both stages.
    pub fn shared(skip: SkipSet) -> Self {
        Self {
            accumulation: skip.clone(),
            export: skip,
        }
    }
}

/// Merge the sorted set `key` into `accumulator` and, when given, `general`.
///
/// Returns `Ok(false)` without touching either mapping when the key does not
/// exist. Members in `accumulation_skip` contribute to neither mapping.
pub fn merge(
    store: &dyn ScoreStore,
    key: &SourceKey,
    accumulator: &mut ScoreMapping,
    mut general: Option<&mut ScoreMapping>,
    accumulation_skip: &SkipSet,
) -> Result<bool> {
    if !store.exists(key.as_str())? {
        tracing::debug!(key = %key, "no data for key");
        counter!("potiron_keys_missing_total").increment(1);
        return Ok(false);
    }

    let mut merged = 0usize;
    for (member, score) in store.descending_range(key.as_str(), 0.0, Score::MAX)? {
        if accumulation_skip.contains(&member) {
            continue;
        }
        accumulator.add(&member, score);
        if let Some(general) = general.as_deref_mut() {
            general.add(&member, score);
        }
        merged += 1;
    }

    tracing::trace!(key = %key, members = merged, "merged key");
    counter!("potiron_keys_merged_total").increment(1);
    Ok(true)
}

/// Merge every key of a window (rolling or calendar) into one mapping.
///
/// Returns the mapping and whether at least one key existed.
pub fn aggregate_keys<'a>(
    store: &dyn ScoreStore,
    keys: impl IntoIterator<Item = &'a SourceKey>,
    accumulation_skip: &SkipSet,
) -> Result<(ScoreMapping, bool)> {
    let mut scores = ScoreMapping::new();
    let mut found = false;
    for key in keys {
        found |= merge(store, key, &mut scores, None, accumulation_skip)?;
    }
    Ok((scores, found))
}

/// Result of aggregating one field over one month.
#[derive(Debug, Clone, PartialEq)]
pub enum MonthAggregate {
    /// One mapping per protocol that had data, in catalog order, plus the
    /// cross-protocol total.
    PerProtocol {
        protocols: Vec<(String, ScoreMapping)>,
        general: ScoreMapping,
    },
    /// A single mapping over every key of the month.
    Single(ScoreMapping),
    /// No key of the month existed.
    Empty,
}
