//! Per-day score timelines over a trailing window.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::key::FieldKey;
use crate::store::{Score, ScoreStore};

/// Scores of a fixed member list on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionPoint {
    pub day: NaiveDate,
    /// One score per requested member, in request order.
    pub scores: Vec<Score>,
}

/// Score of a single member on one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayScore {
    pub day: NaiveDate,
    pub score: Score,
}

/// The `window` days before `anchor` followed by `anchor`, oldest first.
///
/// Calendar arithmetic, so daylight saving changes never skip or repeat a day.
pub fn trailing_days(anchor: NaiveDate, window: u32) -> Vec<NaiveDate> {
    (0..=window)
        .rev()
        .filter_map(|offset| anchor.checked_sub_days(Days::new(u64::from(offset))))
        .collect()
}

/// Scores of `members` for every day of the trailing window ending at `anchor`.
///
/// Returns `window + 1` points, oldest first. Members without data on a day
/// score zero, so every point has exactly `members.len()` scores.
pub fn evolve(
    store: &dyn ScoreStore,
    field_key: &FieldKey,
    members: &[String],
    anchor: NaiveDate,
    window: u32,
) -> Result<Vec<EvolutionPoint>> {
    trailing_days(anchor, window)
        .into_iter()
        .map(|day| {
            let key = field_key.for_day(day);
            let scores = members
                .iter()
                .map(|member| Ok(store.score_of(key.as_str(), member)?.unwrap_or(0.0)))
                .collect::<Result<Vec<_>>>()?;
            Ok(EvolutionPoint { day, scores })
        })
        .collect()
}

/// Timeline of one member over the trailing window ending at `anchor`.
pub fn member_history(
    store: &dyn ScoreStore,
    field_key: &FieldKey,
    member: &str,
    anchor: NaiveDate,
    window: u32,
) -> Result<Vec<DayScore>> {
    let members = [member.to_string()];
    Ok(evolve(store, field_key, &members, anchor, window)?
        .into_iter()
        .map(|point| DayScore {
            day: point.day,
            score: point.scores.first().copied().unwrap_or(0.0),
        })
        .collect())
}
