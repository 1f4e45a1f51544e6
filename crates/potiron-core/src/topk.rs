//! Per-day top-K summaries for the dashboard.

use chrono::NaiveDate;
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::annotate::KeyTranslator;
use crate::error::Result;
use crate::evolution::{EvolutionPoint, evolve};
use crate::export::rank_order;
use crate::key::FieldKey;
use crate::store::{Score, ScoreStore};

/// Entries listed per field.
pub const DEFAULT_TOP_K: usize = 10;

/// Entries whose evolution is charted.
pub const DEFAULT_LEGEND_SIZE: usize = 3;

/// Knobs for [`top_k`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopKOptions {
    pub k: usize,
    pub legend_size: usize,
    /// Trailing days of evolution shown before the requested day.
    pub window: u32,
}

impl Default for TopKOptions {
    fn default() -> Self {
        Self {
            k: DEFAULT_TOP_K,
            legend_size: DEFAULT_LEGEND_SIZE,
            window: 7,
        }
    }
}

/// A ranked value with its display label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopEntry {
    /// Translated label.
    pub key: String,
    /// Value as stored.
    pub member: String,
    pub score: Score,
}

/// Top values of one field on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTop {
    pub name: String,
    pub description: String,
    pub entries: Vec<TopEntry>,
    /// Scores of the legend members, positionally aligned with `legend`.
    pub evolution: Vec<EvolutionPoint>,
    /// Translated labels of the first entries.
    pub legend: Vec<String>,
}

impl FieldTop {
    /// CSV header line for the evolution chart: `Date,<label>,...`.
    pub fn legend_header(&self) -> String {
        let mut header = String::from("Date");
        for label in &self.legend {
            header.push(',');
            header.push_str(label);
        }
        header
    }
}

/// Top `options.k` values of every field on `day`, with the recent
/// evolution of the first `options.legend_size` of them.
///
/// A field without data yields no entries and an all-empty evolution.
pub fn top_k(
    store: &dyn ScoreStore,
    translator: &dyn KeyTranslator,
    source: &str,
    day: NaiveDate,
    fields: &[String],
    options: TopKOptions,
) -> Result<Vec<FieldTop>> {
    counter!("potiron_topk_queries_total").increment(1);

    let mut tops = Vec::with_capacity(fields.len());
    for field in fields {
        let field_key = FieldKey::new(source, field)?;
        let key = field_key.for_day(day);

        let ranked = ranked_top(store, key.as_str(), options.k)?;
        let legend_members: Vec<String> = ranked
            .iter()
            .take(options.legend_size)
            .map(|(member, _)| member.clone())
            .collect();

        let entries = ranked
            .into_iter()
            .map(|(member, score)| {
                Ok(TopEntry {
                    key: translator.to_human(field, &member)?,
                    member,
                    score,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let legend = legend_members
            .iter()
            .map(|member| translator.to_human(field, member))
            .collect::<Result<Vec<_>>>()?;

        let evolution = evolve(store, &field_key, &legend_members, day, options.window)?;

        tracing::debug!(key = %key, entries = entries.len(), "top values loaded");
        tops.push(FieldTop {
            name: field.clone(),
            description: translator.description(field)?,
            entries,
            evolution,
            legend,
        });
    }
    Ok(tops)
}

/// The `k` best members of `key` in [`crate::rank`] order.
///
/// The store breaks ties its own way, so every member tied with the last
/// fetched one is read before sorting and truncating.
fn ranked_top(store: &dyn ScoreStore, key: &str, k: usize) -> Result<Vec<(String, Score)>> {
    let mut ranked = store.top(key, k)?;
    if ranked.len() == k {
        if let Some(&(_, cutoff)) = ranked.last() {
            ranked.retain(|(_, score)| *score > cutoff);
            ranked.extend(store.descending_range(key, cutoff, cutoff)?);
        }
    }
    ranked.sort_by(|a, b| rank_order((a.0.as_str(), a.1), (b.0.as_str(), b.1)));
    ranked.truncate(k);
    Ok(ranked)
}
