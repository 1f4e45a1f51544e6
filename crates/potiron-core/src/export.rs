//! Ranking accumulated scores and writing them out.

use std::cmp::Ordering;
use std::io;

use metrics::counter;
use serde::Serialize;

use crate::aggregate::{ScoreMapping, SkipSet};
use crate::annotate::FieldAnnotator;
use crate::error::Result;
use crate::store::Score;

/// One exported row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRecord {
    pub member: String,
    /// Suffix appended to the member in the `id` column.
    pub annotation: String,
    pub score: Score,
}

/// Every member of `scores`, highest score first.
///
/// Equal scores are ordered by member, so the ranking never depends on how
/// the mapping was built.
pub fn rank(scores: &ScoreMapping) -> Vec<(&str, Score)> {
    let mut ranked: Vec<(&str, Score)> = scores.iter().collect();
    ranked.sort_by(|a, b| rank_order(*a, *b));
    ranked
}

/// Ranking order shared by exports and dashboard queries: score descending,
/// then member ascending.
pub(crate) fn rank_order(a: (&str, Score), b: (&str, Score)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

/// The `limit` best-ranked members of `scores` that are not in `export_skip`.
///
/// Skipped members do not count against the limit.
pub fn export(
    scores: &ScoreMapping,
    export_skip: &SkipSet,
    limit: usize,
    annotator: &dyn FieldAnnotator,
) -> Result<Vec<RankedRecord>> {
    let mut records = Vec::with_capacity(limit.min(scores.len()));
    for (member, score) in rank(scores) {
        if records.len() >= limit {
            break;
        }
        if export_skip.contains(member) {
            continue;
        }
        records.push(RankedRecord {
            member: member.to_string(),
            annotation: annotator.annotate(member)?,
            score,
        });
    }

    counter!("potiron_records_exported_total").increment(records.len() as u64);
    Ok(records)
}

/// Write `records` as CSV with an `id,value` header.
///
/// The `id` column holds the annotated member, `value` the score truncated to
/// an integer.
pub fn write_csv<W: io::Write>(writer: W, records: &[RankedRecord]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["id", "value"])?;
    for record in records {
        let id = format!("{}{}", record.member, record.annotation);
        let value = format!("{}", record.score.trunc() as u64);
        csv.write_record([id.as_str(), value.as_str()])?;
    }
    csv.flush()?;
    Ok(())
}
