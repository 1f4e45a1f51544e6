//! Explicit context shared by every query against one sensor.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::aggregate::{MonthAggregate, ScoreMapping, SkipSet, merge};
use crate::annotate::StoreTranslator;
use crate::error::Result;
use crate::evolution::{DayScore, EvolutionPoint, evolve, member_history};
use crate::key::{self, FieldKey, YearMonth};
use crate::protocols::ProtocolCatalog;
use crate::store::ScoreStore;
use crate::topk::{FieldTop, TopKOptions, top_k};

/// Layout of the day keys the session reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// `source:day:field`; the store has no protocol dimension.
    Flat,
    /// `source:protocol:day:field`, summed over every protocol.
    Combined,
    /// `source:protocol:day:field`, one mapping per protocol plus a total.
    PerProtocol,
}

/// A sensor's store, protocol catalog and key layout.
///
/// The key layout is resolved once in [`Session::open`] and never re-read.
pub struct Session {
    store: Arc<dyn ScoreStore>,
    source: String,
    catalog: ProtocolCatalog,
    mode: KeyMode,
}

impl Session {
    /// Resolve the key layout for `source`.
    ///
    /// Protocol splitting needs combined keys in the store and a non-empty
    /// catalog; without them the session degrades to a layout it can read.
    pub fn open(
        store: Arc<dyn ScoreStore>,
        source: &str,
        catalog: ProtocolCatalog,
        split_protocols: bool,
    ) -> Result<Self> {
        key::validate_source(source)?;
        let combined = store.is_member(key::COMBINED_KEYS, key::COMBINED_KEYS_ENABLED)?;

        let mode = match (combined, catalog.is_empty(), split_protocols) {
            (false, _, true) => {
                tracing::info!(
                    "store does not support combined keys, continuing without per-protocol split"
                );
                KeyMode::Flat
            }
            (false, _, false) => KeyMode::Flat,
            (true, true, _) => {
                tracing::warn!(
                    "store uses combined keys but the protocol catalog is empty, reading flat keys"
                );
                KeyMode::Flat
            }
            (true, false, true) => KeyMode::PerProtocol,
            (true, false, false) => KeyMode::Combined,
        };

        tracing::info!(source = %source, mode = ?mode, protocols = catalog.len(), "session opened");
        Ok(Self {
            store,
            source: source.to_string(),
            catalog,
            mode,
        })
    }

    /// Session for read-only dashboard queries, which use flat day keys.
    pub fn flat(store: Arc<dyn ScoreStore>, source: &str) -> Result<Self> {
        key::validate_source(source)?;
        Ok(Self {
            store,
            source: source.to_string(),
            catalog: ProtocolCatalog::default(),
            mode: KeyMode::Flat,
        })
    }

    pub fn store(&self) -> &dyn ScoreStore {
        self.store.as_ref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn catalog(&self) -> &ProtocolCatalog {
        &self.catalog
    }

    pub fn mode(&self) -> KeyMode {
        self.mode
    }

    pub fn translator(&self) -> StoreTranslator<'_> {
        StoreTranslator::new(self.store())
    }

    /// Aggregate every day of `month` for `field`.
    pub fn aggregate_month(
        &self,
        field: &str,
        month: YearMonth,
        accumulation_skip: &SkipSet,
    ) -> Result<MonthAggregate> {
        let flat = FieldKey::new(&self.source, field)?;
        let store = self.store();

        match self.mode {
            KeyMode::PerProtocol => {
                let mut general = ScoreMapping::new();
                let mut protocols = Vec::new();
                for protocol in self.catalog.names() {
                    let field_key = flat.clone().with_protocol(protocol)?;
                    let mut scores = ScoreMapping::new();
                    let mut found = false;
                    for day in month.days() {
                        found |= merge(
                            store,
                            &field_key.for_day(day),
                            &mut scores,
                            Some(&mut general),
                            accumulation_skip,
                        )?;
                    }
                    if found {
                        protocols.push((protocol.to_string(), scores));
                    }
                }
                if protocols.is_empty() {
                    return Ok(MonthAggregate::Empty);
                }
                Ok(MonthAggregate::PerProtocol { protocols, general })
            }
            KeyMode::Combined => {
                let mut scores = ScoreMapping::new();
                let mut found = false;
                for protocol in self.catalog.names() {
                    let field_key = flat.clone().with_protocol(protocol)?;
                    for day in month.days() {
                        found |= merge(
                            store,
                            &field_key.for_day(day),
                            &mut scores,
                            None,
                            accumulation_skip,
                        )?;
                    }
                }
                Ok(single(scores, found))
            }
            KeyMode::Flat => {
                let mut scores = ScoreMapping::new();
                let mut found = false;
                for day in month.days() {
                    found |= merge(store, &flat.for_day(day), &mut scores, None, accumulation_skip)?;
                }
                Ok(single(scores, found))
            }
        }
    }

    /// Top values of `fields` on `day`.
    pub fn top_k(&self, day: NaiveDate, fields: &[String], options: TopKOptions) -> Result<Vec<FieldTop>> {
        top_k(self.store(), &self.translator(), &self.source, day, fields, options)
    }

    /// Daily scores of `members` of `field` over the window ending at `anchor`.
    pub fn evolve(
        &self,
        field: &str,
        members: &[String],
        anchor: NaiveDate,
        window: u32,
    ) -> Result<Vec<EvolutionPoint>> {
        let field_key = FieldKey::new(&self.source, field)?;
        evolve(self.store(), &field_key, members, anchor, window)
    }

    /// Daily scores of one member of `field` over the window ending at `anchor`.
    pub fn member_history(
        &self,
        field: &str,
        member: &str,
        anchor: NaiveDate,
        window: u32,
    ) -> Result<Vec<DayScore>> {
        let field_key = FieldKey::new(&self.source, field)?;
        member_history(self.store(), &field_key, member, anchor, window)
    }

    /// Most recent day listed in the `DAYS` set.
    pub fn latest_day(&self) -> Result<Option<NaiveDate>> {
        let days = self.store.members_of(key::DAYS)?;
        for raw in days.iter().rev() {
            match key::parse_day(raw) {
                Ok(day) => return Ok(Some(day)),
                Err(e) => tracing::warn!(day = %raw, error = %e, "ignoring malformed day entry"),
            }
        }
        Ok(None)
    }

    /// Every field known to the sensor.
    pub fn fields(&self) -> Result<BTreeSet<String>> {
        self.store.members_of(key::FIELDS)
    }

    /// Fields enabled for the dashboard.
    pub fn enabled_fields(&self) -> Result<BTreeSet<String>> {
        self.store.members_of(key::ENABLED_FIELDS)
    }

    pub fn is_known_field(&self, field: &str) -> Result<bool> {
        self.store.is_member(key::FIELDS, field)
    }
}

fn single(scores: ScoreMapping, found: bool) -> MonthAggregate {
    if found {
        MonthAggregate::Single(scores)
    } else {
        MonthAggregate::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn catalog() -> ProtocolCatalog {
        [(6, "tcp"), (17, "udp")].into_iter().collect()
    }

    fn combined_store() -> MemoryStore {
        let mut store = MemoryStore::new()
            .with_scores("src:tcp:20240101:dport", &[("80", 10.0), ("443", 5.0)])
            .with_scores("src:tcp:20240131:dport", &[("80", 1.0)])
            .with_scores("src:udp:20240102:dport", &[("53", 20.0), ("80", 2.0)])
            .with_scores("src:tcp:20240201:dport", &[("80", 1000.0)]);
        store.add_to_set(key::COMBINED_KEYS, key::COMBINED_KEYS_ENABLED);
        store
    }

    fn month() -> YearMonth {
        YearMonth::parse("2024-01").unwrap()
    }

    #[test]
    fn per_protocol_and_general_totals() {
        let session = Session::open(Arc::new(combined_store()), "src", catalog(), true).unwrap();
        assert_eq!(session.mode(), KeyMode::PerProtocol);

        let aggregate = session.aggregate_month("dport", month(), &SkipSet::new()).unwrap();
        let MonthAggregate::PerProtocol { protocols, general } = aggregate else {
            panic!("expected per-protocol aggregate");
        };
        assert_eq!(protocols.len(), 2);
        assert_eq!(protocols[0].0, "tcp");
        assert_eq!(protocols[0].1.get("80"), Some(11.0));
        assert_eq!(protocols[1].0, "udp");
        assert_eq!(protocols[1].1.get("53"), Some(20.0));
        assert_eq!(general.get("80"), Some(13.0));
        assert_eq!(general.get("443"), Some(5.0));
        assert_eq!(general.get("53"), Some(20.0));
    }

    #[test]
    fn general_matches_flattened_totals() {
        let store: Arc<dyn ScoreStore> = Arc::new(combined_store());
        let skip: SkipSet = ["443"].into_iter().collect();

        let split = Session::open(store.clone(), "src", catalog(), true).unwrap();
        let MonthAggregate::PerProtocol { general, .. } =
            split.aggregate_month("dport", month(), &skip).unwrap()
        else {
            panic!("expected per-protocol aggregate");
        };

        let flattened = Session::open(store, "src", catalog(), false).unwrap();
        assert_eq!(flattened.mode(), KeyMode::Combined);
        let MonthAggregate::Single(total) = flattened.aggregate_month("dport", month(), &skip).unwrap()
        else {
            panic!("expected single aggregate");
        };

        assert_eq!(general, total);
        assert!(!general.contains("443"));
    }

    #[test]
    fn unsupported_combined_keys_degrade_to_flat() {
        let store = MemoryStore::new()
            .with_scores("src:20240105:dport", &[("80", 3.0)])
            .with_scores("src:20240106:dport", &[("80", 4.0), ("22", 1.0)]);
        let session = Session::open(Arc::new(store), "src", catalog(), true).unwrap();
        assert_eq!(session.mode(), KeyMode::Flat);

        let MonthAggregate::Single(scores) =
            session.aggregate_month("dport", month(), &SkipSet::new()).unwrap()
        else {
            panic!("expected single aggregate");
        };
        assert_eq!(scores.get("80"), Some(7.0));
        assert_eq!(scores.get("22"), Some(1.0));
    }

    #[test]
    fn empty_catalog_reads_flat_keys() {
        let session = Session::open(Arc::new(combined_store()), "src", ProtocolCatalog::default(), true).unwrap();
        assert_eq!(session.mode(), KeyMode::Flat);
    }

    #[test]
    fn month_without_data_is_empty() {
        let split = Session::open(Arc::new(combined_store()), "src", catalog(), true).unwrap();
        let march = YearMonth::parse("2024-03").unwrap();
        assert_eq!(split.aggregate_month("dport", march, &SkipSet::new()).unwrap(), MonthAggregate::Empty);

        let flat = Session::flat(Arc::new(MemoryStore::new()), "src").unwrap();
        assert_eq!(flat.aggregate_month("dport", march, &SkipSet::new()).unwrap(), MonthAggregate::Empty);
    }

    #[test]
    fn invalid_source_rejected() {
        assert!(Session::flat(Arc::new(MemoryStore::new()), "a:b").is_err());
    }

    #[test]
    fn latest_day_and_fields() {
        let mut store = MemoryStore::new();
        store
            .add_to_set(key::DAYS, "20240114")
            .add_to_set(key::DAYS, "20240115")
            .add_to_set(key::DAYS, "garbage")
            .add_to_set(key::FIELDS, "dport")
            .add_to_set(key::FIELDS, "sport")
            .add_to_set(key::ENABLED_FIELDS, "dport");
        let session = Session::flat(Arc::new(store), "src").unwrap();

        assert_eq!(session.latest_day().unwrap(), NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(session.fields().unwrap().len(), 2);
        assert!(session.enabled_fields().unwrap().contains("dport"));
        assert!(session.is_known_field("sport").unwrap());
        assert!(!session.is_known_field("ttl").unwrap());
    }

    #[test]
    fn latest_day_none_without_days() {
        let session = Session::flat(Arc::new(MemoryStore::new()), "src").unwrap();
        assert_eq!(session.latest_day().unwrap(), None);
    }
}
