//! Core types and the score aggregation engine for Potiron.
//!
//! Potiron sensors count observed field values (destination ports, protocols,
//! ...) per day into sorted sets. This crate reads those sets back and turns
//! them into rankings:
//!
//! - Typed store keys ([`SourceKey`], [`FieldKey`]) and calendar helpers
//! - The [`ScoreStore`] read interface, with in-memory and Redis backends
//! - Aggregation of day keys into month leaderboards ([`merge`], [`Session::aggregate_month`])
//! - Deterministic ranking and CSV output ([`export`], [`write_csv`])
//! - Per-day evolution timelines and per-day top-K summaries
//! - Prometheus metrics helpers
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │  ScoreStore  │  Redis sorted sets (or MemoryStore in tests)
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐     ┌──────────────┐
//! │   Session    │────▶│ merge/export │  month leaderboards, CSV
//! └──────┬───────┘     └──────────────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │ top_k/evolve │  dashboard queries
//! └──────────────┘
//! ```

mod aggregate;
mod annotate;
mod error;
mod evolution;
mod export;
pub mod key;
pub mod metrics;
mod protocols;
mod redis_store;
mod session;
mod store;
mod topk;

pub use aggregate::{MonthAggregate, ScoreMapping, SkipLists, SkipSet, aggregate_keys, merge};
pub use annotate::{FieldAnnotator, KeyTranslator, NoAnnotation, StoreTranslator, TranslationAnnotator};
pub use error::{Error, Result};
pub use evolution::{DayScore, EvolutionPoint, evolve, member_history, trailing_days};
pub use export::{RankedRecord, export, rank, write_csv};
pub use key::{FieldKey, SourceKey, YearMonth};
pub use protocols::ProtocolCatalog;
pub use redis_store::RedisStore;
pub use session::{KeyMode, Session};
pub use store::{MemoryStore, Score, ScoreStore};
pub use topk::{
    DEFAULT_LEGEND_SIZE, DEFAULT_TOP_K, FieldTop, TopEntry, TopKOptions, top_k,
};
