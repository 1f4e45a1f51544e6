//! Monthly CSV export of Potiron rankings.
//!
//! Aggregates one field over one month and writes one ranked CSV file per
//! mapping the session produces:
//!
//! | Key layout | Files |
//! |------------|-------|
//! | flat / combined | `<source>_<field>_<YYYY-MM>.csv` |
//! | per protocol | `<source>_<field>_<protocol>_<YYYY-MM>.csv` for each protocol with data, plus `<source>_<field>_with-protocols_<YYYY-MM>.csv` |
//!
//! A month without any data writes nothing.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use potiron_core::{
    MonthAggregate, Result, ScoreMapping, Session, SkipLists, TranslationAnnotator, YearMonth,
    export, write_csv,
};

/// Default number of ranked values per file.
pub const DEFAULT_LIMIT: usize = 10;

/// What to export and where.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub field: String,
    pub month: YearMonth,
    pub limit: usize,
    pub skip: SkipLists,
    pub output_dir: PathBuf,
}

/// A CSV file written by [`run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    /// Protocol of the mapping, `None` for flat and cross-protocol files.
    pub protocol: Option<String>,
    pub records: usize,
}

/// File name for one exported mapping.
pub fn file_name(source: &str, field: &str, month: YearMonth, part: Option<&str>) -> String {
    match part {
        Some(part) => format!("{source}_{field}_{part}_{month}.csv"),
        None => format!("{source}_{field}_{month}.csv"),
    }
}

/// Aggregate the configured month and write its CSV files.
pub fn run(session: &Session, config: &ExportConfig) -> Result<Vec<WrittenFile>> {
    let aggregate = session.aggregate_month(&config.field, config.month, &config.skip.accumulation)?;

    let mappings: Vec<(Option<String>, Option<&str>, &ScoreMapping)> = match &aggregate {
        MonthAggregate::Empty => {
            tracing::info!(
                field = %config.field,
                month = %config.month,
                "no data for month, nothing exported"
            );
            return Ok(Vec::new());
        }
        MonthAggregate::Single(scores) => vec![(None, None, scores)],
        MonthAggregate::PerProtocol { protocols, general } => protocols
            .iter()
            .map(|(protocol, scores)| (Some(protocol.clone()), Some(protocol.as_str()), scores))
            .chain(std::iter::once((None, Some("with-protocols"), general)))
            .collect(),
    };

    fs::create_dir_all(&config.output_dir)?;
    let translator = session.translator();
    let annotator = TranslationAnnotator::new(&translator, &config.field);

    let mut written = Vec::with_capacity(mappings.len());
    for (protocol, part, scores) in mappings {
        let records = export(scores, &config.skip.export, config.limit, &annotator)?;
        let path = config
            .output_dir
            .join(file_name(session.source(), &config.field, config.month, part));
        write_file(&path, &records)?;

        tracing::info!(path = %path.display(), records = records.len(), "ranking written");
        written.push(WrittenFile {
            path,
            protocol,
            records: records.len(),
        });
    }
    Ok(written)
}

fn write_file(path: &Path, records: &[potiron_core::RankedRecord]) -> Result<()> {
    let file = File::create(path)?;
    write_csv(BufWriter::new(file), records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use potiron_core::key::{COMBINED_KEYS, COMBINED_KEYS_ENABLED};
    use potiron_core::{MemoryStore, ProtocolCatalog, SkipSet};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn config(dir: &TempDir, skip: SkipLists) -> ExportConfig {
        ExportConfig {
            field: "dport".to_string(),
            month: YearMonth::parse("2024-01").unwrap(),
            limit: 2,
            skip,
            output_dir: dir.path().join("out"),
        }
    }

    fn flat_store() -> MemoryStore {
        let mut store = MemoryStore::new()
            .with_scores("src:20240103:dport", &[("80", 60.0), ("443", 20.0), ("22", 10.0)])
            .with_scores("src:20240117:dport", &[("80", 40.0), ("443", 30.0)]);
        store.set_hash_field("TR:dport", "80", "http");
        store
    }

    #[test]
    fn file_names() {
        let month = YearMonth::parse("2024-01").unwrap();
        assert_eq!(file_name("src", "dport", month, None), "src_dport_2024-01.csv");
        assert_eq!(file_name("src", "dport", month, Some("tcp")), "src_dport_tcp_2024-01.csv");
    }

    #[test]
    fn flat_month_writes_one_ranked_file() {
        let dir = TempDir::new().unwrap();
        let session = Session::flat(Arc::new(flat_store()), "src").unwrap();

        let written = run(&session, &config(&dir, SkipLists::default())).unwrap();

        assert_eq!(written.len(), 1);
        assert_eq!(written[0].records, 2);
        assert_eq!(written[0].protocol, None);
        assert!(written[0].path.ends_with("out/src_dport_2024-01.csv"));
        let contents = fs::read_to_string(&written[0].path).unwrap();
        assert_eq!(contents, "id,value\n80 (http),100\n443,50\n");
    }

    #[test]
    fn export_skip_keeps_limit() {
        let dir = TempDir::new().unwrap();
        let session = Session::flat(Arc::new(flat_store()), "src").unwrap();
        let skip = SkipLists {
            accumulation: SkipSet::new(),
            export: ["80"].into_iter().collect(),
        };

        let written = run(&session, &config(&dir, skip)).unwrap();

        let contents = fs::read_to_string(&written[0].path).unwrap();
        assert_eq!(contents, "id,value\n443,50\n22,10\n");
    }

    #[test]
    fn empty_month_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let session = Session::flat(Arc::new(MemoryStore::new()), "src").unwrap();

        let written = run(&session, &config(&dir, SkipLists::default())).unwrap();

        assert!(written.is_empty());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn per_protocol_month_writes_general_file() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::new()
            .with_scores("src:tcp:20240103:dport", &[("80", 5.0), ("443", 4.0)])
            .with_scores("src:udp:20240104:dport", &[("53", 9.0)]);
        store.add_to_set(COMBINED_KEYS, COMBINED_KEYS_ENABLED);
        let catalog: ProtocolCatalog = [(6, "tcp"), (17, "udp"), (1, "icmp")].into_iter().collect();
        let session = Session::open(Arc::new(store), "src", catalog, true).unwrap();
        let skip = SkipLists::shared(["443"].into_iter().collect());

        let written = run(&session, &config(&dir, skip)).unwrap();

        let names: Vec<_> = written
            .iter()
            .map(|w| w.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "src_dport_tcp_2024-01.csv",
                "src_dport_udp_2024-01.csv",
                "src_dport_with-protocols_2024-01.csv"
            ]
        );
        assert_eq!(written[0].protocol.as_deref(), Some("tcp"));
        assert_eq!(written[2].protocol, None);
        let general = fs::read_to_string(&written[2].path).unwrap();
        assert_eq!(general, "id,value\n53,9\n80,5\n");
    }
}
