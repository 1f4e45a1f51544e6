//! Export one month of Potiron data from Redis to ranked CSV files.
//!
//! # Usage
//!
//! ```bash
//! # Top 10 destination ports of January, per protocol
//! potiron-export --source chp-5890-1 --date 2024-01 --field dport \
//!     --redis-url redis+unix:///var/run/redis/redis.sock \
//!     --protocols-file doc/protocols
//!
//! # Top 20, ignoring port 80 everywhere, all protocols in one file
//! potiron-export -s chp-5890-1 -d 2024-01 -f dport -l 20 --skip 80 \
//!     --without-protocols --redis-url redis://127.0.0.1:6379
//!
//! # With metrics
//! potiron-export -d 2024-01 -f dport -u redis://127.0.0.1:6379 --metrics-port 9091
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use potiron_core::metrics::{init_metrics, start_metrics_server};
use potiron_core::{ProtocolCatalog, RedisStore, Session, SkipLists, SkipSet, YearMonth};
use potiron_export::{DEFAULT_LIMIT, ExportConfig, run};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "potiron-export")]
#[command(about = "Export one month of sensor data from Redis as ranked CSV files")]
#[command(version)]
struct Args {
    /// Sensor used as source (e.g. "chp-5890-1")
    #[arg(long, short, default_value = "potiron")]
    source: String,

    /// Month to export (YYYY-MM)
    #[arg(long, short)]
    date: String,

    /// Field to rank (e.g. "dport")
    #[arg(long, short)]
    field: String,

    /// Number of values to export per file
    #[arg(long, short, default_value_t = DEFAULT_LIMIT)]
    limit: usize,

    /// Value left out of the aggregation (repeatable)
    #[arg(long)]
    skip: Vec<String>,

    /// Value left out of the ranked files only (repeatable, defaults to --skip)
    #[arg(long)]
    export_skip: Option<Vec<String>>,

    /// Output directory
    #[arg(long, short, default_value = "./out/")]
    outputdir: PathBuf,

    /// Redis URL (e.g. redis+unix:///var/run/redis/redis.sock)
    #[arg(long, short = 'u', env = "POTIRON_REDIS_URL")]
    redis_url: String,

    /// Protocol catalog, one "<number> <name>" per line
    #[arg(long, default_value = "doc/protocols")]
    protocols_file: PathBuf,

    /// Sum every protocol into a single file instead of one file per protocol
    #[arg(long, short = 'p')]
    without_protocols: bool,

    /// Prometheus metrics port (0 to disable)
    #[arg(long, default_value = "0")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Validate everything before touching the store.
    let month = YearMonth::parse(&args.date).context("--date must be formatted as YYYY-MM")?;
    let accumulation: SkipSet = args.skip.iter().cloned().collect();
    let skip = match &args.export_skip {
        Some(values) => SkipLists {
            accumulation,
            export: values.iter().cloned().collect(),
        },
        None => SkipLists::shared(accumulation),
    };

    let catalog = if args.protocols_file.exists() {
        ProtocolCatalog::load(&args.protocols_file).with_context(|| {
            format!("Failed to load protocol catalog {}", args.protocols_file.display())
        })?
    } else {
        tracing::warn!(
            path = %args.protocols_file.display(),
            "protocol catalog not found, protocol-aware keys unavailable"
        );
        ProtocolCatalog::default()
    };

    if args.metrics_port > 0 {
        if let Some(handle) = init_metrics() {
            start_metrics_server(args.metrics_port, handle)
                .await
                .context("Failed to start metrics server")?;
        }
    }

    let store = RedisStore::open(&args.redis_url)
        .with_context(|| format!("Failed to connect to Redis at {}", args.redis_url))?;
    let session = Session::open(Arc::new(store), &args.source, catalog, !args.without_protocols)
        .context("Failed to open session")?;

    let config = ExportConfig {
        field: args.field,
        month,
        limit: args.limit,
        skip,
        output_dir: args.outputdir,
    };

    let (written, config) = tokio::task::spawn_blocking(move || {
        run(&session, &config).map(|written| (written, config))
    })
    .await
    .context("Export task failed")?
    .context("Export failed")?;
    tracing::info!(
        files = written.len(),
        field = %config.field,
        month = %config.month,
        "export complete"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_arguments() {
        assert!(Args::try_parse_from(["potiron-export", "-f", "dport", "-u", "redis://x"]).is_err());
        assert!(Args::try_parse_from(["potiron-export", "-d", "2024-01", "-u", "redis://x"]).is_err());
    }

    #[test]
    fn defaults_and_repeated_skips() {
        let args = Args::try_parse_from([
            "potiron-export",
            "-d",
            "2024-01",
            "-f",
            "dport",
            "-u",
            "redis://localhost",
            "--skip",
            "80",
            "--skip",
            "443",
        ])
        .unwrap();
        assert_eq!(args.source, "potiron");
        assert_eq!(args.limit, DEFAULT_LIMIT);
        assert_eq!(args.skip, ["80", "443"]);
        assert!(args.export_skip.is_none());
        assert!(!args.without_protocols);
        assert_eq!(args.outputdir, PathBuf::from("./out/"));
        assert_eq!(args.metrics_port, 0);
    }

    #[test]
    fn metrics_port_is_optional() {
        let args = Args::try_parse_from([
            "potiron-export",
            "-d",
            "2024-01",
            "-f",
            "dport",
            "-u",
            "redis://localhost",
            "--metrics-port",
            "9091",
        ])
        .unwrap();
        assert_eq!(args.metrics_port, 9091);
    }
}
