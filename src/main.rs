mod collectors;
mod config;
mod error;
mod models;
mod sink;
mod util;

use anyhow::Result;
use clap::Parser;
use collectors::diskspace::{CycleSummary, DiskSpaceCollector};
use collectors::host::{RealHost, TimedHost};
use config::Config;
use error::CollectError;
use models::unit::ByteUnit;
use sink::LineSink;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Every per-path query against the real host is bounded by `stat_timeout_ms`.
type Host = TimedHost<RealHost>;

#[derive(Parser, Debug)]
#[command(name = "dspace", about = "Per-filesystem disk space and inode metrics", version)]
struct Cli {
    /// Config file (default: ~/.config/dspace/dspace.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Seconds between collection cycles (overrides the config file)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Space unit to report in; repeat for several (overrides the config file)
    #[arg(short, long = "unit", value_name = "UNIT")]
    units: Vec<ByteUnit>,

    /// Measure only this path instead of scanning the mount table
    #[arg(short, long, value_name = "PATH")]
    path: Option<PathBuf>,

    /// Run a single collection cycle and exit
    #[arg(long)]
    once: bool,

    /// Print a one-shot JSON snapshot of all filesystems and exit
    #[arg(long)]
    json: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let mut cfg = Config::load(cli.config.as_deref())?;
    if let Some(secs) = cli.interval { cfg.general.interval_sec = secs; }
    if !cli.units.is_empty() { cfg.diskspace.byte_unit = cli.units.clone(); }
    if cli.path.is_some() { cfg.diskspace.path = cli.path.clone(); }

    if cli.print_config {
        return run_print_config(&cfg, cli.config.as_deref());
    }

    let host: Host = TimedHost::new(RealHost::new(&cfg.general.mounts_path), cfg.general.stat_timeout());
    let collector = DiskSpaceCollector::new(host, &cfg.diskspace);

    if cli.json {
        return run_json_snapshot(&collector);
    }
    if cli.once {
        let summary = run_cycle(&collector, &cfg.general.metric_prefix)?;
        info!("{} filesystem(s), {} metric(s), {} failure(s)", summary.filesystems, summary.metrics, summary.failures);
        return Ok(());
    }

    run_daemon(&collector, &cfg)
}

/// Default level is INFO; `RUST_LOG` directives are applied on top.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run_cycle(collector: &DiskSpaceCollector<Host>, prefix: &str) -> Result<CycleSummary, CollectError> {
    let stdout = io::stdout();
    let mut sink = LineSink::new(stdout.lock(), prefix, chrono::Utc::now().timestamp());
    collector.collect(&mut sink)
}

fn run_daemon(collector: &DiskSpaceCollector<Host>, cfg: &Config) -> Result<()> {
    let interval = cfg.general.interval();
    let units: Vec<String> = collector.units().iter().map(|u| u.to_string()).collect();
    info!("dspace {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}s, units=[{}], mounts={}",
        interval.as_secs(),
        units.join(", "),
        cfg.general.mounts_path.display()
    );

    loop {
        let started = Instant::now();
        match run_cycle(collector, &cfg.general.metric_prefix) {
            Ok(summary) if summary.failures > 0 => warn!(
                "cycle finished: {} filesystem(s), {} skipped",
                summary.filesystems, summary.failures
            ),
            Ok(_) => {}
            Err(e) => error!("collection cycle failed: {}", e),
        }

        let elapsed = started.elapsed();
        if elapsed > interval {
            warn!("cycle took {}ms, longer than the {}s interval", elapsed.as_millis(), interval.as_secs());
        }
        std::thread::sleep(interval.saturating_sub(elapsed).max(Duration::from_millis(100)));
    }
}

fn run_json_snapshot(collector: &DiskSpaceCollector<Host>) -> Result<()> {
    use serde_json::{json, Value};
    use util::human::fmt_bytes;

    let snap = collector.snapshot()?;

    let filesystems: Vec<Value> = snap.filesystems.iter().map(|fs| {
        let s = &fs.sample;
        json!({
            "mountpoint":   fs.path,
            "prefix":       fs.prefix,
            "device":       fs.entry.as_ref().map(|e| e.device.clone()),
            "fstype":       fs.entry.as_ref().map(|e| e.fs_type.clone()),
            "device_id":    fs.entry.as_ref().map(|e| e.device_id.to_string()),
            "total":        s.total_bytes(),
            "used":         s.used_bytes(),
            "free":         s.free_bytes(),
            "avail":        s.avail_bytes(),
            "total_hr":     fmt_bytes(s.total_bytes()),
            "used_hr":      fmt_bytes(s.used_bytes()),
            "avail_hr":     fmt_bytes(s.avail_bytes()),
            "avail_pct":    s.avail_pct(),
            "inodes_total": s.total_inodes,
            "inodes_used":  s.inodes_used(),
            "inodes_free":  s.inodes_free(),
            "inodes_avail": s.inodes_avail(),
            "metrics":      collector.metrics_for(fs),
        })
    }).collect();

    let snapshot = json!({
        "dspace_version": env!("CARGO_PKG_VERSION"),
        "timestamp":      chrono::Local::now().to_rfc3339(),
        "filesystems":    filesystems,
        "failures":       snap.failures,
    });

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn run_print_config(cfg: &Config, explicit: Option<&std::path::Path>) -> Result<()> {
    let path = explicit
        .map(|p| p.to_path_buf())
        .or_else(Config::config_path)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    println!("# Config: {}", path);
    println!();
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
