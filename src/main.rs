use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser};
use color_eyre::Result;
use hostwatch::config::{Config, load_config, load_config_from_path};
use hostwatch::logging::init_tracing;
use hostwatch::metrics::{SamplingScheduler, default_collectors};
use hostwatch::report::Reporter;
use hostwatch::shutdown;
use hostwatch::system::backend::SysinfoBackend;
use hostwatch::system::history::HistoryExporter;
use hostwatch::system::process::FilterPolicy;
use hostwatch::system::scanner::ProcessScanner;
use hostwatch::system::snapshot::SnapshotTable;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "hostwatch",
    version,
    about = "Samples host metrics and logs the top resource-consuming processes"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Collector sampling interval in milliseconds
    #[arg(long)]
    sample_interval_ms: Option<u64>,

    /// Report and process scan interval in milliseconds
    #[arg(long)]
    report_interval_ms: Option<u64>,

    /// Stop after this many seconds (0 runs until interrupted)
    #[arg(long)]
    duration_secs: Option<u64>,

    /// CSV file receiving the top processes of each scan
    #[arg(long)]
    history_path: Option<PathBuf>,

    /// Do not write the history CSV
    #[arg(long, default_value_t = false)]
    no_history: bool,

    /// Number of processes per ranking
    #[arg(long)]
    top: Option<usize>,

    /// Activity filter: any (CPU or memory over threshold) or all (both)
    #[arg(long)]
    filter_policy: Option<FilterPolicy>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    let config = load_config_for_cli(&cli);

    run(config).await
}

async fn run(config: Config) -> Result<()> {
    let backend = Arc::new(SysinfoBackend::new(config.scanner.cpu_window()));
    let table = Arc::new(SnapshotTable::new());
    let (shutdown, listener) = shutdown::channel();

    let collectors = default_collectors(backend.clone(), &config.collectors.settings());
    let scheduler = SamplingScheduler::new(
        collectors,
        Arc::clone(&table),
        config.general.sample_interval(),
    )
    .start(listener.clone());

    let scanner = ProcessScanner::new(backend.clone(), backend, config.scanner.settings());
    let exporter = config
        .history
        .enabled
        .then(|| HistoryExporter::new(config.history.path.clone()));
    if let Some(exporter) = &exporter {
        info!(path = %exporter.path().display(), "writing process history");
    }
    let reporter = Reporter::new(
        Arc::clone(&table),
        scanner,
        exporter,
        config.general.report_interval(),
    );
    let reporter = tokio::spawn(reporter.run(listener));

    wait_for_stop(&config).await;
    shutdown.trigger();

    if let Err(err) = reporter.await {
        warn!("reporter task failed: {err}");
    }
    let applied = scheduler.join().await;
    info!(applied, "shutdown complete");
    Ok(())
}

async fn wait_for_stop(config: &Config) {
    let deadline = async {
        match config.general.run_duration() {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = deadline => info!("run duration elapsed"),
        _ = interrupted() => info!("interrupt received"),
    }
}

async fn interrupted() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {}
                    _ = sigterm.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(ms) = cli.sample_interval_ms {
        config.general.sample_interval_ms = ms;
    }
    if let Some(ms) = cli.report_interval_ms {
        config.general.report_interval_ms = ms;
    }
    if let Some(secs) = cli.duration_secs {
        config.general.run_duration_secs = secs;
    }
    if let Some(ref path) = cli.history_path {
        config.history.path = path.clone();
    }
    if cli.no_history {
        config.history.enabled = false;
    }
    if let Some(top) = cli.top {
        config.scanner.top_n = top;
    }
    if let Some(policy) = cli.filter_policy {
        config.scanner.filter_policy = policy;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_config() {
        let cli = Cli::parse_from([
            "hostwatch",
            "--config",
            "/nonexistent/hostwatch.toml",
            "--report-interval-ms",
            "500",
            "--top",
            "3",
            "--filter-policy",
            "all",
            "--no-history",
        ]);
        let config = load_config_for_cli(&cli);
        assert_eq!(config.general.report_interval_ms, 500);
        assert_eq!(config.scanner.top_n, 3);
        assert_eq!(config.scanner.filter_policy, FilterPolicy::All);
        assert!(!config.history.enabled);
        assert_eq!(config.general.sample_interval_ms, Config::default().general.sample_interval_ms);
    }
}
