//! Periodic console report: snapshot table plus a fresh process scan, with
//! the scan's rankings appended to the history log.

use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use crate::error::ScanError;
use crate::format::{format_bytes, format_duration};
use crate::metrics::MetricReading;
use crate::shutdown::ShutdownListener;
use crate::system::history::HistoryExporter;
use crate::system::process::ProcessSample;
use crate::system::scanner::{ProcessScanner, ScanOutcome};
use crate::system::snapshot::SnapshotTable;

pub const CPU_TITLE: &str = "====== Top CPU consuming processes =====";
pub const MEMORY_TITLE: &str = "====== Top RAM consuming processes =====";

pub struct Reporter {
    table: Arc<SnapshotTable>,
    scanner: ProcessScanner,
    exporter: Option<Arc<HistoryExporter>>,
    period: Duration,
}

impl Reporter {
    pub fn new(
        table: Arc<SnapshotTable>,
        scanner: ProcessScanner,
        exporter: Option<HistoryExporter>,
        period: Duration,
    ) -> Self {
        Reporter {
            table,
            scanner,
            exporter: exporter.map(Arc::new),
            period: period.max(Duration::from_millis(1)),
        }
    }

    /// Build one report. `None` when shutdown interrupted the scan.
    pub async fn report_once(&self, shutdown: &ShutdownListener) -> Option<String> {
        let readings = self.table.read_all();
        let scan = match self.scanner.scan(shutdown).await {
            Ok(Some(outcome)) => Ok(outcome),
            Ok(None) => return None,
            Err(err) => {
                warn!("process scan failed: {err}");
                Err(err)
            }
        };

        if let (Ok(outcome), Some(exporter)) = (&scan, &self.exporter) {
            export(Arc::clone(exporter), outcome).await;
        }

        Some(render_report(&readings, scan.as_ref()))
    }

    /// Print a report every period until shutdown. The first report comes
    /// one full period after start so collectors have had time to tick.
    pub async fn run(self, shutdown: ShutdownListener) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match self.report_once(&shutdown).await {
                Some(report) => println!("{report}"),
                None => break,
            }
        }
        debug!("reporter stopped");
    }
}

/// Append the scan's rankings on the blocking pool. Failures are logged and
/// never stop the report.
async fn export(exporter: Arc<HistoryExporter>, outcome: &ScanOutcome) {
    let by_cpu = outcome.rankings.by_cpu.clone();
    let by_memory = outcome.rankings.by_memory.clone();
    let timestamp = outcome.timestamp;

    let written =
        tokio::task::spawn_blocking(move || exporter.append(&by_cpu, &by_memory, &timestamp)).await;
    match written {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => warn!("history export failed: {err:#}"),
        Err(err) => warn!("history export task failed: {err}"),
    }
}

pub fn render_report(readings: &[MetricReading], scan: Result<&ScanOutcome, &ScanError>) -> String {
    let mut out = render_status(readings);
    match scan {
        Ok(outcome) => {
            let _ = writeln!(
                out,
                "Scanned {} processes ({} readable, {} active) against {} total memory",
                outcome.enumerated,
                outcome.sampled,
                outcome.retained,
                format_bytes(outcome.total_memory_bytes)
            );
            out.push_str(&render_ranking(CPU_TITLE, &outcome.rankings.by_cpu));
            out.push('\n');
            out.push_str(&render_ranking(MEMORY_TITLE, &outcome.rankings.by_memory));
        }
        Err(err) => {
            let _ = write!(out, "[Process Scanner] {err}");
        }
    }
    out
}

pub fn render_status(readings: &[MetricReading]) -> String {
    let mut out = String::from("=== System status ===\n");
    for reading in readings {
        let _ = writeln!(out, "[{}]: {}", reading.name, reading.value);
    }
    out
}

pub fn render_ranking(title: &str, samples: &[ProcessSample]) -> String {
    let mut out = String::from(title);
    if samples.is_empty() {
        out.push_str("\n(no processes above activity threshold)");
    }
    for (rank, sample) in samples.iter().enumerate() {
        let _ = write!(
            out,
            "\n{}. [{}] {} CPU: {:.2}%, RAM: {:.2} MB ({:.2}%), Running Time: {}",
            rank + 1,
            sample.pid,
            sample.name,
            sample.cpu_percent,
            sample.resident_memory_mb(),
            sample.memory_percent,
            format_duration(sample.uptime)
        );
    }
    out
}
