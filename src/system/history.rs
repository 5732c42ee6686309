use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, TimeZone};
use color_eyre::eyre::{Result, WrapErr};
use tracing::debug;

use super::process::ProcessSample;
use crate::format::format_duration;

pub const HEADER: &str = "Timestamp, PID, Name, CPU%, Memory(MB), RAM%, RunningTime";

/// Append-only CSV log of the top consumers from each scan.
#[derive(Debug)]
pub struct HistoryExporter {
    path: PathBuf,
    // Serializes overlapping appends so batches never interleave.
    write_lock: Mutex<()>,
}

impl HistoryExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        HistoryExporter {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row per entry of `top_by_cpu`, then one per entry of
    /// `top_by_memory`, all stamped with `timestamp`. Writes the header first
    /// when the file is empty. Returns the number of data rows written.
    pub fn append<Tz>(
        &self,
        top_by_cpu: &[ProcessSample],
        top_by_memory: &[ProcessSample],
        timestamp: &DateTime<Tz>,
    ) -> Result<usize>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .wrap_err_with(|| format!("could not open history file {}", self.path.display()))?;
        let fresh = file
            .metadata()
            .wrap_err_with(|| format!("could not stat history file {}", self.path.display()))?
            .len()
            == 0;

        let stamp = timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut batch = String::new();
        if fresh {
            batch.push_str(HEADER);
            batch.push('\n');
        }
        let mut rows = 0;
        for sample in top_by_cpu.iter().chain(top_by_memory) {
            batch.push_str(&format_row(&stamp, sample));
            batch.push('\n');
            rows += 1;
        }

        if !batch.is_empty() {
            file.write_all(batch.as_bytes())
                .wrap_err_with(|| format!("could not write history file {}", self.path.display()))?;
        }
        debug!(rows, header = fresh, path = %self.path.display(), "history appended");
        Ok(rows)
    }
}

pub fn format_row(timestamp: &str, sample: &ProcessSample) -> String {
    format!(
        "{}, {}, {}, {:.2}%, {:.2}, {:.2}%, {}",
        timestamp,
        sample.pid,
        sanitize_field(&sample.name),
        sample.cpu_percent,
        sample.resident_memory_mb(),
        sample.memory_percent,
        format_duration(sample.uptime)
    )
}

fn sanitize_field(value: &str) -> String {
    value
        .chars()
        .map(|c| if matches!(c, ',' | '\n' | '\r') { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn row_layout() {
        let sample = ProcessSample {
            pid: 4242,
            name: "postgres".into(),
            cpu_percent: 12.346,
            resident_memory_bytes: 256 * 1024 * 1024,
            memory_percent: 3.2,
            uptime: Duration::from_secs(3723),
        };
        assert_eq!(
            format_row("2026-10-17T09:30:00Z", &sample),
            "2026-10-17T09:30:00Z, 4242, postgres, 12.35%, 256.00, 3.20%, 1h2m3s"
        );
    }

    #[test]
    fn names_cannot_add_fields() {
        assert_eq!(sanitize_field("a,b\nc"), "a b c");
    }
}
