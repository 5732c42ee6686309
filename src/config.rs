use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::metrics::CollectorSettings;
use crate::system::platform::default_disk_path;
use crate::system::process::{ActivityFilter, FilterPolicy};
use crate::system::scanner::ScannerSettings;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub collectors: CollectorsConfig,
    pub scanner: ScannerConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub sample_interval_ms: u64,
    pub report_interval_ms: u64,
    /// 0 runs until interrupted.
    pub run_duration_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            sample_interval_ms: 1000,
            report_interval_ms: 3000,
            run_duration_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CollectorsConfig {
    pub cpu_window_ms: u64,
    pub cpu_elevated_percent: f64,
    pub disk_path: PathBuf,
}

impl Default for CollectorsConfig {
    fn default() -> Self {
        CollectorsConfig {
            cpu_window_ms: 1000,
            cpu_elevated_percent: 60.0,
            disk_path: default_disk_path(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub top_n: usize,
    pub min_cpu_percent: f64,
    pub min_memory_percent: f64,
    pub filter_policy: FilterPolicy,
    pub workers: usize,
    pub cpu_window_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig {
            top_n: 5,
            min_cpu_percent: 1.0,
            min_memory_percent: 1.0,
            filter_policy: FilterPolicy::Any,
            workers: 16,
            cpu_window_ms: 200,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            enabled: true,
            path: PathBuf::from("process_stat.csv"),
        }
    }
}

impl GeneralConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms.max(1))
    }

    pub fn run_duration(&self) -> Option<Duration> {
        (self.run_duration_secs > 0).then(|| Duration::from_secs(self.run_duration_secs))
    }
}

impl CollectorsConfig {
    pub fn settings(&self) -> CollectorSettings {
        CollectorSettings {
            cpu_window: Duration::from_millis(self.cpu_window_ms),
            cpu_elevated_percent: self.cpu_elevated_percent,
            disk_path: self.disk_path.clone(),
        }
    }
}

impl ScannerConfig {
    pub fn settings(&self) -> ScannerSettings {
        ScannerSettings {
            top_n: self.top_n.max(1),
            filter: ActivityFilter {
                min_cpu_percent: self.min_cpu_percent,
                min_memory_percent: self.min_memory_percent,
                policy: self.filter_policy,
            },
            workers: self.workers.max(1),
        }
    }

    pub fn cpu_window(&self) -> Duration {
        Duration::from_millis(self.cpu_window_ms)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hostwatch").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
            warn!(path = %path.display(), "ignoring unparsable config: {err}");
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}
