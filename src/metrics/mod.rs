//! Host-level metric collectors and the scheduler that keeps the snapshot
//! table fed.

pub mod collectors;
pub mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::shutdown::ShutdownListener;
use crate::system::platform::default_disk_path;
use crate::system::provider::MetricsProvider;

pub use collectors::{CpuCollector, DiskCollector, MemoryCollector, NetworkCollector};
pub use scheduler::{SamplingScheduler, SchedulerHandle};

/// Latest formatted value produced by one collector tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricReading {
    pub name: String,
    pub value: String,
    /// Advisory flag, only ever set by the CPU collector.
    pub elevated: bool,
}

impl MetricReading {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        MetricReading {
            name: name.into(),
            value: value.into(),
            elevated: false,
        }
    }

    pub fn with_elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }
}

#[async_trait]
pub trait MetricCollector: Send + Sync {
    /// Stable key under which readings land in the snapshot table. The
    /// scheduler relabels every reading with it.
    fn name(&self) -> &str;

    /// Take one reading. Provider failures become placeholder values; this
    /// never fails. Returns promptly once `shutdown` fires.
    async fn sample(&self, shutdown: &ShutdownListener) -> MetricReading;
}

#[derive(Clone, Debug, PartialEq)]
pub struct CollectorSettings {
    pub cpu_window: Duration,
    pub cpu_elevated_percent: f64,
    pub disk_path: PathBuf,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        CollectorSettings {
            cpu_window: Duration::from_secs(1),
            cpu_elevated_percent: 60.0,
            disk_path: default_disk_path(),
        }
    }
}

/// The four standard collectors, all reading from `provider`.
pub fn default_collectors(
    provider: Arc<dyn MetricsProvider>,
    settings: &CollectorSettings,
) -> Vec<Arc<dyn MetricCollector>> {
    vec![
        Arc::new(CpuCollector::new(
            Arc::clone(&provider),
            settings.cpu_window,
            settings.cpu_elevated_percent,
        )),
        Arc::new(MemoryCollector::new(Arc::clone(&provider))),
        Arc::new(NetworkCollector::new(Arc::clone(&provider))),
        Arc::new(DiskCollector::new(provider, settings.disk_path.clone())),
    ]
}
