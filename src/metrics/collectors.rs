use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{MetricCollector, MetricReading};
use crate::error::ProviderError;
use crate::format::format_percent;
use crate::shutdown::ShutdownListener;
use crate::system::provider::MetricsProvider;

pub const CPU: &str = "CPU";
pub const MEMORY: &str = "Memory";
pub const NETWORK: &str = "Network";
pub const DISK: &str = "Disk";

pub struct CpuCollector {
    provider: Arc<dyn MetricsProvider>,
    window: Duration,
    elevated_percent: f64,
}

impl CpuCollector {
    pub fn new(
        provider: Arc<dyn MetricsProvider>,
        window: Duration,
        elevated_percent: f64,
    ) -> Self {
        CpuCollector {
            provider,
            window,
            elevated_percent,
        }
    }
}

#[async_trait]
impl MetricCollector for CpuCollector {
    fn name(&self) -> &str {
        CPU
    }

    async fn sample(&self, shutdown: &ShutdownListener) -> MetricReading {
        let measured = tokio::select! {
            result = self.provider.cpu_percent(self.window) => result,
            _ = shutdown.cancelled() => Err(ProviderError::Cancelled),
        };
        match measured {
            Ok(percent) => MetricReading::new(CPU, format_percent(percent))
                .with_elevated(percent > self.elevated_percent),
            Err(ProviderError::Cancelled) => MetricReading::new(CPU, "N/A (cancelled)"),
            Err(err) => {
                debug!("cpu provider failed: {err}");
                MetricReading::new(CPU, format!("[CPU Monitor] Could not retrieve CPU info: {err}"))
            }
        }
    }
}

pub struct MemoryCollector {
    provider: Arc<dyn MetricsProvider>,
}

impl MemoryCollector {
    pub fn new(provider: Arc<dyn MetricsProvider>) -> Self {
        MemoryCollector { provider }
    }
}

#[async_trait]
impl MetricCollector for MemoryCollector {
    fn name(&self) -> &str {
        MEMORY
    }

    async fn sample(&self, _shutdown: &ShutdownListener) -> MetricReading {
        match self.provider.memory_usage().await {
            Ok(usage) => MetricReading::new(MEMORY, format_percent(usage.used_percent)),
            Err(err) => {
                debug!("memory provider failed: {err}");
                MetricReading::new(MEMORY, "N/A")
            }
        }
    }
}

pub struct NetworkCollector {
    provider: Arc<dyn MetricsProvider>,
}

impl NetworkCollector {
    pub fn new(provider: Arc<dyn MetricsProvider>) -> Self {
        NetworkCollector { provider }
    }
}

#[async_trait]
impl MetricCollector for NetworkCollector {
    fn name(&self) -> &str {
        NETWORK
    }

    async fn sample(&self, _shutdown: &ShutdownListener) -> MetricReading {
        match self.provider.network_counters().await {
            Ok(counters) => MetricReading::new(
                NETWORK,
                format!(
                    "Send: {} KB, Recv: {} KB",
                    counters.bytes_sent / 1024,
                    counters.bytes_received / 1024
                ),
            ),
            Err(err) => {
                debug!("network provider failed: {err}");
                MetricReading::new(
                    NETWORK,
                    format!("[Network Monitor] Could not retrieve network info: {err}"),
                )
            }
        }
    }
}

pub struct DiskCollector {
    provider: Arc<dyn MetricsProvider>,
    path: PathBuf,
}

impl DiskCollector {
    pub fn new(provider: Arc<dyn MetricsProvider>, path: PathBuf) -> Self {
        DiskCollector { provider, path }
    }
}

#[async_trait]
impl MetricCollector for DiskCollector {
    fn name(&self) -> &str {
        DISK
    }

    async fn sample(&self, _shutdown: &ShutdownListener) -> MetricReading {
        match self.provider.disk_usage(&self.path).await {
            Ok(usage) => MetricReading::new(DISK, format_percent(usage.used_percent)),
            Err(err) => {
                debug!("disk provider failed: {err}");
                MetricReading::new(
                    DISK,
                    format!("[Disk Monitor] Could not retrieve disk info: {err}"),
                )
            }
        }
    }
}
