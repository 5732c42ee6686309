use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sysinfo::{
    Disks, MINIMUM_CPU_UPDATE_INTERVAL, Networks, Pid, Process, ProcessRefreshKind,
    ProcessesToUpdate, System,
};
use tracing::debug;

use super::provider::{
    DiskUsage, MemoryInfo, MemoryUsage, MetricsProvider, NetworkCounters, ProcessHandle,
    ProcessLister,
};
use crate::error::ProviderError;

/// `sysinfo`-backed implementation of both [`MetricsProvider`] and [`ProcessLister`].
///
/// Host metrics and process tables live in separate `System` instances so a
/// process scan never disturbs the CPU collector's measurement window.
pub struct SysinfoBackend {
    host: Mutex<System>,
    procs: Arc<Mutex<System>>,
    process_window: Duration,
}

impl SysinfoBackend {
    pub fn new(process_window: Duration) -> Self {
        let mut host = System::new();
        host.refresh_cpu_usage();
        host.refresh_memory();
        SysinfoBackend {
            host: Mutex::new(host),
            procs: Arc::new(Mutex::new(System::new())),
            process_window: process_window.max(MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    fn host(&self) -> Result<MutexGuard<'_, System>, ProviderError> {
        self.host
            .lock()
            .map_err(|e| ProviderError::Poisoned(e.to_string()))
    }

    fn refresh_processes(&self) -> Result<Vec<Pid>, ProviderError> {
        let mut sys = self
            .procs
            .lock()
            .map_err(|e| ProviderError::Poisoned(e.to_string()))?;
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );
        let mut pids: Vec<Pid> = sys.processes().keys().copied().collect();
        pids.sort_unstable();
        Ok(pids)
    }
}

#[async_trait]
impl MetricsProvider for SysinfoBackend {
    async fn cpu_percent(&self, window: Duration) -> Result<f64, ProviderError> {
        self.host()?.refresh_cpu_usage();
        tokio::time::sleep(window.max(MINIMUM_CPU_UPDATE_INTERVAL)).await;
        let mut sys = self.host()?;
        sys.refresh_cpu_usage();
        Ok(f64::from(sys.global_cpu_usage()))
    }

    async fn memory_usage(&self) -> Result<MemoryUsage, ProviderError> {
        let mut sys = self.host()?;
        sys.refresh_memory();
        let total_bytes = sys.total_memory();
        if total_bytes == 0 {
            return Err(ProviderError::Unavailable("physical memory"));
        }
        Ok(MemoryUsage {
            total_bytes,
            used_percent: sys.used_memory() as f64 / total_bytes as f64 * 100.0,
        })
    }

    async fn disk_usage(&self, path: &Path) -> Result<DiskUsage, ProviderError> {
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().components().count())
            .ok_or_else(|| ProviderError::NoDisk(path.display().to_string()))?;

        let total = disk.total_space();
        if total == 0 {
            return Err(ProviderError::Unavailable("disk capacity"));
        }
        let used = total.saturating_sub(disk.available_space());
        Ok(DiskUsage {
            used_percent: used as f64 / total as f64 * 100.0,
        })
    }

    async fn network_counters(&self) -> Result<NetworkCounters, ProviderError> {
        let networks = Networks::new_with_refreshed_list();
        if networks.list().is_empty() {
            return Err(ProviderError::Unavailable("network interfaces"));
        }
        let (bytes_sent, bytes_received) = networks
            .list()
            .values()
            .fold((0u64, 0u64), |(sent, recv), data| {
                (
                    sent.saturating_add(data.total_transmitted()),
                    recv.saturating_add(data.total_received()),
                )
            });
        Ok(NetworkCounters {
            bytes_sent,
            bytes_received,
        })
    }
}

#[async_trait]
impl ProcessLister for SysinfoBackend {
    async fn list_processes(&self) -> Result<Vec<Arc<dyn ProcessHandle>>, ProviderError> {
        // Per-process CPU is a delta between two refreshes.
        self.refresh_processes()?;
        tokio::time::sleep(self.process_window).await;
        let pids = self.refresh_processes()?;
        debug!(count = pids.len(), "enumerated processes");

        Ok(pids
            .into_iter()
            .map(|pid| {
                Arc::new(SysinfoProcess {
                    pid,
                    sys: Arc::clone(&self.procs),
                }) as Arc<dyn ProcessHandle>
            })
            .collect())
    }
}

struct SysinfoProcess {
    pid: Pid,
    sys: Arc<Mutex<System>>,
}

impl SysinfoProcess {
    fn read<T>(&self, field: impl FnOnce(&Process) -> T) -> Result<T, ProviderError> {
        let sys = self
            .sys
            .lock()
            .map_err(|e| ProviderError::Poisoned(e.to_string()))?;
        sys.process(self.pid)
            .map(field)
            .ok_or(ProviderError::ProcessGone(self.pid.as_u32()))
    }
}

#[async_trait]
impl ProcessHandle for SysinfoProcess {
    fn pid(&self) -> u32 {
        self.pid.as_u32()
    }

    async fn name(&self) -> Result<String, ProviderError> {
        let name = self.read(|p| p.name().to_string_lossy().to_string())?;
        if name.is_empty() {
            return Err(ProviderError::Unavailable("process name"));
        }
        Ok(name)
    }

    async fn cpu_percent(&self) -> Result<f64, ProviderError> {
        self.read(|p| f64::from(p.cpu_usage()))
    }

    async fn memory_info(&self) -> Result<MemoryInfo, ProviderError> {
        self.read(|p| MemoryInfo {
            resident_bytes: p.memory(),
        })
    }

    async fn start_time(&self) -> Result<SystemTime, ProviderError> {
        match self.read(|p| p.start_time())? {
            0 => Err(ProviderError::Unavailable("process start time")),
            secs => Ok(UNIX_EPOCH + Duration::from_secs(secs)),
        }
    }
}
