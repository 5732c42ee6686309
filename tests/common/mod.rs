#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use hostwatch::error::ProviderError;
use hostwatch::system::provider::{
    DiskUsage, MemoryInfo, MemoryUsage, MetricsProvider, NetworkCounters, ProcessHandle,
    ProcessLister,
};

pub const GIB: u64 = 1024 * 1024 * 1024;

pub struct FakeProvider {
    pub total_memory: Option<u64>,
}

impl FakeProvider {
    pub fn with_total(total: u64) -> Arc<Self> {
        Arc::new(FakeProvider {
            total_memory: Some(total),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(FakeProvider { total_memory: None })
    }
}

#[async_trait]
impl MetricsProvider for FakeProvider {
    async fn cpu_percent(&self, _window: Duration) -> Result<f64, ProviderError> {
        Ok(12.5)
    }

    async fn memory_usage(&self) -> Result<MemoryUsage, ProviderError> {
        self.total_memory
            .map(|total_bytes| MemoryUsage {
                total_bytes,
                used_percent: 42.0,
            })
            .ok_or(ProviderError::Unavailable("memory"))
    }

    async fn disk_usage(&self, _path: &Path) -> Result<DiskUsage, ProviderError> {
        Ok(DiskUsage { used_percent: 70.0 })
    }

    async fn network_counters(&self) -> Result<NetworkCounters, ProviderError> {
        Ok(NetworkCounters {
            bytes_sent: 4096,
            bytes_received: 8192,
        })
    }
}

/// Which field read of a [`FakeProcess`] should fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Broken {
    Nothing,
    Name,
    Cpu,
    Memory,
    StartTime,
}

#[derive(Clone)]
pub struct FakeProcess {
    pub pid: u32,
    pub name: String,
    pub cpu: f64,
    pub resident_bytes: u64,
    pub age: Duration,
    pub delay: Duration,
    pub broken: Broken,
    pub in_flight: Option<Arc<InFlight>>,
}

impl FakeProcess {
    pub fn new(pid: u32, cpu: f64, resident_bytes: u64) -> Self {
        FakeProcess {
            pid,
            name: format!("proc{pid}"),
            cpu,
            resident_bytes,
            age: Duration::from_secs(90),
            delay: Duration::ZERO,
            broken: Broken::Nothing,
            in_flight: None,
        }
    }

    pub fn broken(mut self, broken: Broken) -> Self {
        self.broken = broken;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn tracked(mut self, in_flight: Arc<InFlight>) -> Self {
        self.in_flight = Some(in_flight);
        self
    }

    fn check(&self, field: Broken) -> Result<(), ProviderError> {
        if self.broken == field {
            Err(ProviderError::ProcessGone(self.pid))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProcessHandle for FakeProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn name(&self) -> Result<String, ProviderError> {
        let _guard = self.in_flight.as_ref().map(|t| t.enter());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.check(Broken::Name)?;
        Ok(self.name.clone())
    }

    async fn cpu_percent(&self) -> Result<f64, ProviderError> {
        self.check(Broken::Cpu)?;
        Ok(self.cpu)
    }

    async fn memory_info(&self) -> Result<MemoryInfo, ProviderError> {
        self.check(Broken::Memory)?;
        Ok(MemoryInfo {
            resident_bytes: self.resident_bytes,
        })
    }

    async fn start_time(&self) -> Result<SystemTime, ProviderError> {
        self.check(Broken::StartTime)?;
        Ok(SystemTime::now() - self.age)
    }
}

pub struct FakeLister {
    pub processes: Option<Vec<FakeProcess>>,
}

impl FakeLister {
    pub fn with(processes: Vec<FakeProcess>) -> Arc<Self> {
        Arc::new(FakeLister {
            processes: Some(processes),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(FakeLister { processes: None })
    }
}

#[async_trait]
impl ProcessLister for FakeLister {
    async fn list_processes(&self) -> Result<Vec<Arc<dyn ProcessHandle>>, ProviderError> {
        let processes = self
            .processes
            .as_ref()
            .ok_or(ProviderError::Unavailable("process table"))?;
        Ok(processes
            .iter()
            .cloned()
            .map(|p| Arc::new(p) as Arc<dyn ProcessHandle>)
            .collect())
    }
}

/// Tracks the peak number of concurrent field reads.
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

pub struct InFlightGuard<'a>(&'a InFlight);

impl InFlight {
    pub fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}
