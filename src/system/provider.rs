//! Capabilities the agent consumes from the operating system.
//!
//! Collectors and the process scanner only ever talk to these traits, which
//! keeps them testable with fakes and keeps `sysinfo` confined to one module.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::error::ProviderError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemoryUsage {
    pub total_bytes: u64,
    pub used_percent: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiskUsage {
    pub used_percent: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryInfo {
    pub resident_bytes: u64,
}

/// Host-level metric source.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Global CPU usage averaged over `window`. Blocks for roughly `window`.
    async fn cpu_percent(&self, window: Duration) -> Result<f64, ProviderError>;
    async fn memory_usage(&self) -> Result<MemoryUsage, ProviderError>;
    async fn disk_usage(&self, path: &Path) -> Result<DiskUsage, ProviderError>;
    async fn network_counters(&self) -> Result<NetworkCounters, ProviderError>;
}

/// Enumerates live processes.
#[async_trait]
pub trait ProcessLister: Send + Sync {
    async fn list_processes(&self) -> Result<Vec<Arc<dyn ProcessHandle>>, ProviderError>;
}

/// One live process. Every field read may fail independently, e.g. because
/// the process exited or access was denied.
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    fn pid(&self) -> u32;
    async fn name(&self) -> Result<String, ProviderError>;
    async fn cpu_percent(&self) -> Result<f64, ProviderError>;
    async fn memory_info(&self) -> Result<MemoryInfo, ProviderError>;
    async fn start_time(&self) -> Result<SystemTime, ProviderError>;
}
