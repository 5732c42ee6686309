//! Process scanner: sample every live process, filter out idle ones, rank
//! the rest by CPU and by memory share.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

use super::process::{ActivityFilter, ProcessSample, Rankings};
use super::provider::{MetricsProvider, ProcessHandle, ProcessLister};
use crate::error::{ProviderError, ScanError};
use crate::shutdown::ShutdownListener;

#[derive(Clone, Debug, PartialEq)]
pub struct ScannerSettings {
    pub top_n: usize,
    pub filter: ActivityFilter,
    /// Upper bound on concurrent per-process samplers.
    pub workers: usize,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        ScannerSettings {
            top_n: 5,
            filter: ActivityFilter::default(),
            workers: 16,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScanOutcome {
    pub timestamp: DateTime<Local>,
    /// Denominator used for every sample's memory share in this scan.
    pub total_memory_bytes: u64,
    pub enumerated: usize,
    pub sampled: usize,
    pub retained: usize,
    pub rankings: Rankings,
}

pub struct ProcessScanner {
    provider: Arc<dyn MetricsProvider>,
    lister: Arc<dyn ProcessLister>,
    settings: ScannerSettings,
}

type Queue = Mutex<std::iter::Enumerate<std::vec::IntoIter<Arc<dyn ProcessHandle>>>>;

impl ProcessScanner {
    pub fn new(
        provider: Arc<dyn MetricsProvider>,
        lister: Arc<dyn ProcessLister>,
        settings: ScannerSettings,
    ) -> Self {
        ProcessScanner {
            provider,
            lister,
            settings,
        }
    }

    pub fn settings(&self) -> &ScannerSettings {
        &self.settings
    }

    /// Run one scan.
    ///
    /// Returns `Ok(None)` when `shutdown` fires before the scan completes.
    /// Per-process read failures only drop that process; only the total
    /// memory and process listing queries can fail the whole scan.
    pub async fn scan(
        &self,
        shutdown: &ShutdownListener,
    ) -> Result<Option<ScanOutcome>, ScanError> {
        if shutdown.is_cancelled() {
            return Ok(None);
        }

        let total_memory_bytes = self
            .provider
            .memory_usage()
            .await
            .map_err(ScanError::TotalMemory)?
            .total_bytes;
        if total_memory_bytes == 0 {
            return Err(ScanError::ZeroTotalMemory);
        }

        let handles = self
            .lister
            .list_processes()
            .await
            .map_err(ScanError::ProcessList)?;
        let enumerated = handles.len();

        let mut sampled = self
            .sample_all(handles, total_memory_bytes, shutdown)
            .await;
        if shutdown.is_cancelled() {
            debug!("scan abandoned after shutdown");
            return Ok(None);
        }

        // Restore enumeration order so equal keys rank in the order listed.
        sampled.sort_unstable_by_key(|(index, _)| *index);
        let sampled_count = sampled.len();
        let retained: Vec<ProcessSample> = sampled
            .into_iter()
            .map(|(_, sample)| sample)
            .filter(|sample| self.settings.filter.retains(sample))
            .collect();

        let rankings = Rankings::from_retained(&retained, self.settings.top_n);
        debug!(
            enumerated,
            sampled = sampled_count,
            retained = retained.len(),
            "process scan complete"
        );

        Ok(Some(ScanOutcome {
            timestamp: Local::now(),
            total_memory_bytes,
            enumerated,
            sampled: sampled_count,
            retained: retained.len(),
            rankings,
        }))
    }

    async fn sample_all(
        &self,
        handles: Vec<Arc<dyn ProcessHandle>>,
        total_memory_bytes: u64,
        shutdown: &ShutdownListener,
    ) -> Vec<(usize, ProcessSample)> {
        if handles.is_empty() {
            return Vec::new();
        }

        let worker_count = self.settings.workers.clamp(1, handles.len());
        let now = SystemTime::now();
        let queue: Arc<Queue> = Arc::new(Mutex::new(handles.into_iter().enumerate()));

        let mut workers = JoinSet::new();
        for _ in 0..worker_count {
            let queue = Arc::clone(&queue);
            let shutdown = shutdown.clone();
            workers.spawn(async move {
                let mut out = Vec::new();
                loop {
                    if shutdown.is_cancelled() {
                        return Vec::new();
                    }
                    let next = queue.lock().unwrap_or_else(PoisonError::into_inner).next();
                    let Some((index, handle)) = next else {
                        return out;
                    };
                    if let Some(sample) =
                        sample_process(handle.as_ref(), total_memory_bytes, now).await
                    {
                        out.push((index, sample));
                    }
                }
            });
        }

        let mut sampled = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(batch) => sampled.extend(batch),
                Err(err) => warn!("process sampler task failed: {err}"),
            }
        }
        sampled
    }
}

async fn sample_process(
    handle: &dyn ProcessHandle,
    total_memory_bytes: u64,
    now: SystemTime,
) -> Option<ProcessSample> {
    let pid = handle.pid();
    let read = async {
        let name = handle.name().await?;
        let cpu_percent = handle.cpu_percent().await?;
        if !cpu_percent.is_finite() {
            return Err(ProviderError::Unavailable("process cpu usage"));
        }
        let memory = handle.memory_info().await?;
        let started = handle.start_time().await?;
        Ok::<_, ProviderError>((name, cpu_percent, memory, started))
    };

    match read.await {
        Ok((name, cpu_percent, memory, started)) => Some(ProcessSample {
            pid,
            name,
            cpu_percent,
            resident_memory_bytes: memory.resident_bytes,
            memory_percent: memory.resident_bytes as f64 / total_memory_bytes as f64 * 100.0,
            uptime: now.duration_since(started).unwrap_or_default(),
        }),
        Err(err) => {
            trace!(pid, "process dropped from scan: {err}");
            None
        }
    }
}
