use thiserror::Error;

/// Failure reading a single metric or a single process field.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} unavailable")]
    Unavailable(&'static str),
    #[error("process {0} is gone")]
    ProcessGone(u32),
    #[error("no disk mounted at or above {0}")]
    NoDisk(String),
    #[error("lock poisoned: {0}")]
    Poisoned(String),
    #[error("measurement cancelled")]
    Cancelled,
}

/// Scan-wide failure. No partial ranking is produced when one of these occurs.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("could not retrieve memory info: {0}")]
    TotalMemory(#[source] ProviderError),
    #[error("total physical memory reported as zero")]
    ZeroTotalMemory,
    #[error("could not retrieve process info: {0}")]
    ProcessList(#[source] ProviderError),
}
