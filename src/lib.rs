pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod metrics;
pub mod report;
pub mod shutdown;
pub mod system;
