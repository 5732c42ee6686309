pub mod backend;
pub mod history;
pub mod platform;
pub mod process;
pub mod provider;
pub mod scanner;
pub mod snapshot;
