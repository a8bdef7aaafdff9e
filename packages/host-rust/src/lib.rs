//! `autogrid` host integration: preference stores, JSON-backed records,
//! per-request grid construction, CSV export, configuration and logging.

pub mod cli;
pub mod config;
pub mod context;
pub mod export;
pub mod logging;
pub mod provider;
pub mod store;

pub use config::{HostConfig, HostError, LogConfig};
pub use context::{build_grid, GridRequest};
pub use provider::JsonRecordProvider;
pub use store::{CookieJar, MemoryPreferenceStore};
