// Settings, persistence and debug configuration

pub mod debug;
pub mod error;
pub mod host_config;
pub mod manager;
pub mod parameters;
pub mod store;

pub use debug::{DebugChannel, DebugRegistry, DebugSink, LogSink, MemorySink};
pub use error::{ConfigError, StoreError};
pub use host_config::{DebugSettings, HostConfig};
pub use manager::{ResetCallback, SettingsManager};
pub use parameters::Parameters;
pub use store::{shared, JsonFileStore, MemoryStore, PersistedStore, SharedStore};
