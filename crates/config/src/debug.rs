//! Per-area debug channels
//!
//! Each subsystem registers a named area once and keeps the returned
//! `DebugChannel`. A channel writes when its own flag or the registry-wide
//! global flag is on, and is silent otherwise.
//!
//! Writes go straight to the sink on the calling thread: nothing is queued,
//! so output order matches call order.
//!
//! There is one process-wide registry (`registry()`), but `DebugRegistry` is
//! an ordinary value and can be created on its own (tests do this to capture
//! output without touching the global one).

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::host_config::DebugSettings;

/// Environment variable that overrides debug flags.
///
/// `all` (or `global`) turns every area on; anything else is read as a
/// comma-separated list of areas to enable.
pub const DEBUG_ENV_VAR: &str = "DEEPSKY_DEBUG";

/// Destination for enabled debug lines.
pub trait DebugSink: Send + Sync {
    fn write(&self, area: &str, message: &str);
}

/// Forwards to the `log` facade at debug level.
pub struct LogSink;

impl DebugSink for LogSink {
    fn write(&self, area: &str, message: &str) {
        log::debug!(target: "deepsky::debug", "DEBUG ({}): {}", area, message);
    }
}

/// Captures lines in memory, in call order.
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl DebugSink for MemorySink {
    fn write(&self, area: &str, message: &str) {
        self.lines.lock().push(format!("DEBUG ({}): {}", area, message));
    }
}

struct Shared {
    global: AtomicBool,
    sink: RwLock<Arc<dyn DebugSink>>,
}

/// Handle to one debug area.
#[derive(Clone)]
pub struct DebugChannel {
    area: Arc<str>,
    enabled: Arc<AtomicBool>,
    shared: Arc<Shared>,
}

impl DebugChannel {
    /// A channel attached to no registry. It never writes.
    pub fn detached(area: &str) -> Self {
        Self {
            area: Arc::from(area),
            enabled: Arc::new(AtomicBool::new(false)),
            shared: Arc::new(Shared {
                global: AtomicBool::new(false),
                sink: RwLock::new(Arc::new(LogSink)),
            }),
        }
    }

    pub fn area(&self) -> &str {
        &self.area
    }

    /// True if this channel currently writes.
    pub fn is_enabled(&self) -> bool {
        self.shared.global.load(Ordering::Relaxed) || self.enabled.load(Ordering::Relaxed)
    }

    /// Write one line if enabled. Prefer the `debug_ln!` macro, which skips
    /// formatting when the channel is off.
    pub fn debug_ln(&self, args: fmt::Arguments<'_>) {
        if self.is_enabled() {
            let sink = self.shared.sink.read().clone();
            sink.write(&self.area, &args.to_string());
        }
    }
}

impl fmt::Debug for DebugChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugChannel")
            .field("area", &self.area)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Write a formatted line to a `DebugChannel`.
///
/// ```ignore
/// debug_ln!(channel, "Read setting: {} = {}", key, value);
/// ```
#[macro_export]
macro_rules! debug_ln {
    ($channel:expr, $($arg:tt)*) => {{
        let channel: &$crate::debug::DebugChannel = &$channel;
        if channel.is_enabled() {
            channel.debug_ln(format_args!($($arg)*));
        }
    }};
}

/// Registry of debug areas sharing one global flag and one sink.
pub struct DebugRegistry {
    shared: Arc<Shared>,
    channels: HashMap<String, DebugChannel>,
}

impl DebugRegistry {
    /// Empty registry writing through the `log` facade.
    pub fn new() -> Self {
        Self::with_sink(Arc::new(LogSink))
    }

    pub fn with_sink(sink: Arc<dyn DebugSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                global: AtomicBool::new(false),
                sink: RwLock::new(sink),
            }),
            channels: HashMap::new(),
        }
    }

    /// Register `area`, or update its flag if it already exists.
    ///
    /// Re-registering never creates a second channel: handles obtained
    /// earlier see the new flag.
    pub fn register(&mut self, area: &str, enabled: bool) -> DebugChannel {
        if let Some(channel) = self.channels.get(area) {
            channel.enabled.store(enabled, Ordering::Relaxed);
            return channel.clone();
        }

        let channel = DebugChannel {
            area: Arc::from(area),
            enabled: Arc::new(AtomicBool::new(enabled)),
            shared: self.shared.clone(),
        };
        self.channels.insert(area.to_string(), channel.clone());
        channel
    }

    /// Existing channel for `area`.
    pub fn channel(&self, area: &str) -> Option<DebugChannel> {
        self.channels.get(area).cloned()
    }

    /// Existing channel for `area`, registering it disabled if absent.
    pub fn channel_or_register(&mut self, area: &str) -> DebugChannel {
        match self.channels.get(area) {
            Some(channel) => channel.clone(),
            None => self.register(area, false),
        }
    }

    pub fn set_global(&self, on: bool) {
        self.shared.global.store(on, Ordering::Relaxed);
    }

    pub fn is_global(&self) -> bool {
        self.shared.global.load(Ordering::Relaxed)
    }

    /// Replace the sink for every channel of this registry.
    pub fn set_sink(&self, sink: Arc<dyn DebugSink>) {
        *self.shared.sink.write() = sink;
    }

    /// Registered area names, sorted.
    pub fn areas(&self) -> Vec<String> {
        let mut areas: Vec<String> = self.channels.keys().cloned().collect();
        areas.sort();
        areas
    }

    /// Apply flags from host configuration.
    pub fn apply(&mut self, settings: &DebugSettings) {
        self.set_global(settings.global);
        for (area, enabled) in &settings.areas {
            self.register(area, *enabled);
        }
    }

    /// Apply `DEEPSKY_DEBUG` if it is set.
    pub fn apply_env(&mut self) {
        if let Ok(value) = std::env::var(DEBUG_ENV_VAR) {
            self.apply(&parse_debug_env(&value));
        }
    }
}

impl Default for DebugRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a `DEEPSKY_DEBUG` value into debug settings.
pub fn parse_debug_env(value: &str) -> DebugSettings {
    let mut settings = DebugSettings::default();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part {
            "all" | "global" | "1" | "true" => settings.global = true,
            area => {
                settings.areas.insert(area.to_string(), true);
            }
        }
    }
    settings
}

static REGISTRY: OnceLock<Mutex<DebugRegistry>> = OnceLock::new();

/// The process-wide registry.
pub fn registry() -> MutexGuard<'static, DebugRegistry> {
    REGISTRY
        .get_or_init(|| {
            let mut registry = DebugRegistry::new();
            registry.apply_env();
            Mutex::new(registry)
        })
        .lock()
}

/// Register `area` in the process-wide registry.
pub fn register(area: &str, enabled: bool) -> DebugChannel {
    registry().register(area, enabled)
}

/// Channel for `area` in the process-wide registry, disabled if new.
///
/// Unlike `register`, this never changes the flag of an existing area.
pub fn channel(area: &str) -> DebugChannel {
    registry().channel_or_register(area)
}
