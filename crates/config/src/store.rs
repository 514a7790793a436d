//! Persisted key-value stores
//!
//! The durable side of the settings system: one entry per setting name,
//! surviving across runs. Reads are typed; a stored value of a different
//! type than requested reads as absent.
//!
//! File stores live at `~/.config/deepsky/<feature>.json`, one file per
//! feature, written with write-to-temp-then-rename.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use deepsky_core::{DataType, SettingValue};

use crate::error::StoreError;

/// Durable settings storage.
pub trait PersistedStore {
    /// Read `key` as `data_type`. Absent keys and type mismatches are `None`.
    fn read(&self, key: &str, data_type: DataType) -> Option<SettingValue>;

    /// Write `key`. Implementations may buffer until `flush`.
    fn write(&mut self, key: &str, value: &SettingValue) -> Result<(), StoreError>;

    /// Make every write so far durable.
    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A store shared between the features of one process.
pub type SharedStore = Rc<RefCell<dyn PersistedStore>>;

/// Wrap a store for sharing. The concrete type is kept so callers can still
/// inspect it; it coerces to `SharedStore` where one is expected.
pub fn shared<S: PersistedStore + 'static>(store: S) -> Rc<RefCell<S>> {
    Rc::new(RefCell::new(store))
}

// ============================================================================
// In-memory store
// ============================================================================

/// Store kept entirely in memory. Counts writes and flushes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, SettingValue>,
    writes: usize,
    flushes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw entry regardless of type.
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.entries.get(key)
    }

    /// Put an entry without counting it as a write (test setup).
    pub fn seed(&mut self, key: &str, value: impl Into<SettingValue>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<SettingValue> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of `write` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl PersistedStore for MemoryStore {
    fn read(&self, key: &str, data_type: DataType) -> Option<SettingValue> {
        self.entries
            .get(key)
            .filter(|v| v.data_type() == data_type)
            .cloned()
    }

    fn write(&mut self, key: &str, value: &SettingValue) -> Result<(), StoreError> {
        self.writes += 1;
        self.entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.flushes += 1;
        Ok(())
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// Current on-disk format version.
pub const STORE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    settings: BTreeMap<String, SettingValue>,
}

/// Store backed by one JSON file.
///
/// Writes are buffered in memory and hit the disk on `flush`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, SettingValue>,
    dirty: bool,
}

impl JsonFileStore {
    /// Open the store at `path`.
    ///
    /// A missing file is an empty store. An unreadable or unparseable file is
    /// logged and treated as empty: settings errors should not prevent a
    /// feature from running, and the next flush replaces the bad file.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<StoreFile>(&contents) {
                Ok(file) => file.settings,
                Err(e) => {
                    log::warn!("Error parsing {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        Self { path, entries, dirty: false }
    }

    /// Open the store for `feature` inside `dir`.
    pub fn for_feature(dir: &Path, feature: &str) -> Self {
        Self::open(Self::feature_path(dir, feature))
    }

    /// `dir/<feature>.json`
    pub fn feature_path(dir: &Path, feature: &str) -> PathBuf {
        dir.join(format!("{feature}.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// True if there are writes not yet flushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl PersistedStore for JsonFileStore {
    fn read(&self, key: &str, data_type: DataType) -> Option<SettingValue> {
        self.entries
            .get(key)
            .filter(|v| v.data_type() == data_type)
            .cloned()
    }

    fn write(&mut self, key: &str, value: &SettingValue) -> Result<(), StoreError> {
        if self.entries.get(key) != Some(value) {
            self.entries.insert(key.to_string(), value.clone());
            self.dirty = true;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = StoreFile {
            version: STORE_FORMAT_VERSION,
            settings: self.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        // Write to temp file, then atomic rename
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;

        self.dirty = false;
        Ok(())
    }
}
