//! Settings manager
//!
//! Owns the defaults and live values (`prefs`) of one feature's settings and
//! moves them between three places:
//!
//! - the persisted store (`init` / `save_settings`)
//! - the one-shot parameter channel (`load_parameters` / `save_parameters`)
//! - bound controls, through `set` and reset observers
//!
//! # Invariants
//!
//! - `defaults` and `prefs` always have the same key set.
//! - `prefs` never holds a value of the wrong type or a numeric value outside
//!   the declared range. Out-of-range assignments are rejected, never clamped;
//!   out-of-range values found in the store or the channel read as a miss.
//! - Settings declared with `persist = false` never reach the store or the
//!   parameter channel.

use std::collections::HashMap;

use deepsky_core::{SettingDescriptor, SettingValue};

use crate::debug::{self, DebugChannel};
use crate::debug_ln;
use crate::error::{ConfigError, StoreError};
use crate::parameters::Parameters;
use crate::store::SharedStore;

/// Observer invoked with the restored value when settings are reset.
pub type ResetCallback = Box<dyn FnMut(&SettingValue)>;

struct Slot {
    descriptor: SettingDescriptor,
    observers: Vec<ResetCallback>,
}

pub struct SettingsManager {
    /// Declaration order.
    order: Vec<String>,
    slots: HashMap<String, Slot>,
    defaults: HashMap<String, SettingValue>,
    prefs: HashMap<String, SettingValue>,
    store: SharedStore,
    debug: DebugChannel,
}

impl SettingsManager {
    /// Build a manager from a feature's descriptors.
    ///
    /// Fails on duplicate names, a default of the wrong type, an invalid range
    /// or a numeric default outside its range.
    pub fn new(descriptors: Vec<SettingDescriptor>, store: SharedStore) -> Result<Self, ConfigError> {
        let debug = debug::channel("settings");
        let mut order = Vec::with_capacity(descriptors.len());
        let mut slots = HashMap::with_capacity(descriptors.len());
        let mut defaults = HashMap::with_capacity(descriptors.len());

        for descriptor in descriptors {
            debug_ln!(debug, "Configuring setting: {:?}", descriptor);
            validate_descriptor(&descriptor)?;
            if slots.contains_key(&descriptor.name) {
                return Err(ConfigError::DuplicateSetting(descriptor.name));
            }

            let name = descriptor.name.clone();
            defaults.insert(name.clone(), descriptor.default_value.clone());
            order.push(name.clone());
            slots.insert(name, Slot { descriptor, observers: Vec::new() });
        }

        Ok(Self {
            order,
            slots,
            prefs: defaults.clone(),
            defaults,
            store,
            debug,
        })
    }

    /// Use `channel` for this manager's debug output.
    pub fn with_debug(mut self, channel: DebugChannel) -> Self {
        self.debug = channel;
        self
    }

    // ------------------------------------------------------------------------
    // Store and parameter channel
    // ------------------------------------------------------------------------

    /// Overwrite live values with whatever the persisted store holds.
    ///
    /// Only persisted settings are read. A miss keeps the current value.
    /// Reading is side-effect free, so calling this twice is the same as once.
    pub fn init(&mut self) {
        let store = self.store.clone();
        let store = store.borrow();
        for name in &self.order {
            let slot = &self.slots[name];
            if !slot.descriptor.persist {
                continue;
            }
            match store.read(name, slot.descriptor.data_type) {
                Some(value) if slot.descriptor.is_out_of_range(&value) => {
                    log::warn!("Ignoring stored value {} for '{}': out of range", value, name);
                }
                Some(value) => {
                    debug_ln!(self.debug, "Read setting: {} = {}", name, value);
                    self.prefs.insert(name.clone(), value);
                }
                None => {
                    debug_ln!(self.debug, "Setting {} not found", name);
                }
            }
        }
    }

    /// Overlay values from the one-shot parameter channel.
    ///
    /// Every setting is considered, persisted or not. The store is not
    /// touched.
    pub fn load_parameters(&mut self, parameters: &Parameters) {
        for name in &self.order {
            let slot = &self.slots[name];
            match parameters.get_typed(name, slot.descriptor.data_type) {
                Some(value) if slot.descriptor.is_out_of_range(&value) => {
                    log::warn!("Ignoring parameter {} for '{}': out of range", value, name);
                }
                Some(value) => {
                    debug_ln!(self.debug, "Read parameter {} = {}", name, value);
                    self.prefs.insert(name.clone(), value);
                }
                None => {
                    debug_ln!(self.debug, "No parameter saved for {}", name);
                }
            }
        }
    }

    /// Write every persisted setting's live value into `parameters`.
    pub fn save_parameters(&self, parameters: &mut Parameters) {
        for name in self.persisted_names() {
            let value = &self.prefs[name];
            debug_ln!(self.debug, "Saving parameter {} = {}", name, value);
            parameters.set(name, value.clone());
        }
    }

    /// Write every persisted setting's live value into the store and flush.
    pub fn save_settings(&mut self) -> Result<(), StoreError> {
        let mut store = self.store.borrow_mut();
        for name in self.persisted_names() {
            let value = &self.prefs[name];
            debug_ln!(self.debug, "Save setting: {} = {}", name, value);
            store.write(name, value)?;
        }
        store.flush()
    }

    /// Restore every default, notify reset observers, then save.
    ///
    /// All live values are restored before the first observer runs and
    /// before anything is written to the store.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        for name in &self.order {
            self.prefs.insert(name.clone(), self.defaults[name].clone());
        }

        for name in &self.order {
            let value = &self.prefs[name];
            if let Some(slot) = self.slots.get_mut(name) {
                for observer in slot.observers.iter_mut() {
                    observer(value);
                }
            }
        }

        self.save_settings()
    }

    // ------------------------------------------------------------------------
    // Live values
    // ------------------------------------------------------------------------

    pub fn get(&self, name: &str) -> Option<&SettingValue> {
        self.prefs.get(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(SettingValue::as_bool)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(SettingValue::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(SettingValue::as_f64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(SettingValue::as_str)
    }

    /// Assign a live value.
    ///
    /// The value is converted to the declared type when that is lossless
    /// (see `SettingValue::coerce`). Wrong types and out-of-range numbers are
    /// rejected and the previous value is kept.
    pub fn set(&mut self, name: &str, value: impl Into<SettingValue>) -> Result<(), ConfigError> {
        let value = value.into();
        let slot = self
            .slots
            .get(name)
            .ok_or_else(|| ConfigError::UnknownSetting(name.to_string()))?;
        let descriptor = &slot.descriptor;

        let value = value.coerce(descriptor.data_type).ok_or_else(|| ConfigError::TypeMismatch {
            setting: name.to_string(),
            expected: descriptor.data_type,
            found: value.data_type(),
        })?;

        if let (Some(range), Some(v)) = (descriptor.range, value.as_f64()) {
            if !range.contains_as(descriptor.data_type, v) {
                debug_ln!(self.debug, "Rejected {} = {}: outside [{}, {}]", name, v, range.low, range.high);
                return Err(ConfigError::OutOfRange {
                    setting: name.to_string(),
                    value: v,
                    low: range.low,
                    high: range.high,
                });
            }
        }

        self.prefs.insert(name.to_string(), value);
        Ok(())
    }

    /// Subscribe to resets of `name`. Observers accumulate; none replaces another.
    pub fn on_reset(&mut self, name: &str, observer: ResetCallback) -> Result<(), ConfigError> {
        let slot = self
            .slots
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownSetting(name.to_string()))?;
        slot.observers.push(observer);
        Ok(())
    }

    /// Number of reset observers registered for `name`.
    pub fn reset_observer_count(&self, name: &str) -> usize {
        self.slots.get(name).map_or(0, |s| s.observers.len())
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    pub fn descriptor(&self, name: &str) -> Option<&SettingDescriptor> {
        self.slots.get(name).map(|s| &s.descriptor)
    }

    /// Descriptors in declaration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &SettingDescriptor> {
        self.order.iter().map(move |name| &self.slots[name].descriptor)
    }

    /// Setting names in declaration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn defaults(&self) -> &HashMap<String, SettingValue> {
        &self.defaults
    }

    pub fn prefs(&self) -> &HashMap<String, SettingValue> {
        &self.prefs
    }

    /// The store this manager reads from and writes to.
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    fn persisted_names(&self) -> impl Iterator<Item = &String> {
        self.order.iter().filter(move |name| self.slots[*name].descriptor.persist)
    }
}

impl std::fmt::Debug for SettingsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsManager")
            .field("order", &self.order)
            .field("prefs", &self.prefs)
            .finish()
    }
}

fn validate_descriptor(descriptor: &SettingDescriptor) -> Result<(), ConfigError> {
    let found = descriptor.default_value.data_type();
    if found != descriptor.data_type {
        return Err(ConfigError::DefaultTypeMismatch {
            setting: descriptor.name.clone(),
            expected: descriptor.data_type,
            found,
        });
    }

    if let Some(range) = descriptor.range {
        if !range.is_valid() {
            return Err(ConfigError::InvalidRange {
                setting: descriptor.name.clone(),
                low: range.low,
                high: range.high,
            });
        }
        if let Some(v) = descriptor.default_value.as_f64() {
            if !range.contains_as(descriptor.data_type, v) {
                return Err(ConfigError::DefaultOutOfRange {
                    setting: descriptor.name.clone(),
                    value: v,
                    low: range.low,
                    high: range.high,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{shared, MemoryStore};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn denoise_descriptors() -> Vec<SettingDescriptor> {
        vec![
            SettingDescriptor::int16("maskStrength", 5).range(1.0, 10.0),
            SettingDescriptor::boolean("applyToLuminance", true),
            SettingDescriptor::double("lumMaxAmount", 0.5).precision(2).range(0.1, 0.99),
            SettingDescriptor::boolean("lumMask", true).transient(),
        ]
    }

    fn manager() -> (SettingsManager, Rc<RefCell<MemoryStore>>) {
        let store = shared(MemoryStore::new());
        let manager = SettingsManager::new(denoise_descriptors(), store.clone()).unwrap();
        (manager, store)
    }

    #[test]
    fn test_construct_starts_at_defaults() {
        let (m, _) = manager();
        assert_eq!(m.prefs(), m.defaults());
        assert_eq!(m.get_i64("maskStrength"), Some(5));
        assert_eq!(m.names(), &["maskStrength", "applyToLuminance", "lumMaxAmount", "lumMask"]);
    }

    #[test]
    fn test_construct_rejects_duplicate_names() {
        let store = shared(MemoryStore::new());
        let err = SettingsManager::new(
            vec![SettingDescriptor::boolean("a", true), SettingDescriptor::int16("a", 1)],
            store,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateSetting("a".to_string()));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_construct_rejects_default_out_of_range() {
        let store = shared(MemoryStore::new());
        let err = SettingsManager::new(
            vec![SettingDescriptor::int16("strength", 15).range(1.0, 10.0)],
            store,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DefaultOutOfRange { .. }));
    }

    #[test]
    fn test_construct_rejects_default_type_mismatch() {
        let store = shared(MemoryStore::new());
        let mut d = SettingDescriptor::int16("strength", 5);
        d.data_type = deepsky_core::DataType::Double;
        let err = SettingsManager::new(vec![d], store).unwrap_err();
        assert!(matches!(err, ConfigError::DefaultTypeMismatch { .. }));
    }

    #[test]
    fn test_construct_rejects_inverted_range() {
        let store = shared(MemoryStore::new());
        let err = SettingsManager::new(vec![SettingDescriptor::double("x", 0.5).range(1.0, 0.0)], store)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRange { .. }));
    }

    #[test]
    fn test_init_reads_persisted_values_only() {
        let (mut m, store) = manager();
        store.borrow_mut().seed("maskStrength", SettingValue::Int16(8));
        store.borrow_mut().seed("lumMask", SettingValue::Bool(false));

        m.init();

        assert_eq!(m.get_i64("maskStrength"), Some(8));
        // Non-persisted settings ignore the store
        assert_eq!(m.get_bool("lumMask"), Some(true));
    }

    #[test]
    fn test_init_type_mismatch_is_a_miss() {
        let (mut m, store) = manager();
        store.borrow_mut().seed("maskStrength", SettingValue::Double(8.0));
        m.init();
        assert_eq!(m.get_i64("maskStrength"), Some(5));
    }

    #[test]
    fn test_init_out_of_range_stored_value_is_a_miss() {
        let (mut m, store) = manager();
        store.borrow_mut().seed("maskStrength", SettingValue::Int16(15));
        m.init();
        assert_eq!(m.get_i64("maskStrength"), Some(5));
    }

    #[test]
    fn test_init_is_idempotent() {
        let (mut m, store) = manager();
        store.borrow_mut().seed("lumMaxAmount", SettingValue::Double(0.3));
        m.init();
        let once = m.prefs().clone();
        m.init();
        assert_eq!(m.prefs(), &once);
    }

    #[test]
    fn test_parameters_overlay_store() {
        let (mut m, store) = manager();
        store.borrow_mut().seed("maskStrength", SettingValue::Int16(3));
        let mut params = Parameters::new();
        params.set("maskStrength", SettingValue::Int64(9));
        params.set("lumMask", false);

        m.init();
        assert_eq!(m.get_i64("maskStrength"), Some(3));
        m.load_parameters(&params);
        assert_eq!(m.get_i64("maskStrength"), Some(9));
        // Parameters reach transient settings too
        assert_eq!(m.get_bool("lumMask"), Some(false));
        // The store is untouched
        assert_eq!(store.borrow().write_count(), 0);
    }

    #[test]
    fn test_save_parameters_skips_transient() {
        let (mut m, _) = manager();
        m.set("lumMask", false).unwrap();
        let mut params = Parameters::new();
        m.save_parameters(&mut params);

        assert!(params.has("maskStrength"));
        assert!(params.has("lumMaxAmount"));
        assert!(!params.has("lumMask"));
    }

    #[test]
    fn test_save_settings_skips_transient() {
        let (mut m, store) = manager();
        m.set("maskStrength", 7i16).unwrap();
        m.save_settings().unwrap();

        let store = store.borrow();
        assert_eq!(store.get("maskStrength"), Some(&SettingValue::Int16(7)));
        assert_eq!(store.get("lumMask"), None);
        assert_eq!(store.write_count(), 3);
        assert_eq!(store.flush_count(), 1);
    }

    #[test]
    fn test_set_rejects_out_of_range_without_clamping() {
        let (mut m, _) = manager();
        let err = m.set("maskStrength", 15i16).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
        assert_eq!(m.get_i64("maskStrength"), Some(5));

        assert!(m.set("lumMaxAmount", 1.0).is_err());
        assert_eq!(m.get_f64("lumMaxAmount"), Some(0.5));
    }

    #[test]
    fn test_float_setting_accepts_both_bounds() {
        let store = shared(MemoryStore::new());
        let mut m = SettingsManager::new(
            vec![
                SettingDescriptor::float("amount", 0.5).range(0.1, 0.99),
                SettingDescriptor::float("ceiling", 0.99).range(0.1, 0.99),
            ],
            store,
        )
        .unwrap();
        assert_eq!(m.get("ceiling"), Some(&SettingValue::Float(0.99)));

        m.set("amount", 0.99f32).unwrap();
        assert_eq!(m.get("amount"), Some(&SettingValue::Float(0.99)));
        m.set("amount", 0.1f32).unwrap();
        m.set("amount", 0.99f64).unwrap();
        m.set("amount", 0.1f64).unwrap();
        assert_eq!(m.get("amount"), Some(&SettingValue::Float(0.1)));

        assert!(m.set("amount", 1.0f32).is_err());
        assert!(m.set("amount", 0.05f64).is_err());
        assert_eq!(m.get("amount"), Some(&SettingValue::Float(0.1)));
    }

    #[test]
    fn test_set_coerces_and_rejects_types() {
        let (mut m, _) = manager();
        m.set("maskStrength", 9i64).unwrap();
        assert_eq!(m.get("maskStrength"), Some(&SettingValue::Int16(9)));

        let err = m.set("maskStrength", 2.5).unwrap_err();
        assert!(matches!(err, ConfigError::TypeMismatch { .. }));

        let err = m.set("nope", true).unwrap_err();
        assert_eq!(err, ConfigError::UnknownSetting("nope".to_string()));
    }

    #[test]
    fn test_reset_restores_defaults_notifies_and_saves() {
        let (mut m, store) = manager();
        m.set("maskStrength", 2i16).unwrap();
        m.set("applyToLuminance", false).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        for name in ["maskStrength", "applyToLuminance"] {
            let seen = seen.clone();
            m.on_reset(name, Box::new(move |v| seen.borrow_mut().push(v.clone()))).unwrap();
        }

        m.reset().unwrap();

        assert_eq!(m.prefs(), m.defaults());
        assert_eq!(
            *seen.borrow(),
            vec![SettingValue::Int16(5), SettingValue::Bool(true)]
        );
        assert_eq!(store.borrow().get("maskStrength"), Some(&SettingValue::Int16(5)));
    }

    #[test]
    fn test_reset_observers_coexist() {
        let (mut m, _) = manager();
        let count = Rc::new(RefCell::new(0));
        for _ in 0..3 {
            let count = count.clone();
            m.on_reset("maskStrength", Box::new(move |_| *count.borrow_mut() += 1)).unwrap();
        }
        assert_eq!(m.reset_observer_count("maskStrength"), 3);
        m.reset().unwrap();
        assert_eq!(*count.borrow(), 3);
    }

    #[test]
    fn test_out_of_range_write_never_reaches_store() {
        let store = shared(MemoryStore::new());
        let descriptors = vec![SettingDescriptor::int16("strength", 10).range(1.0, 10.0)];

        let mut m = SettingsManager::new(descriptors.clone(), store.clone()).unwrap();
        m.init();
        assert_eq!(m.get_i64("strength"), Some(10));
        assert!(m.set("strength", 15i16).is_err());
        m.save_settings().unwrap();

        let mut fresh = SettingsManager::new(descriptors, store).unwrap();
        fresh.init();
        assert_eq!(fresh.get_i64("strength"), Some(10));
    }
}
