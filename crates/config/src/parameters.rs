//! One-shot parameter channel
//!
//! Parameters are attached to a single headless invocation by the host and
//! cleared between invocations. They are separate from the persisted store:
//! loading them overlays the live values without touching durable storage.
//!
//! The typed getters mirror how a host hands parameters over: integers of
//! every width come back through `get_integer`, reals through `get_real`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use deepsky_core::{DataType, SettingValue};

use crate::error::StoreError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters {
    values: BTreeMap<String, SettingValue>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<SettingValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Raw value as stored.
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn get_boolean(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(SettingValue::as_bool)
    }

    /// Any integer width, widened to i64.
    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(SettingValue::as_i64)
    }

    /// Any numeric value as f64.
    pub fn get_real(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(SettingValue::as_f64)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    /// Read `key` through the getter matching `data_type` and convert the
    /// result to that type. `None` if absent or not convertible.
    pub fn get_typed(&self, key: &str, data_type: DataType) -> Option<SettingValue> {
        match data_type {
            DataType::Bool => self.get_boolean(key).map(SettingValue::Bool),
            DataType::Int16 | DataType::Int32 | DataType::Int64 => self
                .get_integer(key)
                .and_then(|i| SettingValue::from_integer(data_type, i)),
            DataType::Double | DataType::Float => self
                .get_real(key)
                .and_then(|r| SettingValue::from_real(data_type, r)),
            DataType::String => self.get_string(key).map(SettingValue::String),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<SettingValue> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }
}
