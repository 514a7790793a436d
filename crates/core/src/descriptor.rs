//! Declarative setting descriptors
//!
//! A feature supplies its settings as a list of descriptors at registration
//! time. Descriptors are plain data; the settings manager is what enforces
//! uniqueness and range rules when it is built from them.

use serde::{Deserialize, Serialize};

use crate::value::{DataType, SettingValue};

/// Inclusive numeric bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub low: f64,
    pub high: f64,
}

impl Range {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    /// Membership at the precision of `data_type`.
    ///
    /// `float` settings compare in `f32`, so a bound written as an `f64`
    /// literal admits the nearest `f32` value on either side of it.
    pub fn contains_as(&self, data_type: DataType, value: f64) -> bool {
        match data_type {
            DataType::Float => {
                let value = value as f32;
                value >= self.low as f32 && value <= self.high as f32
            }
            _ => self.contains(value),
        }
    }

    /// `low <= high` and neither bound is NaN.
    pub fn is_valid(&self) -> bool {
        self.low <= self.high
    }
}

fn default_persist() -> bool {
    true
}

/// One typed, optionally persisted setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingDescriptor {
    /// Unique within a feature; also the key in the store and parameter channel.
    pub name: String,
    pub data_type: DataType,
    pub default_value: SettingValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    /// Decimal places shown for numeric values.
    #[serde(default)]
    pub precision: u32,
    /// Required for numeric settings exposed through a numeric control.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    /// When false the setting never reaches the store or the parameter channel.
    #[serde(default = "default_persist")]
    pub persist: bool,
}

impl SettingDescriptor {
    /// Create a descriptor. The default's type is taken as the data type.
    pub fn new(name: impl Into<String>, default_value: impl Into<SettingValue>) -> Self {
        let default_value = default_value.into();
        Self {
            name: name.into(),
            data_type: default_value.data_type(),
            default_value,
            label: None,
            tooltip: None,
            precision: 0,
            range: None,
            persist: true,
        }
    }

    pub fn boolean(name: impl Into<String>, default_value: bool) -> Self {
        Self::new(name, default_value)
    }

    pub fn int16(name: impl Into<String>, default_value: i16) -> Self {
        Self::new(name, default_value)
    }

    pub fn int32(name: impl Into<String>, default_value: i32) -> Self {
        Self::new(name, default_value)
    }

    pub fn int64(name: impl Into<String>, default_value: i64) -> Self {
        Self::new(name, default_value)
    }

    pub fn double(name: impl Into<String>, default_value: f64) -> Self {
        Self::new(name, default_value)
    }

    pub fn float(name: impl Into<String>, default_value: f32) -> Self {
        Self::new(name, default_value)
    }

    pub fn string(name: impl Into<String>, default_value: impl Into<String>) -> Self {
        Self::new(name, SettingValue::String(default_value.into()))
    }

    /// Set the display label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the tooltip.
    pub fn tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    /// Set the valid range.
    pub fn range(mut self, low: f64, high: f64) -> Self {
        self.range = Some(Range::new(low, high));
        self
    }

    /// Keep this setting out of the store and the parameter channel.
    pub fn transient(mut self) -> Self {
        self.persist = false;
        self
    }

    /// Label for display, falling back to the setting name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// True if `value` is numeric and lies outside the declared range.
    ///
    /// Settings without a range, and non-numeric values, are never out of range.
    pub fn is_out_of_range(&self, value: &SettingValue) -> bool {
        match (self.range, value.as_f64()) {
            (Some(range), Some(v)) => !range.contains_as(self.data_type, v),
            _ => false,
        }
    }
}
