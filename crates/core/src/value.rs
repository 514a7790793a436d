//! Setting data types and values
//!
//! The persisted store and the parameter channel only understand a closed set
//! of scalar types. `SettingValue` carries its type with it so a value read
//! back from either place can be checked against the declaring descriptor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar types a setting may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Int16,
    Int32,
    Int64,
    Double,
    Float,
    String,
}

impl DataType {
    /// Integer or real.
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_real()
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::Int16 | DataType::Int32 | DataType::Int64)
    }

    pub fn is_real(&self) -> bool {
        matches!(self, DataType::Double | DataType::Float)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Double => "double",
            DataType::Float => "float",
            DataType::String => "string",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed setting value.
///
/// # Serialization
/// Values are written as `{"type": "int16", "value": 5}` so the type survives
/// a round trip through JSON, where every number looks the same.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SettingValue {
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Float(f32),
    String(String),
}

impl SettingValue {
    pub fn data_type(&self) -> DataType {
        match self {
            SettingValue::Bool(_) => DataType::Bool,
            SettingValue::Int16(_) => DataType::Int16,
            SettingValue::Int32(_) => DataType::Int32,
            SettingValue::Int64(_) => DataType::Int64,
            SettingValue::Double(_) => DataType::Double,
            SettingValue::Float(_) => DataType::Float,
            SettingValue::String(_) => DataType::String,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view; `None` for reals, booleans and strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Int16(v) => Some(*v as i64),
            SettingValue::Int32(v) => Some(*v as i64),
            SettingValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of any integer or real value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Double(v) => Some(*v),
            SettingValue::Float(v) => Some(*v as f64),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Build an integer value of the given type, if `value` fits.
    pub fn from_integer(data_type: DataType, value: i64) -> Option<SettingValue> {
        match data_type {
            DataType::Int16 => i16::try_from(value).ok().map(SettingValue::Int16),
            DataType::Int32 => i32::try_from(value).ok().map(SettingValue::Int32),
            DataType::Int64 => Some(SettingValue::Int64(value)),
            DataType::Double => Some(SettingValue::Double(value as f64)),
            DataType::Float => Some(SettingValue::Float(value as f32)),
            DataType::Bool | DataType::String => None,
        }
    }

    /// Build a real value of the given type. Integer targets are refused.
    pub fn from_real(data_type: DataType, value: f64) -> Option<SettingValue> {
        match data_type {
            DataType::Double => Some(SettingValue::Double(value)),
            DataType::Float => Some(SettingValue::Float(value as f32)),
            _ => None,
        }
    }

    /// Convert this value to `target`.
    ///
    /// Integers convert between integer widths when they fit and widen into
    /// reals; reals convert between float and double. Booleans and strings
    /// only "convert" to themselves.
    pub fn coerce(&self, target: DataType) -> Option<SettingValue> {
        if self.data_type() == target {
            return Some(self.clone());
        }
        if let Some(i) = self.as_i64() {
            return SettingValue::from_integer(target, i);
        }
        match self {
            SettingValue::Double(v) => SettingValue::from_real(target, *v),
            SettingValue::Float(v) => SettingValue::from_real(target, *v as f64),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(v) => write!(f, "{v}"),
            SettingValue::Int16(v) => write!(f, "{v}"),
            SettingValue::Int32(v) => write!(f, "{v}"),
            SettingValue::Int64(v) => write!(f, "{v}"),
            SettingValue::Double(v) => write!(f, "{v}"),
            SettingValue::Float(v) => write!(f, "{v}"),
            SettingValue::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<i16> for SettingValue {
    fn from(v: i16) -> Self {
        SettingValue::Int16(v)
    }
}

impl From<i32> for SettingValue {
    fn from(v: i32) -> Self {
        SettingValue::Int32(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        SettingValue::Int64(v)
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        SettingValue::Double(v)
    }
}

impl From<f32> for SettingValue {
    fn from(v: f32) -> Self {
        SettingValue::Float(v)
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        SettingValue::String(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::String(v.to_string())
    }
}
