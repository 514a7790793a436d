use std::fmt;

use deepsky_core::DataType;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Two descriptors in one feature share a name.
    DuplicateSetting(String),
    /// A descriptor's default value is not of its declared type.
    DefaultTypeMismatch { setting: String, expected: DataType, found: DataType },
    /// A numeric default lies outside the declared range.
    DefaultOutOfRange { setting: String, value: f64, low: f64, high: f64 },
    /// Range with `low > high` (or NaN bounds).
    InvalidRange { setting: String, low: f64, high: f64 },
    /// A numeric control was bound to a setting that declares no range.
    MissingRange(String),
    /// No setting with this name.
    UnknownSetting(String),
    /// Assignment of a value of the wrong type.
    TypeMismatch { setting: String, expected: DataType, found: DataType },
    /// Assignment of a numeric value outside the declared range.
    OutOfRange { setting: String, value: f64, low: f64, high: f64 },
    /// Host configuration file could not be parsed.
    HostConfig(String),
    /// Persisted store failure.
    Store(StoreError),
}

impl ConfigError {
    /// True for errors detected while declaring settings, as opposed to
    /// rejected assignments at run time.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateSetting(_)
                | Self::DefaultTypeMismatch { .. }
                | Self::DefaultOutOfRange { .. }
                | Self::InvalidRange { .. }
                | Self::MissingRange(_)
        )
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateSetting(name) => write!(f, "duplicate setting '{name}'"),
            Self::DefaultTypeMismatch { setting, expected, found } => {
                write!(f, "setting '{setting}': default is {found}, declared {expected}")
            }
            Self::DefaultOutOfRange { setting, value, low, high } => {
                write!(f, "setting '{setting}': default {value} outside [{low}, {high}]")
            }
            Self::InvalidRange { setting, low, high } => {
                write!(f, "setting '{setting}': invalid range [{low}, {high}]")
            }
            Self::MissingRange(name) => write!(f, "setting '{name}' has no range"),
            Self::UnknownSetting(name) => write!(f, "unknown setting '{name}'"),
            Self::TypeMismatch { setting, expected, found } => {
                write!(f, "setting '{setting}': expected {expected}, got {found}")
            }
            Self::OutOfRange { setting, value, low, high } => {
                write!(f, "setting '{setting}': {value} outside [{low}, {high}]")
            }
            Self::HostConfig(msg) => write!(f, "host config error: {msg}"),
            Self::Store(e) => write!(f, "settings store error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<StoreError> for ConfigError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// File read/write failure.
    Io(String),
    /// Store contents could not be (de)serialized.
    Serialize(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Serialize(msg) => write!(f, "serialization error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}
