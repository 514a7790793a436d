// Core types shared by the settings layer and the feature engine

pub mod descriptor;
pub mod value;

pub use descriptor::{Range, SettingDescriptor};
pub use value::{DataType, SettingValue};
