//! Controls bound to a setting
//!
//! A bound control displays the live value of one setting and writes edits
//! back through `SettingsManager::set`. An edit the manager rejects (out of
//! range, wrong type) leaves the setting alone and snaps the display back to
//! the live value. On reset the control refreshes from a reset observer it
//! registers when bound.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use deepsky_config::ConfigError;
use deepsky_core::{DataType, Range, SettingValue};

use crate::context::ExecutionContext;
use crate::error::EngineError;

type SharedState = Rc<RefCell<ExecutionContext>>;

// ============================================================================
// Numeric control
// ============================================================================

/// Label, slider and edit box for a numeric setting.
pub struct NumericControl {
    state: SharedState,
    setting: String,
    data_type: DataType,
    pub label: String,
    pub tooltip: Option<String>,
    pub range: Range,
    pub precision: u32,
    /// Integer positions of the slider widget, mapped linearly onto `range`.
    pub slider_range: (i32, i32),
    value: Rc<Cell<f64>>,
}

impl NumericControl {
    /// Bind to `setting`. The setting must be numeric and declare a range.
    pub fn bind(state: &SharedState, setting: &str) -> Result<Self, EngineError> {
        let value = Rc::new(Cell::new(0.0));
        let control = {
            let mut cx = state.borrow_mut();
            let descriptor = cx
                .config
                .descriptor(setting)
                .ok_or_else(|| ConfigError::UnknownSetting(setting.to_string()))?;
            if !descriptor.data_type.is_numeric() {
                return Err(ConfigError::TypeMismatch {
                    setting: setting.to_string(),
                    expected: DataType::Double,
                    found: descriptor.data_type,
                }
                .into());
            }
            let range = descriptor
                .range
                .ok_or_else(|| ConfigError::MissingRange(setting.to_string()))?;

            let control = Self {
                state: state.clone(),
                setting: setting.to_string(),
                data_type: descriptor.data_type,
                label: descriptor.display_label().to_string(),
                tooltip: descriptor.tooltip.clone(),
                range,
                precision: descriptor.precision,
                slider_range: (0, 100),
                value: value.clone(),
            };

            value.set(cx.config.get_f64(setting).unwrap_or(range.low));
            let observed = value.clone();
            cx.config.on_reset(
                setting,
                Box::new(move |v: &SettingValue| {
                    if let Some(v) = v.as_f64() {
                        observed.set(v);
                    }
                }),
            )?;
            control
        };
        Ok(control)
    }

    pub fn with_slider_range(mut self, low: i32, high: i32) -> Self {
        self.slider_range = (low, high);
        self
    }

    pub fn setting(&self) -> &str {
        &self.setting
    }

    /// Displayed value.
    pub fn value(&self) -> f64 {
        self.value.get()
    }

    /// Displayed value formatted with the setting's precision.
    pub fn text(&self) -> String {
        format!("{:.*}", self.precision as usize, self.value.get())
    }

    /// The user typed `value`.
    ///
    /// Rejected edits leave the setting unchanged and restore the display.
    pub fn edit(&self, value: f64) -> Result<(), ConfigError> {
        let mut cx = self.state.borrow_mut();
        let result = if self.data_type.is_integer() {
            cx.config.set(&self.setting, value.round() as i64)
        } else {
            cx.config.set(&self.setting, value)
        };

        let shown = cx.config.get_f64(&self.setting).unwrap_or(self.value.get());
        self.value.set(shown);
        result
    }

    /// The user moved the slider to `position`, clamped to the slider range.
    pub fn slide(&self, position: i32) -> Result<(), ConfigError> {
        let (low, high) = self.slider_range;
        let position = position.clamp(low.min(high), high.max(low));
        let span = (high - low) as f64;
        let fraction = if span == 0.0 { 0.0 } else { (position - low) as f64 / span };
        let value = self.range.low + fraction * (self.range.high - self.range.low);
        self.edit(value.clamp(self.range.low, self.range.high))
    }

    /// Slider position for the displayed value.
    pub fn slider_position(&self) -> i32 {
        let (low, high) = self.slider_range;
        let width = self.range.high - self.range.low;
        if width == 0.0 {
            return low;
        }
        let fraction = (self.value.get() - self.range.low) / width;
        low + (fraction * (high - low) as f64).round() as i32
    }
}

// ============================================================================
// Check box
// ============================================================================

/// Check box for a boolean setting.
pub struct CheckBox {
    state: SharedState,
    setting: String,
    pub label: String,
    pub tooltip: Option<String>,
    checked: Rc<Cell<bool>>,
}

impl CheckBox {
    pub fn bind(state: &SharedState, setting: &str) -> Result<Self, EngineError> {
        let mut cx = state.borrow_mut();
        let descriptor = cx
            .config
            .descriptor(setting)
            .ok_or_else(|| ConfigError::UnknownSetting(setting.to_string()))?;
        if descriptor.data_type != DataType::Bool {
            return Err(ConfigError::TypeMismatch {
                setting: setting.to_string(),
                expected: DataType::Bool,
                found: descriptor.data_type,
            }
            .into());
        }

        let label = descriptor.display_label().to_string();
        let tooltip = descriptor.tooltip.clone();
        let checked = Rc::new(Cell::new(cx.config.get_bool(setting).unwrap_or(false)));
        let observed = checked.clone();
        cx.config.on_reset(
            setting,
            Box::new(move |v: &SettingValue| {
                if let Some(v) = v.as_bool() {
                    observed.set(v);
                }
            }),
        )?;

        Ok(Self {
            state: state.clone(),
            setting: setting.to_string(),
            label,
            tooltip,
            checked,
        })
    }

    pub fn setting(&self) -> &str {
        &self.setting
    }

    pub fn is_checked(&self) -> bool {
        self.checked.get()
    }

    pub fn set_checked(&self, checked: bool) -> Result<(), ConfigError> {
        let result = self.state.borrow_mut().config.set(&self.setting, checked);
        if result.is_ok() {
            self.checked.set(checked);
        }
        result
    }

    pub fn toggle(&self) -> Result<(), ConfigError> {
        self.set_checked(!self.checked.get())
    }
}
