//! Per-feature execution state and the context passed to every operation.

use std::collections::BTreeMap;

use deepsky_config::debug_ln;
use deepsky_config::{ConfigError, DebugChannel, SettingsManager};
use deepsky_core::SettingValue;

use crate::error::EngineError;
use crate::host::{ImageHost, MaskBinding, ProcessingJob, ViewHandle};
use crate::progress::Progress;
use crate::scratch::ScratchTable;

/// Mutable state owned by one feature for the life of the process.
///
/// Created at registration with an empty scratch table. Bootstrap rebuilds
/// `config` and assigns `view` at the start of every run.
#[derive(Debug)]
pub struct ExecutionContext {
    pub view: Option<ViewHandle>,
    pub config: SettingsManager,
    pub scratch: ScratchTable,
    pub progress: Progress,
    /// When set, the run ends (headless) or the control surface closes
    /// (interactive) once the current operation returns.
    pub close_on_exit: bool,
    /// Feature-specific transient values, e.g. a selected channel index.
    pub extras: BTreeMap<String, SettingValue>,
}

impl ExecutionContext {
    pub fn new(config: SettingsManager) -> Self {
        Self {
            view: None,
            config,
            scratch: ScratchTable::new(),
            progress: Progress::new(),
            close_on_exit: false,
            extras: BTreeMap::new(),
        }
    }
}

/// Everything an operation may touch, passed explicitly.
pub struct OperationContext<'a> {
    pub state: &'a mut ExecutionContext,
    pub host: &'a mut dyn ImageHost,
    pub debug: &'a DebugChannel,
    /// Feature title, prefixed to status lines.
    pub title: &'a str,
}

impl<'a> OperationContext<'a> {
    pub fn view(&self) -> Option<&ViewHandle> {
        self.state.view.as_ref()
    }

    /// The target view, or `EngineError::NoView`.
    pub fn require_view(&self) -> Result<ViewHandle, EngineError> {
        self.state.view.clone().ok_or(EngineError::NoView)
    }

    pub fn config(&self) -> &SettingsManager {
        &self.state.config
    }

    pub fn setting_bool(&self, name: &str) -> Result<bool, EngineError> {
        self.state.config.get_bool(name).ok_or_else(|| unknown(name))
    }

    pub fn setting_i64(&self, name: &str) -> Result<i64, EngineError> {
        self.state.config.get_i64(name).ok_or_else(|| unknown(name))
    }

    pub fn setting_f64(&self, name: &str) -> Result<f64, EngineError> {
        self.state.config.get_f64(name).ok_or_else(|| unknown(name))
    }

    /// Status line, `<Title>: <message>`.
    pub fn write_line(&self, message: &str) {
        log::info!("{}: {}", self.title, message);
    }

    /// Report `message` to the progress callback and log it, without
    /// advancing the step counter.
    pub fn show_status(&mut self, message: &str) {
        self.state.progress.update(message);
        self.write_line(message);
    }

    /// Advance progress by one step and log the step message.
    pub fn show_step(&mut self, message: &str) {
        let line = self.state.progress.show_step(message);
        debug_ln!(self.debug, "{}", line);
        self.write_line(message);
    }

    /// Run `job` on `view` through the host.
    pub fn execute(&mut self, job: &ProcessingJob, view: &ViewHandle) -> Result<(), EngineError> {
        debug_ln!(self.debug, "Executing {} on {}", job.process, view.id);
        self.host.execute_on(job, view)?;
        Ok(())
    }

    /// Open `job`'s process interface for the user.
    pub fn launch(&mut self, job: &ProcessingJob) -> Result<(), EngineError> {
        debug_ln!(self.debug, "Launching {}", job.process);
        self.host.launch(job)?;
        Ok(())
    }

    pub fn set_mask(&mut self, view: &ViewHandle, mask: Option<MaskBinding>) {
        debug_ln!(self.debug, "Mask on {}: {:?}", view.id, mask);
        self.host.set_mask(view, mask);
    }

    /// Record `view` in scratch slot `slot`, created by `step`.
    pub fn create_scratch(&mut self, slot: &str, view: ViewHandle, step: &str) -> Result<(), EngineError> {
        debug_ln!(self.debug, "Scratch {} = {} ({})", slot, view.id, step);
        self.state.scratch.insert(slot, view, step)?;
        Ok(())
    }

    pub fn scratch(&self, slot: &str) -> Result<ViewHandle, EngineError> {
        Ok(self.state.scratch.get(slot)?.clone())
    }

    /// Empty scratch slot `slot` and close its view.
    pub fn release_scratch(&mut self, slot: &str, step: &str) -> Result<(), EngineError> {
        let view = self.state.scratch.release(slot, step)?;
        debug_ln!(self.debug, "Released scratch {} ({}) in {}", slot, view.id, step);
        self.host.close_view(&view);
        Ok(())
    }

    /// Empty scratch slot `slot` but leave its view open: the view is a
    /// result handed to the user.
    pub fn keep_scratch(&mut self, slot: &str, step: &str) -> Result<ViewHandle, EngineError> {
        let view = self.state.scratch.release(slot, step)?;
        debug_ln!(self.debug, "Kept scratch {} ({}) in {}", slot, view.id, step);
        Ok(view)
    }

    /// Transient value stored with the feature's state, e.g. a view the
    /// user picked on the control surface.
    pub fn extra(&self, key: &str) -> Option<&SettingValue> {
        self.state.extras.get(key)
    }
}

fn unknown(name: &str) -> EngineError {
    EngineError::Config(ConfigError::UnknownSetting(name.to_string()))
}
