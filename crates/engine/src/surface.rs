//! Control-surface session
//!
//! A control surface is the interactive dialog of a feature. The widgets are
//! the host's business; what the surface does with them goes through a
//! `DialogSession`: apply, reset, new instance, close. The session owns the
//! rules around those actions so every surface behaves the same.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use deepsky_config::{debug_ln, Parameters};

use crate::context::ExecutionContext;
use crate::error::{EngineError, ValidationFailure};
use crate::host::ImageHost;
use crate::progress::ProgressCallback;
use crate::registry::{FeatureHandle, MainOutcome, SurfaceHandle};

/// The interactive front end of a feature.
pub trait ControlSurface {
    /// Show the surface and process user actions until it closes.
    fn execute(&mut self, session: &mut DialogSession<'_>) -> Result<(), EngineError>;
}

/// Wrap a surface for storage on its feature handle.
pub fn share<S: ControlSurface + 'static>(surface: S) -> SurfaceHandle {
    Rc::new(RefCell::new(surface))
}

/// Surface for features without controls: applies once, then closes.
#[derive(Debug, Default)]
pub struct ImmediateSurface;

impl ControlSurface for ImmediateSurface {
    fn execute(&mut self, session: &mut DialogSession<'_>) -> Result<(), EngineError> {
        session.apply()?;
        session.close();
        Ok(())
    }
}

pub struct DialogSession<'a> {
    handle: &'a FeatureHandle,
    host: &'a mut dyn ImageHost,
    open: bool,
    main_invocations: usize,
    rejected: usize,
    last_failure: Option<ValidationFailure>,
    instances: Vec<Parameters>,
}

impl<'a> DialogSession<'a> {
    pub fn new(handle: &'a FeatureHandle, host: &'a mut dyn ImageHost) -> Self {
        Self {
            handle,
            host,
            open: true,
            main_invocations: 0,
            rejected: 0,
            last_failure: None,
            instances: Vec::new(),
        }
    }

    pub fn handle(&self) -> &FeatureHandle {
        self.handle
    }

    pub fn state(&self) -> Rc<RefCell<ExecutionContext>> {
        self.handle.state()
    }

    pub fn host(&mut self) -> &mut dyn ImageHost {
        &mut *self.host
    }

    /// Route progress messages to the surface, e.g. a progress label.
    pub fn set_progress(&self, callback: ProgressCallback) {
        self.handle.state().borrow_mut().progress.set_callback(callback);
    }

    /// Apply the current settings to the target.
    ///
    /// On success the main operation has run, settings are saved and the
    /// surface closes. On validation failure nothing runs, `close_on_exit`
    /// is cleared and the surface stays open.
    pub fn apply(&mut self) -> Result<MainOutcome, EngineError> {
        debug_ln!(self.handle.debug(), "Apply requested");

        let outcome = self.handle.invoke_main(&mut *self.host)?;
        let state = self.handle.state();
        match &outcome {
            MainOutcome::Ran => {
                self.main_invocations += 1;
                self.last_failure = None;
                let mut state = state.borrow_mut();
                state.close_on_exit = true;
                state.config.save_settings()?;
            }
            MainOutcome::Rejected(failure) => {
                self.rejected += 1;
                self.last_failure = Some(failure.clone());
                state.borrow_mut().close_on_exit = false;
            }
        }

        if state.borrow().close_on_exit {
            self.close();
        }
        Ok(outcome)
    }

    /// Restore defaults. Bound controls refresh through their reset observers.
    pub fn reset(&mut self) -> Result<(), EngineError> {
        debug_ln!(self.handle.debug(), "Reset requested");
        self.handle.state().borrow_mut().config.reset()?;
        Ok(())
    }

    /// Capture the persisted settings as a parameter set the host can
    /// replay headlessly.
    pub fn new_instance(&mut self) -> Parameters {
        let mut parameters = Parameters::new();
        self.handle.state().borrow().config.save_parameters(&mut parameters);
        debug_ln!(self.handle.debug(), "New instance with {} parameters", parameters.len());
        self.instances.push(parameters.clone());
        parameters
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn main_invocations(&self) -> usize {
        self.main_invocations
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn last_failure(&self) -> Option<&ValidationFailure> {
        self.last_failure.as_ref()
    }

    /// Parameter sets produced by `new_instance`, oldest first.
    pub fn instances(&self) -> &[Parameters] {
        &self.instances
    }
}

impl fmt::Debug for DialogSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogSession")
            .field("feature", &self.handle.name())
            .field("open", &self.open)
            .field("main_invocations", &self.main_invocations)
            .field("rejected", &self.rejected)
            .finish()
    }
}
