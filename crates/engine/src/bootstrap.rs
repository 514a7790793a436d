//! Entry sequence of a feature.
//!
//! ```text
//! Unconfigured -> ConfiguredFromStore -> HeadlessRun    -> Done
//!                                     -> InteractiveRun -> Done
//! ```
//!
//! Every run starts by rebuilding the feature's `SettingsManager` from its
//! descriptors and loading the persisted store. A view or global target then
//! overlays the one-shot parameters and runs the main operation once; no
//! target opens the control surface, which decides how often (if ever) the
//! main operation runs.

use deepsky_config::{debug_ln, SettingsManager};

use crate::error::EngineError;
use crate::host::{ImageHost, Invocation, InvocationTarget, ViewHandle};
use crate::registry::{FeatureHandle, SurfaceHandle};
use crate::surface::DialogSession;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Unconfigured,
    ConfiguredFromStore,
    HeadlessRun,
    InteractiveRun,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPath {
    Headless,
    Interactive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub path: RunPath,
    /// Times the main operation actually ran.
    pub main_invocations: usize,
    /// Times validation refused to run it.
    pub rejected: usize,
    /// `close_on_exit` when the run ended.
    pub close_on_exit: bool,
}

pub struct Bootstrap {
    handle: FeatureHandle,
    close_on_exit: bool,
    state: BootstrapState,
}

impl Bootstrap {
    pub fn new(handle: FeatureHandle) -> Self {
        Self {
            close_on_exit: handle.feature().close_on_exit(),
            handle,
            state: BootstrapState::Unconfigured,
        }
    }

    /// Initial `close_on_exit` for each run.
    pub fn close_on_exit(mut self, close_on_exit: bool) -> Self {
        self.close_on_exit = close_on_exit;
        self
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    pub fn handle(&self) -> &FeatureHandle {
        &self.handle
    }

    /// Run the feature once for `invocation`.
    ///
    /// `factory` builds the control surface and is only called for
    /// interactive runs.
    pub fn run<F>(
        &mut self,
        host: &mut dyn ImageHost,
        invocation: &Invocation,
        factory: F,
    ) -> Result<RunOutcome, EngineError>
    where
        F: FnOnce(&FeatureHandle) -> Result<SurfaceHandle, EngineError>,
    {
        debug_ln!(
            self.handle.debug(),
            "Bootstrap called for feature {} with close on exit {}",
            self.handle.name(),
            self.close_on_exit
        );
        self.state = BootstrapState::Unconfigured;
        self.configure(host)?;
        log::info!("{}: v{} invoked", self.handle.title(), VERSION);

        let headless_view = match &invocation.target {
            InvocationTarget::View(view) => Some(Some(view.clone())),
            InvocationTarget::Global => Some(host.active_view()),
            InvocationTarget::None => None,
        };

        match headless_view {
            Some(view) => self.run_headless(host, invocation, view),
            None => self.run_interactive(host, factory),
        }
    }

    fn run_headless(
        &mut self,
        host: &mut dyn ImageHost,
        invocation: &Invocation,
        view: Option<ViewHandle>,
    ) -> Result<RunOutcome, EngineError> {
        let state = self.handle.state();
        {
            let mut cx = state.borrow_mut();
            cx.config.load_parameters(&invocation.parameters);
            cx.view = view;
        }
        self.state = BootstrapState::HeadlessRun;
        debug_ln!(self.handle.debug(), "Executing with target {:?}", state.borrow().view);

        let ran = self.handle.invoke_main(host)?.ran();
        state.borrow_mut().close_on_exit = true;
        self.state = BootstrapState::Done;

        Ok(RunOutcome {
            path: RunPath::Headless,
            main_invocations: usize::from(ran),
            rejected: usize::from(!ran),
            close_on_exit: true,
        })
    }

    fn run_interactive<F>(&mut self, host: &mut dyn ImageHost, factory: F) -> Result<RunOutcome, EngineError>
    where
        F: FnOnce(&FeatureHandle) -> Result<SurfaceHandle, EngineError>,
    {
        let state = self.handle.state();
        state.borrow_mut().view = host.active_view();
        self.state = BootstrapState::InteractiveRun;
        debug_ln!(self.handle.debug(), "Launching dialog with target {:?}", state.borrow().view);

        let surface = factory(&self.handle)?;
        self.handle.set_dialog(surface.clone());

        let (result, main_invocations, rejected) = {
            let mut session = DialogSession::new(&self.handle, host);
            let result = surface.borrow_mut().execute(&mut session);
            (result, session.main_invocations(), session.rejected())
        };
        state.borrow_mut().progress.clear_callback();
        result?;

        self.state = BootstrapState::Done;
        let close_on_exit = state.borrow().close_on_exit;
        Ok(RunOutcome {
            path: RunPath::Interactive,
            main_invocations,
            rejected,
            close_on_exit,
        })
    }

    /// Close scratch views a failed run left behind, then rebuild the
    /// settings manager and load the persisted store.
    fn configure(&mut self, host: &mut dyn ImageHost) -> Result<(), EngineError> {
        let state = self.handle.state();
        let mut cx = state.borrow_mut();

        for (slot, view) in cx.scratch.drain("bootstrap") {
            log::warn!("{}: closing {} left in scratch slot '{}'", self.handle.title(), view.id, slot);
            host.close_view(&view);
        }
        cx.scratch.clear_ledger();

        debug_ln!(self.handle.debug(), "Creating settings manager...");

        let store = cx.config.store();
        let mut config = SettingsManager::new(self.handle.descriptors(), store)?;
        config.init();
        cx.config = config;
        cx.close_on_exit = self.close_on_exit;
        cx.progress.begin(0);

        debug_ln!(self.handle.debug(), "Settings initialized");
        self.state = BootstrapState::ConfiguredFromStore;
        Ok(())
    }
}
