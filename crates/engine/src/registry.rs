//! Feature registry
//!
//! Maps feature names to their registration: the feature itself, its
//! execution state and (once an interactive run has happened) its control
//! surface. Registration hands back a `FeatureHandle`; callers pass that
//! handle to Bootstrap and to control surfaces instead of looking up an
//! "active" feature.
//!
//! # Invariants
//!
//! - One registration per name. A second `register` under the same name is
//!   refused and the first registration, including the identity of its
//!   `ExecutionContext`, is left untouched.
//! - Registrations live as long as the registry.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use deepsky_config::debug::{self, DebugChannel};
use deepsky_config::{debug_ln, SettingsManager, SharedStore};
use deepsky_core::SettingDescriptor;

use crate::context::{ExecutionContext, OperationContext};
use crate::error::{EngineError, ValidationFailure};
use crate::feature::Feature;
use crate::host::ImageHost;
use crate::surface::ControlSurface;

/// Shared handle to a control surface.
pub type SurfaceHandle = Rc<RefCell<dyn ControlSurface>>;

struct Registration {
    name: String,
    title: String,
    feature: Box<dyn Feature>,
    state: Rc<RefCell<ExecutionContext>>,
    dialog: RefCell<Option<SurfaceHandle>>,
    debug: DebugChannel,
}

/// Result of asking a feature to run its main operation.
#[derive(Debug, Clone, PartialEq)]
pub enum MainOutcome {
    Ran,
    /// Validation refused the run; nothing was executed.
    Rejected(ValidationFailure),
}

impl MainOutcome {
    pub fn ran(&self) -> bool {
        matches!(self, Self::Ran)
    }
}

/// A registered feature. Cloning is cheap and clones share everything.
#[derive(Clone)]
pub struct FeatureHandle {
    inner: Rc<Registration>,
}

impl FeatureHandle {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn title(&self) -> &str {
        &self.inner.title
    }

    pub fn feature(&self) -> &dyn Feature {
        self.inner.feature.as_ref()
    }

    pub fn descriptors(&self) -> Vec<SettingDescriptor> {
        self.inner.feature.descriptors()
    }

    /// The feature's execution state.
    pub fn state(&self) -> Rc<RefCell<ExecutionContext>> {
        self.inner.state.clone()
    }

    /// Control surface from the most recent interactive run.
    pub fn dialog(&self) -> Option<SurfaceHandle> {
        self.inner.dialog.borrow().clone()
    }

    pub fn set_dialog(&self, dialog: SurfaceHandle) {
        *self.inner.dialog.borrow_mut() = Some(dialog);
    }

    pub fn debug(&self) -> &DebugChannel {
        &self.inner.debug
    }

    /// True if both handles refer to the same registration.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Run the feature's validation.
    ///
    /// A failure is shown to the user through `ImageHost::alert` and sets
    /// `close_on_exit`.
    pub fn validate(&self, host: &mut dyn ImageHost) -> Result<(), ValidationFailure> {
        let mut state = self.inner.state.borrow_mut();
        let result = {
            let cx = OperationContext {
                state: &mut *state,
                host: &mut *host,
                debug: &self.inner.debug,
                title: &self.inner.title,
            };
            self.inner.feature.validate(&cx)
        };

        if let Err(failure) = &result {
            log::warn!("{}: {}", self.inner.title, failure);
            state.close_on_exit = true;
            host.alert("Validation failed", &failure.message);
        }
        result
    }

    /// Validate, then run the main operation if validation passed.
    ///
    /// Processing-job failures propagate as `Err`; nothing is retried.
    pub fn invoke_main(&self, host: &mut dyn ImageHost) -> Result<MainOutcome, EngineError> {
        if let Err(failure) = self.validate(host) {
            return Ok(MainOutcome::Rejected(failure));
        }

        let mut state = self.inner.state.borrow_mut();
        let view = state.view.as_ref().map(|v| v.id.clone());
        debug_ln!(self.inner.debug, "Running main operation on {:?}", view);

        let mut cx = OperationContext {
            state: &mut *state,
            host,
            debug: &self.inner.debug,
            title: &self.inner.title,
        };
        self.inner.feature.run(&mut cx)?;
        Ok(MainOutcome::Ran)
    }
}

impl fmt::Debug for FeatureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureHandle")
            .field("name", &self.inner.name)
            .field("title", &self.inner.title)
            .finish()
    }
}

#[derive(Default)]
pub struct FeatureRegistry {
    features: FxHashMap<String, FeatureHandle>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `feature` with an existing execution state.
    pub fn register(
        &mut self,
        feature: Box<dyn Feature>,
        state: ExecutionContext,
    ) -> Result<FeatureHandle, EngineError> {
        let name = feature.name().to_string();
        if self.features.contains_key(&name) {
            log::warn!("Feature '{}' is already registered; ignoring", name);
            return Err(EngineError::DuplicateFeature(name));
        }

        let handle = FeatureHandle {
            inner: Rc::new(Registration {
                title: feature.title().to_string(),
                debug: debug::channel(&name),
                name: name.clone(),
                feature,
                state: Rc::new(RefCell::new(state)),
                dialog: RefCell::new(None),
            }),
        };

        debug_ln!(handle.inner.debug, "Registered feature {}", name);
        self.features.insert(name, handle.clone());
        Ok(handle)
    }

    /// Register `feature` with a fresh execution state whose settings use `store`.
    pub fn register_with_store(
        &mut self,
        feature: Box<dyn Feature>,
        store: SharedStore,
    ) -> Result<FeatureHandle, EngineError> {
        if self.features.contains_key(feature.name()) {
            log::warn!("Feature '{}' is already registered; ignoring", feature.name());
            return Err(EngineError::DuplicateFeature(feature.name().to_string()));
        }
        let config = SettingsManager::new(feature.descriptors(), store)?;
        self.register(feature, ExecutionContext::new(config))
    }

    pub fn get(&self, name: &str) -> Option<FeatureHandle> {
        self.features.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.features.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

thread_local! {
    static REGISTRY: RefCell<FeatureRegistry> = RefCell::new(FeatureRegistry::new());
}

/// Run `f` against the registry of the current (UI) thread.
pub fn with_registry<R>(f: impl FnOnce(&mut FeatureRegistry) -> R) -> R {
    REGISTRY.with(|registry| f(&mut registry.borrow_mut()))
}
