pub mod bootstrap;
pub mod context;
pub mod controls;
pub mod error;
pub mod feature;
pub mod harness;
pub mod host;
pub mod progress;
pub mod registry;
pub mod scratch;
pub mod surface;

pub use bootstrap::{Bootstrap, BootstrapState, RunOutcome, RunPath, VERSION};
pub use context::{ExecutionContext, OperationContext};
pub use controls::{CheckBox, NumericControl};
pub use error::{EngineError, JobError, ScratchError, ValidationFailure};
pub use feature::Feature;
pub use host::{
    unique_view_name, ImageHost, Invocation, InvocationTarget, MaskBinding, ProcessingJob,
    ViewHandle, ViewStatistics,
};
pub use registry::{with_registry, FeatureHandle, FeatureRegistry, MainOutcome, SurfaceHandle};
pub use scratch::{LedgerEvent, ScratchTable};
pub use surface::{share, ControlSurface, DialogSession, ImmediateSurface};
