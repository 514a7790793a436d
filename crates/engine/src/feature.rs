use deepsky_core::SettingDescriptor;

use crate::context::OperationContext;
use crate::error::{EngineError, ValidationFailure};

/// One self-contained workflow.
///
/// Operations receive the context explicitly; helper steps are ordinary
/// methods on the implementing type taking the same `OperationContext`.
pub trait Feature {
    /// Unique, process-wide. Also names the settings file and debug area.
    fn name(&self) -> &str;

    /// Shown to the user and prefixed to status lines.
    fn title(&self) -> &str;

    fn descriptors(&self) -> Vec<SettingDescriptor>;

    /// Initial `close_on_exit` for runs of this feature.
    fn close_on_exit(&self) -> bool {
        false
    }

    /// Check that the target view and scratch state allow a run.
    fn validate(&self, _cx: &OperationContext<'_>) -> Result<(), ValidationFailure> {
        Ok(())
    }

    /// The main operation.
    fn run(&self, cx: &mut OperationContext<'_>) -> Result<(), EngineError>;
}
