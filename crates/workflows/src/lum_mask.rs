//! Luminance Mask: extract the luminance of a color image and stretch it
//! into a mask. Has no controls; an interactive start runs it straight away.

use deepsky_core::SettingDescriptor;
use deepsky_engine::{
    share, EngineError, Feature, FeatureHandle, ImmediateSurface, OperationContext, SurfaceHandle,
    ValidationFailure,
};

use crate::luminance;

pub const FEATURE: &str = "createLumMask";
pub const TITLE: &str = "Luminance Mask";

#[derive(Debug, Default)]
pub struct LumMask;

impl LumMask {
    pub fn new() -> Self {
        Self
    }
}

/// Surface factory for interactive starts.
pub fn surface(_handle: &FeatureHandle) -> Result<SurfaceHandle, EngineError> {
    Ok(share(ImmediateSurface))
}

impl Feature for LumMask {
    fn name(&self) -> &str {
        FEATURE
    }

    fn title(&self) -> &str {
        TITLE
    }

    fn descriptors(&self) -> Vec<SettingDescriptor> {
        vec![SettingDescriptor::boolean("lumMask", true).transient()]
    }

    fn close_on_exit(&self) -> bool {
        true
    }

    fn validate(&self, cx: &OperationContext<'_>) -> Result<(), ValidationFailure> {
        match cx.view() {
            None => Err(ValidationFailure::new("No active view!")),
            Some(view) if !view.is_color() => Err(ValidationFailure::new("Active view is not color.")),
            Some(_) => Ok(()),
        }
    }

    fn run(&self, cx: &mut OperationContext<'_>) -> Result<(), EngineError> {
        let view = cx.require_view()?;
        cx.state.progress.begin(1);
        cx.show_step("Generating mask...");

        let mask = luminance::luminance_mask(cx, &view, "_LMask")?;
        cx.write_line(&format!("Generated mask: {}", mask.id));
        Ok(())
    }
}
