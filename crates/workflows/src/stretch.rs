//! Simple Stretch: a one-shot nonlinear stretch driven by a target
//! background level and a shadows clipping factor.

use deepsky_config::debug_ln;
use deepsky_core::SettingDescriptor;
use deepsky_engine::{EngineError, Feature, JobError, OperationContext, ValidationFailure};

use crate::transfer::AutoStretch;

pub const FEATURE: &str = "simpleStretch";
pub const TITLE: &str = "Simple Stretch";

#[derive(Debug, Default)]
pub struct SimpleStretch;

impl SimpleStretch {
    pub fn new() -> Self {
        Self
    }
}

impl Feature for SimpleStretch {
    fn name(&self) -> &str {
        FEATURE
    }

    fn title(&self) -> &str {
        TITLE
    }

    fn descriptors(&self) -> Vec<SettingDescriptor> {
        vec![
            SettingDescriptor::double("targetBackground", 0.2)
                .precision(2)
                .label("Target background:")
                .tooltip("A lower number results in a darker image.")
                .range(0.01, 0.5),
            SettingDescriptor::double("shadowsClipping", -2.4)
                .precision(1)
                .label("Shadows clipping:")
                .tooltip("Lower values clip less and higher values result in darker images and higher contrast.")
                .range(-15.0, 1.0),
        ]
    }

    fn validate(&self, cx: &OperationContext<'_>) -> Result<(), ValidationFailure> {
        match cx.view() {
            Some(_) => Ok(()),
            None => Err(ValidationFailure::new("No active view!")),
        }
    }

    fn run(&self, cx: &mut OperationContext<'_>) -> Result<(), EngineError> {
        let view = cx.require_view()?;
        let statistics = cx.host.statistics(&view)?;
        let (median, mad) = statistics
            .channel(0)
            .ok_or_else(|| JobError::new("Statistics", format!("no statistics for {}", view.id)))?;

        let stretch = AutoStretch::compute(
            median,
            mad,
            cx.setting_f64("targetBackground")?,
            cx.setting_f64("shadowsClipping")?,
        );
        debug_ln!(cx.debug, "median={} mad={} -> {:?}", median, mad, stretch);

        cx.show_status("Applying stretch...");
        cx.execute(&stretch.stf_job(view.is_grayscale()), &view)?;

        cx.show_status("Applying histogram transformation...");
        cx.execute(&stretch.histogram_job(view.is_grayscale()), &view)?;

        cx.show_status("Simple stretch is done.");
        Ok(())
    }
}
