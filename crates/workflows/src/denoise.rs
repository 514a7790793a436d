//! Deep Denoise: wavelet noise reduction of a linear color image, protected
//! by a luminance mask.
//!
//! 1. Extract CIELab luminance.
//! 2. Clone it into a mask and auto-stretch the mask.
//! 3. Shape the mask with a curves transformation.
//! 4. Apply the inverted mask and run the multiscale linear transform on
//!    luminance and chrominance, in the configured order.
//! 5. Remove the mask.
//!
//! Intermediate views live in the scratch table and are closed by the step
//! that stops needing them.

use serde_json::{json, Value};

use deepsky_core::SettingDescriptor;
use deepsky_engine::{
    EngineError, Feature, MaskBinding, OperationContext, ProcessingJob, ValidationFailure, ViewHandle,
};

use crate::luminance;

pub const FEATURE: &str = "deepDenoise";
pub const TITLE: &str = "Deep Denoise";

/// Wavelet layers of the multiscale linear transform.
pub const LAYERS: usize = 8;

const LUM: &str = "lum";
const LUM_MASK: &str = "lum_mask";

/// Curves lift for a mask strength setting of `level` (1..10).
pub fn mask_strength(level: i64) -> f64 {
    level as f64 * 0.04 + 0.05
}

/// One row of the multiscale linear transform's layer table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveletLayer {
    pub noise_reduction: bool,
    pub threshold: f64,
    pub amount: f64,
    pub iterations: i64,
}

impl WaveletLayer {
    /// `[enabled, biasEnabled, bias, nrEnabled, nrThreshold, nrAmount, nrIterations]`
    pub fn to_json(&self) -> Value {
        json!([
            true,
            true,
            0.0,
            self.noise_reduction,
            self.threshold,
            self.amount,
            self.iterations
        ])
    }
}

/// Layer table for one channel group.
///
/// Threshold, amount and iteration count start at their maxima on the first
/// layer and fall linearly to zero after `num_layers` layers. Layers past
/// that keep noise reduction off, with placeholder threshold 1, amount 0.001
/// and one iteration.
pub fn wavelet_layers(max_threshold: f64, num_layers: i64, max_amount: f64) -> Vec<WaveletLayer> {
    (0..LAYERS as i64)
        .map(|idx| {
            let remaining = (num_layers - idx).max(0);
            let fraction = if num_layers > 0 { remaining as f64 / num_layers as f64 } else { 0.0 };
            let threshold = max_threshold * fraction;
            let amount = max_amount * fraction;
            WaveletLayer {
                noise_reduction: remaining > 0,
                threshold: if threshold > 0.0 { threshold } else { 1.0 },
                amount: if amount > 0.0 { amount } else { 0.001 },
                iterations: if remaining > 0 { remaining } else { 1 },
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Component {
    Luminance,
    Chrominance,
}

impl Component {
    fn prefix(self) -> &'static str {
        match self {
            Self::Luminance => "lum",
            Self::Chrominance => "chrom",
        }
    }

    fn enabled_setting(self) -> &'static str {
        match self {
            Self::Luminance => "applyToLuminance",
            Self::Chrominance => "applyToChrominance",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Luminance => "luminance",
            Self::Chrominance => "chrominance",
        }
    }
}

#[derive(Debug, Default)]
pub struct DeepDenoise;

impl DeepDenoise {
    pub fn new() -> Self {
        Self
    }

    fn extract_luminance(&self, cx: &mut OperationContext<'_>, view: &ViewHandle) -> Result<(), EngineError> {
        cx.show_step("Extracting luminance...");

        let lum = luminance::extract_luminance(cx, view, "_Lum")?;
        cx.write_line(&format!("Luminance extracted as {}", lum.id));
        cx.create_scratch(LUM, lum, "extract_luminance")
    }

    fn generate_mask(&self, cx: &mut OperationContext<'_>) -> Result<(), EngineError> {
        cx.show_step("Creating luminance mask...");

        let lum = cx.scratch(LUM)?;
        let mask = luminance::clone_view(cx, &lum, "_Mask")?;
        cx.create_scratch(LUM_MASK, mask.clone(), "generate_mask")?;
        cx.release_scratch(LUM, "generate_mask")?;

        luminance::stretch_mask(cx, &mask)
    }

    fn apply_curves(&self, cx: &mut OperationContext<'_>) -> Result<(), EngineError> {
        cx.show_step("Applying curves transformation...");

        let mask = cx.scratch(LUM_MASK)?;
        let strength = mask_strength(cx.setting_i64("maskStrength")?);
        let job = ProcessingJob::new("CurvesTransformation")
            .with("K", vec![vec![0.0, strength], vec![1.0, 1.0 - strength]])
            .with("Kt", "AkimaSubsplines");
        cx.execute(&job, &mask)
    }

    fn denoise(
        &self,
        cx: &mut OperationContext<'_>,
        view: &ViewHandle,
        component: Component,
    ) -> Result<(), EngineError> {
        if !cx.setting_bool(component.enabled_setting())? {
            return Ok(());
        }

        let message = format!("Applying denoise to {}...", component.label());
        cx.show_step(&message);

        let prefix = component.prefix();
        let layers = wavelet_layers(
            cx.setting_f64(&format!("{prefix}MaxThreshold"))?,
            cx.setting_i64(&format!("{prefix}NumLayers"))?,
            cx.setting_f64(&format!("{prefix}MaxAmount"))?,
        );
        let job = multiscale_linear_transform(&layers, component == Component::Luminance);
        cx.execute(&job, view)
    }
}

fn multiscale_linear_transform(layers: &[WaveletLayer], luminance: bool) -> ProcessingJob {
    ProcessingJob::new("MultiscaleLinearTransform")
        .with("layers", layers.iter().map(WaveletLayer::to_json).collect::<Vec<_>>())
        .with("transform", "StarletTransform")
        .with("scaleDelta", 0)
        .with("scalingFunctionName", "Linear Interpolation (3)")
        .with("largeScaleFunction", "NoFunction")
        .with("curveBreakPoint", 0.75)
        .with("toLuminance", luminance)
        .with("toChrominance", !luminance)
        .with("linear", true)
}

impl Feature for DeepDenoise {
    fn name(&self) -> &str {
        FEATURE
    }

    fn title(&self) -> &str {
        TITLE
    }

    fn descriptors(&self) -> Vec<SettingDescriptor> {
        let mut descriptors = vec![SettingDescriptor::int16("maskStrength", 5)
            .label("Strength of luminance mask:")
            .tooltip("A higher strength will protect more structures.")
            .range(1.0, 10.0)];

        for component in [Component::Luminance, Component::Chrominance] {
            let prefix = component.prefix();
            let label = component.label();
            descriptors.extend([
                SettingDescriptor::boolean(component.enabled_setting(), true)
                    .label(format!("Apply to {label}"))
                    .tooltip(format!("Choose whether or not to run denoise against {label}.")),
                SettingDescriptor::int16(format!("{prefix}MaxThreshold"), 6)
                    .label(format!("Threshold for {label} denoise:"))
                    .tooltip("A higher level will remove more structures as noise.")
                    .range(1.0, 40.0),
                SettingDescriptor::int16(format!("{prefix}NumLayers"), 6)
                    .label(format!("Number of layers (out of 8) of {label} to apply denoise to:"))
                    .tooltip("Number of wavelet layers affected.")
                    .range(1.0, 8.0),
                SettingDescriptor::double(format!("{prefix}MaxAmount"), 0.5)
                    .precision(2)
                    .label("Max amount to apply:")
                    .tooltip(format!("Choose the maximum percentage of {label} denoise to apply."))
                    .range(0.1, 0.99),
            ]);
        }

        descriptors.push(
            SettingDescriptor::boolean("applyLuminanceFirst", true)
                .label("Apply to luminance first?")
                .tooltip("Choose whether or not to run denoise against luminance first or chrominance."),
        );
        descriptors
    }

    fn validate(&self, cx: &OperationContext<'_>) -> Result<(), ValidationFailure> {
        match cx.view() {
            None => Err(ValidationFailure::new("No active view!")),
            Some(view) if view.channels != 3 => Err(ValidationFailure::new("Active view is not color.")),
            Some(_) => Ok(()),
        }
    }

    fn run(&self, cx: &mut OperationContext<'_>) -> Result<(), EngineError> {
        let view = cx.require_view()?;

        let mut steps = 5;
        for component in [Component::Luminance, Component::Chrominance] {
            if !cx.setting_bool(component.enabled_setting())? {
                steps -= 1;
            }
        }
        cx.state.progress.begin(steps);

        self.extract_luminance(cx, &view)?;
        self.generate_mask(cx)?;
        self.apply_curves(cx)?;

        let mask = cx.scratch(LUM_MASK)?;
        cx.set_mask(&view, Some(MaskBinding::inverted(&mask)));

        let order = if cx.setting_bool("applyLuminanceFirst")? {
            [Component::Luminance, Component::Chrominance]
        } else {
            [Component::Chrominance, Component::Luminance]
        };
        for component in order {
            self.denoise(cx, &view, component)?;
        }

        cx.set_mask(&view, None);
        cx.release_scratch(LUM_MASK, "remove_mask")?;
        cx.write_line("Done.");
        Ok(())
    }
}
